//! # Admin Registry
//!
//! Owns the set of allocated admin indices and the set of live admins, and
//! serializes every mutation of those sets together with the read-modify-write
//! cycles on the persisted admin table.
//!
//! The registry holds only weak references to admins: an admin dropped
//! without [`FabricAdmin::shutdown`] is a leak, reported by
//! [`AdminRegistry::shutdown_all`] and [`AdminRegistry::ensure_drained`]
//! instead of being cleaned up implicitly.

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info};

use shared::{
    error::{FabricError, FabricResult},
    types::{AdminIndex, AdminRecord, AdminTable},
};

use crate::admin::FabricAdmin;
use crate::allocator::allocate_next;
use crate::delegate::CredentialDelegate;
use crate::storage::{AdminStore, KeyValueStore};

#[derive(Default)]
struct RegistryState {
    /// Indices reserved or owned by an admin
    active_indices: BTreeSet<AdminIndex>,

    /// Fully constructed admins, by index
    admins: BTreeMap<AdminIndex, Weak<FabricAdmin>>,
}

/// Registry of fabric admins for one process
pub struct AdminRegistry {
    store: AdminStore,
    delegates: Arc<dyn CredentialDelegate>,
    state: Mutex<RegistryState>,
}

impl AdminRegistry {
    /// Create an empty registry over a store and a delegate service
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        delegates: Arc<dyn CredentialDelegate>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store: AdminStore::new(store),
            delegates,
            state: Mutex::new(RegistryState::default()),
        })
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Allocated admin indices, including reservations in progress
    pub fn active_indices(&self) -> BTreeSet<AdminIndex> {
        self.state.lock().active_indices.clone()
    }

    /// Whether `admin_index` is currently allocated
    pub fn is_index_active(&self, admin_index: AdminIndex) -> bool {
        self.state.lock().active_indices.contains(&admin_index)
    }

    /// Live admins ordered by index
    pub fn active_admins(&self) -> Vec<Arc<FabricAdmin>> {
        self.state
            .lock()
            .admins
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Number of registered admins
    pub fn len(&self) -> usize {
        self.state.lock().admins.len()
    }

    /// Whether no admin is registered and no index allocated
    pub fn is_empty(&self) -> bool {
        let state = self.state.lock();
        state.admins.is_empty() && state.active_indices.is_empty()
    }

    /// Snapshot of the persisted admin table
    pub fn persisted_admins(&self) -> FabricResult<AdminTable> {
        let _state = self.state.lock();
        self.store.load()
    }

    /// Persisted record for one admin index
    pub fn persisted_record(&self, admin_index: AdminIndex) -> FabricResult<Option<AdminRecord>> {
        let _state = self.state.lock();
        self.store.record(admin_index)
    }

    // =========================================================================
    // LIFECYCLE (used by FabricAdmin)
    // =========================================================================

    pub(crate) fn delegates(&self) -> &dyn CredentialDelegate {
        self.delegates.as_ref()
    }

    /// Reserve `requested`, or the next free index, until committed
    pub(crate) fn reserve_index(
        &self,
        requested: Option<AdminIndex>,
    ) -> FabricResult<IndexReservation<'_>> {
        let mut state = self.state.lock();

        let admin_index = match requested {
            Some(index) if state.active_indices.contains(&index) => {
                return Err(FabricError::IndexAlreadyInUse(index));
            }
            Some(index) => index,
            None => allocate_next(&state.active_indices),
        };

        state.active_indices.insert(admin_index);
        debug!(admin_index, "Admin index reserved");

        Ok(IndexReservation {
            registry: self,
            admin_index,
            committed: false,
        })
    }

    /// Persist `record` and register `admin` in one critical section
    pub(crate) fn register(&self, admin: &Arc<FabricAdmin>, record: AdminRecord) -> FabricResult<()> {
        let admin_index = admin.admin_index();
        let mut state = self.state.lock();

        self.store.upsert(admin_index, record)?;
        state.admins.insert(admin_index, Arc::downgrade(admin));

        debug!(admin_index, registered = state.admins.len(), "Fabric admin registered");
        Ok(())
    }

    /// Release the index, optionally delete the record, and drop the admin
    ///
    /// The sets are always updated; a storage failure is returned afterwards.
    pub(crate) fn deregister(
        &self,
        admin_index: AdminIndex,
        delete_from_storage: bool,
    ) -> FabricResult<()> {
        let mut state = self.state.lock();

        state.active_indices.remove(&admin_index);

        let result = if delete_from_storage {
            self.store.remove(admin_index).map(|_| ())
        } else {
            Ok(())
        };

        state.admins.remove(&admin_index);
        debug!(admin_index, delete_from_storage, "Fabric admin deregistered");
        result
    }

    fn release_index(&self, admin_index: AdminIndex) {
        self.state.lock().active_indices.remove(&admin_index);
        debug!(admin_index, "Admin index reservation rolled back");
    }

    // =========================================================================
    // BULK SHUTDOWN
    // =========================================================================

    /// Shut down every live admin without deleting persisted records
    ///
    /// Every admin registered when the call starts is attempted; the first
    /// error is returned. Admins registered concurrently are left alone.
    pub fn shutdown_all(&self) -> FabricResult<()> {
        let snapshot: Vec<(AdminIndex, Weak<FabricAdmin>)> = self
            .state
            .lock()
            .admins
            .iter()
            .map(|(index, admin)| (*index, admin.clone()))
            .collect();

        info!(admins = snapshot.len(), "Shutting down all fabric admins");

        let mut first_error = None;
        for (admin_index, admin) in snapshot {
            match admin.upgrade() {
                Some(admin) => {
                    if let Err(err) = admin.shutdown(false) {
                        error!(admin_index, error = %err, "Fabric admin shutdown failed");
                        first_error.get_or_insert(err);
                    }
                }
                None => {
                    error!(
                        admin_index,
                        "Fabric admin was dropped without shutdown; its credential delegate leaked"
                    );
                    let mut state = self.state.lock();
                    state.active_indices.remove(&admin_index);
                    state.admins.remove(&admin_index);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Fail if any admin or index is still registered
    pub fn ensure_drained(&self) -> FabricResult<()> {
        let state = self.state.lock();
        let indices = leaked_indices(&state);

        if indices.is_empty() {
            Ok(())
        } else {
            Err(FabricError::AdminsLeaked { indices })
        }
    }
}

fn leaked_indices(state: &RegistryState) -> Vec<AdminIndex> {
    state
        .active_indices
        .iter()
        .chain(state.admins.keys())
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

impl Drop for AdminRegistry {
    fn drop(&mut self) {
        let indices = leaked_indices(self.state.get_mut());
        if !indices.is_empty() {
            error!(?indices, "Admin registry dropped with admins still registered");
        }
    }
}

impl std::fmt::Debug for AdminRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("AdminRegistry")
            .field("active_indices", &state.active_indices)
            .field("admins", &state.admins.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// INDEX RESERVATION
// =============================================================================

/// Admin index reserved during construction
///
/// Released on drop unless [`IndexReservation::commit`] was called, so every
/// early return out of construction gives the index back.
pub(crate) struct IndexReservation<'a> {
    registry: &'a AdminRegistry,
    admin_index: AdminIndex,
    committed: bool,
}

impl IndexReservation<'_> {
    pub(crate) fn admin_index(&self) -> AdminIndex {
        self.admin_index
    }

    /// Keep the index; ownership passes to the registered admin
    pub(crate) fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for IndexReservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.registry.release_index(self.admin_index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::AdminParams;
    use crate::delegate::DelegateHandle;
    use crate::testing::{test_registry, FailingDelegate, FailingStore};
    use crate::{LocalCredentialDelegate, MemoryStore};
    use std::sync::OnceLock;

    #[test]
    fn test_reservation_rolls_back_on_drop() {
        let (registry, _, _) = test_registry();

        let reservation = registry.reserve_index(None).unwrap();
        assert_eq!(reservation.admin_index(), 1);
        assert!(registry.is_index_active(1));

        drop(reservation);
        assert!(!registry.is_index_active(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_committed_reservation_is_kept() {
        let (registry, _, _) = test_registry();

        registry.reserve_index(Some(4)).unwrap().commit();
        assert!(registry.is_index_active(4));
        assert!(matches!(
            registry.reserve_index(Some(4)),
            Err(FabricError::IndexAlreadyInUse(4))
        ));

        registry.release_index(4);
    }

    #[test]
    fn test_reservations_allocate_distinct_indices() {
        let (registry, _, _) = test_registry();

        let first = registry.reserve_index(None).unwrap();
        let second = registry.reserve_index(None).unwrap();
        assert_eq!((first.admin_index(), second.admin_index()), (1, 2));
    }

    #[test]
    fn test_shutdown_all_drains_registry_and_keeps_records() {
        let (registry, _, delegates) = test_registry();

        let admins: Vec<_> = (0..3)
            .map(|_| FabricAdmin::create(&registry, AdminParams::for_vendor(0xFFF1)).unwrap())
            .collect();
        assert_eq!(registry.len(), 3);

        registry.shutdown_all().unwrap();

        assert!(registry.active_indices().is_empty());
        assert!(registry.active_admins().is_empty());
        assert!(admins.iter().all(|admin| !admin.is_active()));
        assert_eq!(delegates.live_handles(), 0);
        assert_eq!(registry.persisted_admins().unwrap().len(), 3);
        registry.ensure_drained().unwrap();
    }

    #[test]
    fn test_shutdown_all_reports_dropped_admins() {
        let (registry, _, delegates) = test_registry();

        let kept = FabricAdmin::create(&registry, AdminParams::for_vendor(1)).unwrap();
        let dropped = FabricAdmin::create(&registry, AdminParams::for_vendor(1)).unwrap();
        drop(dropped);

        assert!(matches!(
            registry.ensure_drained(),
            Err(FabricError::AdminsLeaked { ref indices }) if indices == &vec![1, 2]
        ));

        registry.shutdown_all().unwrap();
        assert!(!kept.is_active());
        registry.ensure_drained().unwrap();
        // The dropped admin's delegate was never released
        assert_eq!(delegates.live_handles(), 1);
    }

    #[test]
    fn test_shutdown_all_attempts_every_admin_when_releases_fail() {
        let delegates = Arc::new(FailingDelegate::failing_releases());
        let registry = AdminRegistry::new(Arc::new(MemoryStore::new()), delegates.clone());

        let admins: Vec<_> = (0..3)
            .map(|_| FabricAdmin::create(&registry, AdminParams::for_vendor(0xFFF1)).unwrap())
            .collect();

        let err = registry.shutdown_all().unwrap_err();
        assert!(matches!(
            err,
            FabricError::ResourceReleaseError { admin_index: 1, .. }
        ));
        assert_eq!(delegates.release_attempts(), 3);
        assert!(admins.iter().all(|admin| !admin.is_active()));
        registry.ensure_drained().unwrap();
        assert_eq!(registry.persisted_admins().unwrap().len(), 3);
    }

    /// Creates one extra admin from inside the first release
    struct RegisteringDelegate {
        inner: LocalCredentialDelegate,
        registry: OnceLock<Weak<AdminRegistry>>,
        created: Mutex<Option<Arc<FabricAdmin>>>,
    }

    impl CredentialDelegate for RegisteringDelegate {
        fn bind(&self, admin_index: AdminIndex) -> FabricResult<DelegateHandle> {
            self.inner.bind(admin_index)
        }

        fn release(&self, handle: DelegateHandle) -> FabricResult<()> {
            self.inner.release(handle)?;

            let registry = self.registry.get().and_then(Weak::upgrade);
            let mut created = self.created.lock();
            if let (Some(registry), None) = (registry, created.as_ref()) {
                *created = Some(FabricAdmin::create(&registry, AdminParams::for_vendor(7))?);
            }
            Ok(())
        }
    }

    #[test]
    fn test_shutdown_all_leaves_admins_registered_meanwhile() {
        let delegates = Arc::new(RegisteringDelegate {
            inner: LocalCredentialDelegate::new(),
            registry: OnceLock::new(),
            created: Mutex::new(None),
        });
        let registry = AdminRegistry::new(Arc::new(MemoryStore::new()), delegates.clone());
        delegates.registry.set(Arc::downgrade(&registry)).unwrap();

        let first = FabricAdmin::create(&registry, AdminParams::for_vendor(1)).unwrap();
        registry.shutdown_all().unwrap();
        assert!(!first.is_active());

        let late = delegates.created.lock().clone().unwrap();
        assert!(late.is_active());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.active_admins()[0].admin_index(), late.admin_index());

        registry.shutdown_all().unwrap();
        assert!(!late.is_active());
        registry.ensure_drained().unwrap();
        delegates.created.lock().take();
    }

    #[test]
    fn test_deregister_returns_storage_error_after_cleanup() {
        let store = Arc::new(FailingStore::new());
        let registry = AdminRegistry::new(store.clone(), Arc::new(LocalCredentialDelegate::new()));

        let admin = FabricAdmin::create(&registry, AdminParams::for_vendor(1)).unwrap();
        store.fail_writes(true);

        let err = admin.shutdown(true).unwrap_err();
        assert!(matches!(err, FabricError::PersistenceError(_)));
        assert!(!admin.is_active());
        registry.ensure_drained().unwrap();
    }

    #[test]
    fn test_ensure_drained_on_empty_registry() {
        let (registry, _, _) = test_registry();
        registry.ensure_drained().unwrap();
        assert_eq!(registry.len(), 0);
    }
}
