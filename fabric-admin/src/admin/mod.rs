//! # Fabric Admin
//!
//! Administers one fabric, identified by the root key of its credential
//! delegate together with a fabric ID. The fabric ID does not have to be
//! unique across admins, since it is scoped to that root key.
//!
//! Each admin is identified by an admin index unique within its
//! [`AdminRegistry`]. The index keys the admin's persisted record (fabric
//! and vendor IDs) so the admin can be re-created on a later run with
//! [`FabricAdmin::restore`].
//!
//! ## Lifecycle
//!
//! 1. [`FabricAdmin::create`] reserves an index, binds a credential
//!    delegate, persists the record and registers the admin. A failure at
//!    any step undoes the steps before it.
//! 2. [`FabricAdmin::new_controller`] vends controllers on the fabric.
//! 3. [`FabricAdmin::shutdown`] releases the delegate and deregisters.
//!    Shutdown must be called explicitly; dropping an active admin only
//!    logs the leak.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info};

use shared::{
    constants::{CONTROLLER_NODE_ID_BASE, DEFAULT_FABRIC_ID},
    error::{FabricError, FabricResult},
    types::{AdminIndex, AdminRecord, FabricId, NodeId, VendorId},
};

use crate::controller::{Controller, ControllerOptions};
use crate::delegate::{DelegateHandle, DelegateRef};
use crate::registry::AdminRegistry;

/// Parameters for [`FabricAdmin::create`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminParams {
    /// Operational vendor ID; must be present and non-zero
    pub vendor_id: Option<VendorId>,

    /// Admin index to claim; allocated when `None`
    pub admin_index: Option<AdminIndex>,

    /// Fabric ID, scoped to the delegate's root key
    pub fabric_id: FabricId,
}

impl Default for AdminParams {
    fn default() -> Self {
        Self {
            vendor_id: None,
            admin_index: None,
            fabric_id: DEFAULT_FABRIC_ID,
        }
    }
}

impl AdminParams {
    /// Parameters for `vendor_id` with an allocated index and default fabric
    pub fn for_vendor(vendor_id: VendorId) -> Self {
        Self {
            vendor_id: Some(vendor_id),
            ..Self::default()
        }
    }

    /// Claim a specific admin index
    pub fn with_admin_index(mut self, admin_index: AdminIndex) -> Self {
        self.admin_index = Some(admin_index);
        self
    }

    /// Use a specific fabric ID
    pub fn with_fabric_id(mut self, fabric_id: FabricId) -> Self {
        self.fabric_id = fabric_id;
        self
    }
}

struct AdminState {
    /// Present while the admin is active
    delegate: Option<DelegateHandle>,

    /// Node ID handed to the next controller without an explicit one
    next_controller_id: NodeId,
}

/// Administrator of one fabric
pub struct FabricAdmin {
    vendor_id: VendorId,
    fabric_id: FabricId,
    admin_index: AdminIndex,
    registry: Arc<AdminRegistry>,
    state: Mutex<AdminState>,
}

impl FabricAdmin {
    /// Create and register a new fabric admin
    ///
    /// # Errors
    /// * `InvalidVendorId` - vendor ID absent or zero
    /// * `IndexAlreadyInUse` - requested index owned by another admin
    /// * `DelegateInitError` - the credential delegate could not be bound
    /// * `PersistenceError` - the admin table could not be updated
    ///
    /// On error the registry and the delegate service are left as they were.
    pub fn create(registry: &Arc<AdminRegistry>, params: AdminParams) -> FabricResult<Arc<Self>> {
        let vendor_id = match params.vendor_id {
            Some(vendor_id) if vendor_id != 0 => vendor_id,
            other => return Err(FabricError::InvalidVendorId(other.unwrap_or(0))),
        };
        let fabric_id = params.fabric_id;

        let reservation = registry.reserve_index(params.admin_index)?;
        let admin_index = reservation.admin_index();

        info!(
            fabric_id = %format!("0x{:016X}", fabric_id),
            admin_index,
            vendor_id = %format!("0x{:04X}", vendor_id),
            "New fabric admin"
        );

        let handle = registry.delegates().bind(admin_index).map_err(|err| match err {
            FabricError::DelegateInitError { .. } => err,
            other => FabricError::DelegateInitError {
                admin_index,
                reason: other.to_string(),
            },
        })?;

        let admin = Arc::new(Self {
            vendor_id,
            fabric_id,
            admin_index,
            registry: Arc::clone(registry),
            state: Mutex::new(AdminState {
                delegate: Some(handle),
                next_controller_id: CONTROLLER_NODE_ID_BASE,
            }),
        });

        if let Err(err) = registry.register(&admin, AdminRecord { fabric_id, vendor_id }) {
            admin.abandon();
            return Err(err);
        }

        reservation.commit();
        Ok(admin)
    }

    /// Re-create the admin persisted under `admin_index`
    ///
    /// # Errors
    /// `AdminNotPersisted` when no record exists, otherwise as [`FabricAdmin::create`].
    pub fn restore(registry: &Arc<AdminRegistry>, admin_index: AdminIndex) -> FabricResult<Arc<Self>> {
        let record = registry
            .persisted_record(admin_index)?
            .ok_or(FabricError::AdminNotPersisted(admin_index))?;

        debug!(
            admin_index,
            fabric_id = record.fabric_id,
            vendor_id = record.vendor_id,
            "Restoring fabric admin from persisted record"
        );

        Self::create(
            registry,
            AdminParams::for_vendor(record.vendor_id)
                .with_admin_index(admin_index)
                .with_fabric_id(record.fabric_id),
        )
    }

    /// Release the delegate of an admin whose registration failed
    fn abandon(&self) {
        let Some(handle) = self.state.lock().delegate.take() else {
            return;
        };

        if let Err(err) = self.registry.delegates().release(handle) {
            error!(
                admin_index = self.admin_index,
                error = %err,
                "Failed to release credential delegate during rollback"
            );
        }
    }

    // =========================================================================
    // CONTROLLER FACTORY
    // =========================================================================

    /// Vend a new controller on this fabric
    ///
    /// Without an explicit node ID the admin's counter is used and
    /// incremented, starting at 112233.
    pub fn new_controller(self: &Arc<Self>, options: ControllerOptions) -> FabricResult<Controller> {
        let (node_id, delegate) = {
            let mut state = self.state.lock();
            let delegate = state
                .delegate
                .as_ref()
                .map(DelegateHandle::delegate_ref)
                .ok_or(FabricError::AdminInactive(self.admin_index))?;

            let node_id = match options.node_id {
                Some(node_id) => node_id,
                None => {
                    let node_id = state.next_controller_id;
                    state.next_controller_id += 1;
                    node_id
                }
            };
            (node_id, delegate)
        };

        info!(
            fabric_id = %format!("0x{:016X}", self.fabric_id),
            node_id = %format!("0x{:016X}", node_id),
            "Allocating new controller"
        );

        Ok(Controller::new(self, delegate, node_id, options))
    }

    // =========================================================================
    // SHUTDOWN
    // =========================================================================

    /// Shut down the admin and free its credential delegate
    ///
    /// A no-op when already shut down. A delegate release failure does not
    /// stop deregistration; it is returned as `ResourceReleaseError` once the
    /// admin has been removed from the registry.
    ///
    /// * `delete_from_storage` - also delete this admin's persisted record
    pub fn shutdown(&self, delete_from_storage: bool) -> FabricResult<()> {
        let Some(handle) = self.state.lock().delegate.take() else {
            debug!(admin_index = self.admin_index, "Fabric admin already shut down");
            return Ok(());
        };

        let released = self.registry.delegates().release(handle).map_err(|err| match err {
            FabricError::ResourceReleaseError { .. } => err,
            other => FabricError::ResourceReleaseError {
                admin_index: self.admin_index,
                reason: other.to_string(),
            },
        });
        if let Err(ref err) = released {
            error!(
                admin_index = self.admin_index,
                error = %err,
                "Failed to release credential delegate, continuing shutdown"
            );
        }

        let deregistered = self.registry.deregister(self.admin_index, delete_from_storage);

        info!(
            admin_index = self.admin_index,
            delete_from_storage,
            "Fabric admin shut down"
        );

        released.and(deregistered)
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Whether the admin has not been shut down
    pub fn is_active(&self) -> bool {
        self.state.lock().delegate.is_some()
    }

    /// Operational vendor ID
    pub fn vendor_id(&self) -> VendorId {
        self.vendor_id
    }

    /// Fabric ID
    pub fn fabric_id(&self) -> FabricId {
        self.fabric_id
    }

    /// Admin index
    pub fn admin_index(&self) -> AdminIndex {
        self.admin_index
    }

    /// Non-owning view of the delegate, `None` after shutdown
    pub fn delegate_ref(&self) -> Option<DelegateRef> {
        self.state.lock().delegate.as_ref().map(DelegateHandle::delegate_ref)
    }

    /// Node ID the next controller without an explicit one will receive
    pub fn next_controller_id(&self) -> NodeId {
        self.state.lock().next_controller_id
    }
}

impl Drop for FabricAdmin {
    fn drop(&mut self) {
        if self.state.get_mut().delegate.is_some() {
            error!(
                admin_index = self.admin_index,
                "Fabric admin dropped without shutdown"
            );
        }
    }
}

impl std::fmt::Debug for FabricAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FabricAdmin")
            .field("vendor_id", &self.vendor_id)
            .field("fabric_id", &self.fabric_id)
            .field("admin_index", &self.admin_index)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
