//! Test doubles shared by the unit tests.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use shared::{
    error::{FabricError, FabricResult},
    types::AdminIndex,
};

use crate::delegate::{CredentialDelegate, DelegateHandle, LocalCredentialDelegate};
use crate::registry::AdminRegistry;
use crate::storage::{KeyValueStore, MemoryStore};

/// Registry over a fresh memory store and local delegate
pub(crate) fn test_registry() -> (Arc<AdminRegistry>, Arc<MemoryStore>, Arc<LocalCredentialDelegate>) {
    let store = Arc::new(MemoryStore::new());
    let delegates = Arc::new(LocalCredentialDelegate::new());
    let registry = AdminRegistry::new(store.clone(), delegates.clone());
    (registry, store, delegates)
}

/// Memory store whose writes can be made to fail
#[derive(Default)]
pub(crate) struct FailingStore {
    entries: Mutex<HashMap<String, Value>>,
    fail_writes: AtomicBool,
}

impl FailingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> FabricResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FabricError::PersistenceError("store is read-only".into()));
        }
        Ok(())
    }
}

impl KeyValueStore for FailingStore {
    fn get(&self, key: &str) -> FabricResult<Option<Value>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> FabricResult<()> {
        self.check_writable()?;
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn clear(&self, key: &str) -> FabricResult<()> {
        self.check_writable()?;
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Delegate service that fails binds or releases
pub(crate) struct FailingDelegate {
    fail_binds: bool,
    next_id: AtomicU64,
    release_attempts: AtomicUsize,
}

impl FailingDelegate {
    pub(crate) fn failing_binds() -> Self {
        Self {
            fail_binds: true,
            next_id: AtomicU64::new(1),
            release_attempts: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing_releases() -> Self {
        Self {
            fail_binds: false,
            ..Self::failing_binds()
        }
    }

    pub(crate) fn release_attempts(&self) -> usize {
        self.release_attempts.load(Ordering::SeqCst)
    }
}

impl CredentialDelegate for FailingDelegate {
    fn bind(&self, admin_index: AdminIndex) -> FabricResult<DelegateHandle> {
        if self.fail_binds {
            return Err(FabricError::DelegateInitError {
                admin_index,
                reason: "credential service unavailable".into(),
            });
        }
        Ok(DelegateHandle::new(self.next_id.fetch_add(1, Ordering::SeqCst), admin_index))
    }

    fn release(&self, handle: DelegateHandle) -> FabricResult<()> {
        self.release_attempts.fetch_add(1, Ordering::SeqCst);
        let admin_index = handle.admin_index();
        handle.into_id();
        Err(FabricError::ResourceReleaseError {
            admin_index,
            reason: "credential service unavailable".into(),
        })
    }
}
