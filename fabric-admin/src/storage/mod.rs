//! # Admin Table Persistence
//!
//! The persistence engine is consumed through [`KeyValueStore`]. All admin
//! details live under a single key, [`FABRIC_ADMINS_KEY`], as an
//! [`AdminTable`]. [`AdminStore`] performs the read-modify-write cycles on
//! that table; callers serialize those cycles through the registry lock.

mod file;

pub use file::JsonFileStore;

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use shared::{
    constants::FABRIC_ADMINS_KEY,
    error::{FabricError, FabricResult},
    types::{AdminIndex, AdminRecord, AdminTable},
};

/// Key-value persistence engine
pub trait KeyValueStore: Send + Sync {
    /// Get the value stored under `key`, `None` if absent
    fn get(&self, key: &str) -> FabricResult<Option<Value>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: Value) -> FabricResult<()>;

    /// Remove `key` entirely
    fn clear(&self, key: &str) -> FabricResult<()>;
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// Volatile store for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> FabricResult<Option<Value>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> FabricResult<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn clear(&self, key: &str) -> FabricResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

// =============================================================================
// ADMIN TABLE ADAPTER
// =============================================================================

/// Reads and writes the persisted admin table
#[derive(Clone)]
pub struct AdminStore {
    store: Arc<dyn KeyValueStore>,
}

impl AdminStore {
    /// Wrap a key-value store
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the admin table; an absent (or null) key yields an empty table
    pub fn load(&self) -> FabricResult<AdminTable> {
        match self.store.get(FABRIC_ADMINS_KEY)? {
            None | Some(Value::Null) => Ok(AdminTable::new()),
            Some(value) => serde_json::from_value(value).map_err(|e| {
                FabricError::CorruptRecord(format!(
                    "corrupt '{}' record: {}",
                    FABRIC_ADMINS_KEY, e
                ))
            }),
        }
    }

    /// Persisted record for one admin index
    pub fn record(&self, admin_index: AdminIndex) -> FabricResult<Option<AdminRecord>> {
        Ok(self.load()?.get(admin_index).copied())
    }

    /// Insert or overwrite the record for `admin_index`
    pub fn upsert(&self, admin_index: AdminIndex, record: AdminRecord) -> FabricResult<()> {
        let mut table = self.load()?;
        if let Some(previous) = table.insert(admin_index, record) {
            debug!(
                admin_index,
                previous_fabric_id = previous.fabric_id,
                "Overwriting persisted admin record"
            );
        }
        self.save(&table)?;

        debug!(admin_index, entries = table.len(), "Admin record persisted");
        Ok(())
    }

    /// Remove the record for `admin_index`
    ///
    /// Clears the key when the table becomes empty. Returns whether an
    /// entry was removed.
    pub fn remove(&self, admin_index: AdminIndex) -> FabricResult<bool> {
        let mut table = self.load()?;
        if table.remove(admin_index).is_none() {
            warn!(admin_index, "No persisted record to delete");
            return Ok(false);
        }

        if table.is_empty() {
            self.store.clear(FABRIC_ADMINS_KEY)?;
            debug!(admin_index, "Last admin record deleted, key cleared");
        } else {
            self.save(&table)?;
            debug!(admin_index, entries = table.len(), "Admin record deleted");
        }
        Ok(true)
    }

    fn save(&self, table: &AdminTable) -> FabricResult<()> {
        let value = serde_json::to_value(table)?;
        self.store.set(FABRIC_ADMINS_KEY, value)
    }
}

impl std::fmt::Debug for AdminStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminStore").finish_non_exhaustive()
    }
}
