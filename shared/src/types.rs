//! # Shared Data Types for the Fabric Admin System
//!
//! Identifier aliases and the persisted admin table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Process-local admin index (not a fabric index)
pub type AdminIndex = u32;

/// Fabric ID, scoped to the root CA key of the admin's credential delegate
pub type FabricId = u64;

/// Operational vendor ID
pub type VendorId = u32;

/// Node ID assigned to a vended controller
pub type NodeId = u64;

// =============================================================================
// PERSISTED ADMIN TABLE
// =============================================================================

/// Persisted details of a single fabric admin
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdminRecord {
    /// Fabric ID the admin was created with
    pub fabric_id: FabricId,

    /// Vendor ID the admin was created with
    pub vendor_id: VendorId,
}

/// Mapping of stringified admin index to its persisted record
///
/// Serialized as a plain JSON object, e.g.
/// `{"5": {"fabricId": 170, "vendorId": 16}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct AdminTable(BTreeMap<String, AdminRecord>);

impl AdminTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the record for an admin index
    pub fn get(&self, admin_index: AdminIndex) -> Option<&AdminRecord> {
        self.0.get(&admin_index.to_string())
    }

    /// Insert or overwrite the record for an admin index
    pub fn insert(&mut self, admin_index: AdminIndex, record: AdminRecord) -> Option<AdminRecord> {
        self.0.insert(admin_index.to_string(), record)
    }

    /// Remove the record for an admin index
    pub fn remove(&mut self, admin_index: AdminIndex) -> Option<AdminRecord> {
        self.0.remove(&admin_index.to_string())
    }

    /// Check whether a record exists for an admin index
    pub fn contains(&self, admin_index: AdminIndex) -> bool {
        self.0.contains_key(&admin_index.to_string())
    }

    /// Number of persisted admins
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table holds no records
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Records ordered by numeric admin index
    ///
    /// Keys that are not valid admin indices are skipped.
    pub fn entries(&self) -> Vec<(AdminIndex, AdminRecord)> {
        let mut entries: Vec<_> = self
            .0
            .iter()
            .filter_map(|(key, record)| key.parse().ok().map(|index| (index, *record)))
            .collect();
        entries.sort_by_key(|(index, _)| *index);
        entries
    }
}
