//! # Fabric Admin
//!
//! Lifecycle management for fabric administrators on a credential-scoped
//! device fabric:
//! - Unique admin index allocation within a registry
//! - Credential delegate binding with guaranteed release
//! - Persistence of admin details through a key-value store
//! - Controller vending with sequential node IDs
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use fabric_admin::{
//!     AdminParams, AdminRegistry, ControllerOptions, FabricAdmin, JsonFileStore,
//!     LocalCredentialDelegate,
//! };
//!
//! # fn main() -> shared::FabricResult<()> {
//! let store = Arc::new(JsonFileStore::open("repl-storage.json")?);
//! let registry = AdminRegistry::new(store, Arc::new(LocalCredentialDelegate::new()));
//!
//! let admin = FabricAdmin::create(&registry, AdminParams::for_vendor(0xFFF1))?;
//! let controller = admin.new_controller(ControllerOptions::default())?;
//! assert_eq!(controller.node_id(), 112233);
//!
//! registry.shutdown_all()?;
//! registry.ensure_drained()?;
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod allocator;
pub mod controller;
pub mod delegate;
pub mod registry;
pub mod storage;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use admin::{AdminParams, FabricAdmin};
pub use allocator::allocate_next;
pub use controller::{Controller, ControllerOptions};
pub use delegate::{CredentialDelegate, DelegateHandle, DelegateRef, LocalCredentialDelegate};
pub use registry::AdminRegistry;
pub use storage::{AdminStore, JsonFileStore, KeyValueStore, MemoryStore};
