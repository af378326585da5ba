//! # Shared Module for the Fabric Admin System
//!
//! This crate provides the types, errors, constants and configuration
//! used by the fabric admin library and its CLI.
//!
//! ## Persisted Layout
//!
//! A single key, [`constants::FABRIC_ADMINS_KEY`], holds an [`types::AdminTable`]
//! mapping each stringified admin index to its fabric and vendor IDs:
//!
//! ```json
//! { "1": { "fabricId": 1, "vendorId": 65521 } }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-exports for convenience
pub use config::*;
pub use constants::*;
pub use error::*;
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
