//! # Constants for the Fabric Admin System
//!
//! Storage keys, identifier bases and environment variable names used
//! by the registry, the persistence adapter and the CLI.

// =============================================================================
// ADMIN INDICES
// =============================================================================

/// First admin index handed out by the allocator
pub const FIRST_ADMIN_INDEX: u32 = 1;

// =============================================================================
// FABRIC DEFAULTS
// =============================================================================

/// Fabric ID used when the caller does not provide one
pub const DEFAULT_FABRIC_ID: u64 = 1;

/// Node ID assigned to the first controller vended by an admin
pub const CONTROLLER_NODE_ID_BASE: u64 = 112_233;

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Key under which the admin table is stored
pub const FABRIC_ADMINS_KEY: &str = "fabricAdmins";

/// Directory (relative to the home directory) holding the storage file
pub const DEFAULT_DATA_DIR: &str = ".fabric-admin";

/// Name of the JSON storage file
pub const DEFAULT_STORAGE_FILE: &str = "repl-storage.json";

// =============================================================================
// ENVIRONMENT VARIABLE NAMES
// =============================================================================

/// Environment variable overriding the storage directory
pub const ENV_DATA_PATH: &str = "FABRIC_ADMIN_DATA_PATH";

/// Environment variable for the default vendor ID
pub const ENV_VENDOR_ID: &str = "FABRIC_ADMIN_VENDOR_ID";

/// Environment variable for the default fabric ID
pub const ENV_FABRIC_ID: &str = "FABRIC_ADMIN_FABRIC_ID";

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Parse an identifier given either in decimal or as `0x`-prefixed hex
pub fn parse_id(value: &str) -> Option<u64> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}
