//! # Error Types for the Fabric Admin System
//!
//! All fallible operations in the workspace return [`FabricResult`].
//! Construction errors leave the registry untouched; shutdown errors
//! are reported after deregistration has completed.

use thiserror::Error;

/// Main error type for the entire system
#[derive(Error, Debug)]
pub enum FabricError {
    // =========================================================================
    // ADMIN ERRORS
    // =========================================================================

    /// Vendor ID was absent or zero
    #[error("Invalid vendor ID ({0}) provided")]
    InvalidVendorId(u32),

    /// Admin index is already owned by a live admin
    #[error("Admin index {0} is already managed by an existing fabric admin")]
    IndexAlreadyInUse(u32),

    /// Admin was shut down and can no longer vend controllers
    #[error("Fabric admin {0} was shut down and is no longer valid")]
    AdminInactive(u32),

    /// No persisted record exists for the admin index
    #[error("No persisted record for admin index {0}")]
    AdminNotPersisted(u32),

    // =========================================================================
    // DELEGATE ERRORS
    // =========================================================================

    /// Credential delegate could not be bound
    #[error("Failed to initialize credential delegate for admin {admin_index}: {reason}")]
    DelegateInitError { admin_index: u32, reason: String },

    /// Credential delegate could not be released
    #[error("Failed to release credential delegate for admin {admin_index}: {reason}")]
    ResourceReleaseError { admin_index: u32, reason: String },

    // =========================================================================
    // STORAGE ERRORS
    // =========================================================================

    /// Store unreachable or write failed
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// Persisted data could not be decoded
    #[error("Corrupt persisted data: {0}")]
    CorruptRecord(String),

    // =========================================================================
    // REGISTRY ERRORS
    // =========================================================================

    /// Admins still registered when the registry was expected to be empty
    #[error("Fabric admins were never shut down: {indices:?}")]
    AdminsLeaked { indices: Vec<u32> },

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Environment variable present but unparseable
    #[error("Invalid value '{value}' for environment variable {name}")]
    InvalidEnvVar { name: String, value: String },

    // =========================================================================
    // GENERIC ERRORS
    // =========================================================================

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias using FabricError
pub type FabricResult<T> = Result<T, FabricError>;

// =============================================================================
// ERROR CONVERSIONS
// =============================================================================

impl From<serde_json::Error> for FabricError {
    fn from(err: serde_json::Error) -> Self {
        FabricError::PersistenceError(err.to_string())
    }
}

impl From<std::io::Error> for FabricError {
    fn from(err: std::io::Error) -> Self {
        FabricError::PersistenceError(err.to_string())
    }
}

// =============================================================================
// ERROR CATEGORIES (for logging)
// =============================================================================

impl FabricError {
    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            FabricError::InvalidVendorId(_)
            | FabricError::IndexAlreadyInUse(_)
            | FabricError::AdminInactive(_)
            | FabricError::AdminNotPersisted(_) => "admin",

            FabricError::DelegateInitError { .. }
            | FabricError::ResourceReleaseError { .. } => "delegate",

            FabricError::PersistenceError(_) | FabricError::CorruptRecord(_) => "storage",

            FabricError::AdminsLeaked { .. } => "registry",

            FabricError::ConfigurationError(_)
            | FabricError::InvalidEnvVar { .. } => "config",

            FabricError::InternalError(_) => "internal",
        }
    }

    /// Check if the error is retryable
    ///
    /// Only store access failures qualify. Corrupt data fails the same way
    /// on every attempt, and delegate release retries belong to the
    /// delegate service.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FabricError::PersistenceError(_))
    }
}
