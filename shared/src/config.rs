//! # Configuration for the Fabric Admin System
//!
//! Configuration is built from defaults and overridden by environment
//! variables; the CLI applies its own flags on top.

use crate::constants::*;
use crate::error::{FabricError, FabricResult};
use crate::types::{FabricId, VendorId};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

// =============================================================================
// FABRIC ADMIN CONFIGURATION
// =============================================================================

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricAdminConfig {
    /// Storage configuration
    pub storage: StorageConfig,

    /// Vendor ID used when a command does not specify one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_vendor_id: Option<VendorId>,

    /// Fabric ID used when a command does not specify one
    pub default_fabric_id: FabricId,
}

impl Default for FabricAdminConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            default_vendor_id: None,
            default_fabric_id: DEFAULT_FABRIC_ID,
        }
    }
}

impl FabricAdminConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> FabricResult<Self> {
        let mut config = Self::default();

        if let Ok(path) = env::var(ENV_DATA_PATH) {
            config.storage.data_path = PathBuf::from(path);
        }

        if let Ok(value) = env::var(ENV_VENDOR_ID) {
            let vendor_id = parse_id(&value)
                .and_then(|id| VendorId::try_from(id).ok())
                .ok_or_else(|| FabricError::InvalidEnvVar {
                    name: ENV_VENDOR_ID.into(),
                    value: value.clone(),
                })?;
            config.default_vendor_id = Some(vendor_id);
        }

        if let Ok(value) = env::var(ENV_FABRIC_ID) {
            config.default_fabric_id = parse_id(&value).ok_or_else(|| FabricError::InvalidEnvVar {
                name: ENV_FABRIC_ID.into(),
                value: value.clone(),
            })?;
        }

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> FabricResult<()> {
        if self.default_vendor_id == Some(0) {
            return Err(FabricError::ConfigurationError(
                "default vendor ID must be non-zero".into(),
            ));
        }

        self.storage.validate()?;

        Ok(())
    }
}

// =============================================================================
// STORAGE CONFIGURATION
// =============================================================================

/// Storage configuration for the JSON key-value file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the storage file
    pub data_path: PathBuf,

    /// Storage file name
    pub file_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_path = dirs::home_dir()
            .map(|home| home.join(DEFAULT_DATA_DIR))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        Self {
            data_path,
            file_name: DEFAULT_STORAGE_FILE.into(),
        }
    }
}

impl StorageConfig {
    /// Full path of the storage file
    pub fn file_path(&self) -> PathBuf {
        self.data_path.join(&self.file_name)
    }

    /// Validate storage configuration
    pub fn validate(&self) -> FabricResult<()> {
        if self.file_name.trim().is_empty() {
            return Err(FabricError::ConfigurationError(
                "storage file name must not be empty".into(),
            ));
        }
        Ok(())
    }
}
