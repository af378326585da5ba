//! JSON file backed key-value store.
//!
//! All keys are kept in one JSON object on disk. The file is rewritten on
//! every mutation through a temporary file and a rename, so a crash never
//! leaves a half-written document behind.

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use shared::error::{FabricError, FabricResult};

use super::KeyValueStore;

/// Key-value store persisted as a single JSON document
#[derive(Debug)]
pub struct JsonFileStore {
    /// Path to the JSON document
    path: PathBuf,

    /// In-memory copy of the document
    entries: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading existing contents if present
    pub fn open(path: impl Into<PathBuf>) -> FabricResult<Self> {
        let path = path.into();

        let entries = if path.exists() {
            let json = std::fs::read_to_string(&path)?;
            if json.trim().is_empty() {
                Map::new()
            } else {
                serde_json::from_str(&json).map_err(|e| {
                    FabricError::CorruptRecord(format!(
                        "corrupt storage file {}: {}",
                        path.display(),
                        e
                    ))
                })?
            }
        } else {
            Map::new()
        };

        info!(path = ?path, keys = entries.len(), "Opened JSON storage");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &Map<String, Value>) -> FabricResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json)?;

        // Owner-only read/write (Unix)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&tmp_path, perms)?;
        }

        std::fs::rename(&tmp_path, &self.path)?;

        debug!(path = ?self.path, keys = entries.len(), "Storage flushed");
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> FabricResult<Option<Value>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> FabricResult<()> {
        let mut entries = self.entries.lock();
        let previous = entries.insert(key.to_string(), value);

        if let Err(err) = self.flush(&entries) {
            // Keep memory consistent with disk
            match previous {
                Some(previous) => entries.insert(key.to_string(), previous),
                None => entries.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    fn clear(&self, key: &str) -> FabricResult<()> {
        let mut entries = self.entries.lock();
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };

        if let Err(err) = self.flush(&entries) {
            entries.insert(key.to_string(), previous);
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_opens_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("store.json")).unwrap();

        assert!(store.get("fabricAdmins").unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_persistence_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        {
            let store = JsonFileStore::open(&path).unwrap();
            store.set("fabricAdmins", json!({"1": {"fabricId": 1, "vendorId": 65521}})).unwrap();
            store.set("other", json!(42)).unwrap();
        }

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            store.get("fabricAdmins").unwrap(),
            Some(json!({"1": {"fabricId": 1, "vendorId": 65521}}))
        );
        assert_eq!(store.get("other").unwrap(), Some(json!(42)));
    }

    #[test]
    fn test_clear_removes_key_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.set("fabricAdmins", json!({})).unwrap();
        store.set("keep", json!("yes")).unwrap();
        store.clear("fabricAdmins").unwrap();
        store.clear("never-set").unwrap();

        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, json!({"keep": "yes"}));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonFileStore::open(&path).unwrap_err();
        assert!(matches!(err, FabricError::CorruptRecord(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.set("k", json!(1)).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
