//! JSON file backend — one object holding every key, like a profile's `localStorage`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ccg_core::{Error, Result};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::kv::KeyValueStore;

/// Key-value store persisted as a single JSON object on disk.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Create a store backed by `path`. The file is created on first write.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(Error::StorageUnavailable(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        if data.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&data).map_err(|e| {
            Error::StorageUnavailable(format!("{} is not a JSON object: {}", self.path.display(), e))
        })
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let unavailable = |e: std::io::Error| {
            Error::StorageUnavailable(format!("{}: {}", self.path.display(), e))
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(unavailable)?;
        }
        let json = serde_json::to_string_pretty(map)?;

        // Write to a sibling file first so a crash never leaves half a record.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(unavailable)?;
        std::fs::rename(&tmp, &self.path).map_err(unavailable)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(e) => {
                warn!("Replacing unreadable storage file: {}", e);
                BTreeMap::new()
            }
        };
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)?;
        debug!("Wrote key '{}' to {}", key, self.path.display());
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("storage.json"));
        assert!(store.get("anything").unwrap().is_none());
    }

    #[test]
    fn test_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let store = JsonFileStore::new(&path);
        store.set("a", "1").unwrap();
        store.set("b", "{\"x\":true}").unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(reopened.get("b").unwrap().as_deref(), Some("{\"x\":true}"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_unavailable_until_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.get("a"), Err(Error::StorageUnavailable(_))));

        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_directory_in_place_of_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::create_dir_all(&path).unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.get("a"), Err(Error::StorageUnavailable(_))));
        assert!(matches!(store.set("a", "1"), Err(Error::StorageUnavailable(_))));
    }
}
