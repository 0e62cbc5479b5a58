//! Key-value store trait and the in-memory backend.

use std::collections::HashMap;
use std::sync::Arc;

use ccg_core::{Error, Result};
use parking_lot::RwLock;

/// String key-value storage scoped to one client profile.
///
/// Both operations fail with [`Error::StorageUnavailable`] when the backing
/// storage is disabled, full or otherwise unreachable.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Short backend name for logs and status output.
    fn backend(&self) -> &'static str;
}

/// In-memory store. Clones share the same map, so a clone handed to a new
/// manager sees what an earlier one wrote.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
    disabled: bool,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store on which every read and write fails.
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    /// A store whose total size (keys plus values) may not exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota_bytes: Some(bytes),
            ..Self::default()
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if self.disabled {
            return Err(Error::StorageUnavailable("storage is disabled".into()));
        }
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.disabled {
            return Err(Error::StorageUnavailable("storage is disabled".into()));
        }

        let mut entries = self.entries.write();
        if let Some(quota) = self.quota_bytes {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(Error::StorageUnavailable(format!(
                    "quota exceeded: {} of {} bytes",
                    needed, quota
                )));
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
