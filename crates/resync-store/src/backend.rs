//! Durable key/value seam.
//!
//! [`KeyValueStore`] is the narrow interface the offline cache is written
//! against. [`MemoryStore`] keeps everything in process memory; the SQLite
//! backend lives in [`crate::sqlite`].

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::{Error, Result};

/// String-keyed, string-valued persistent storage.
///
/// Implementations must be safe to share across tasks. Writes to the same
/// key are last-write-wins; there is no cross-process locking.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite `key`.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`. Returns whether it existed.
    fn remove(&self, key: &str) -> Result<bool>;

    /// List every key starting with `prefix`.
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// In-memory backend, mainly for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of raw entries, across all namespaces.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(|_| Error::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| Error::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.write().map_err(|_| Error::Poisoned)?;
        Ok(entries.remove(key).is_some())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(|_| Error::Poisoned)?;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));

        store.set("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_memory_store_remove_is_idempotent() {
        let store = MemoryStore::new();
        store.set("a", "1").unwrap();
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert!(store.get("a").unwrap().is_none());
    }

    #[test]
    fn test_memory_store_prefix_scan() {
        let store = MemoryStore::new();
        store.set("cache:a", "1").unwrap();
        store.set("cache:b", "2").unwrap();
        store.set("other", "3").unwrap();

        let keys = store.keys("cache:").unwrap();
        assert_eq!(keys, vec!["cache:a".to_string(), "cache:b".to_string()]);
        assert_eq!(store.keys("").unwrap().len(), 3);
    }
}
