//! Durable offline storage for the resync engine.
//!
//! This crate provides the persistence layer: a small key-value seam
//! ([`KeyValueStore`]) with in-memory and SQLite implementations, and the
//! [`OfflineStorage`] cache built on top of it.
//!
//! # Features
//!
//! - Per-item TTL with lazy expiry on read
//! - A global byte budget with priority-aware eviction
//! - Pinned keys that are never evicted (used for the action queue)
//! - Failure-tolerant `store`/`retrieve` alongside `try_` variants
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use resync_store::{MemoryStore, OfflineStorage, StorageOptions, StoreOptions};
//!
//! let storage = OfflineStorage::new(Arc::new(MemoryStore::new()), StorageOptions::default());
//! assert!(storage.store("profile", &serde_json::json!({"name": "ada"}), StoreOptions::new()));
//!
//! let profile: serde_json::Value = storage.retrieve("profile").unwrap();
//! assert_eq!(profile["name"], "ada");
//! ```

mod backend;
mod error;
mod models;
mod offline;
mod schema;
mod sqlite;

pub use backend::{KeyValueStore, MemoryStore};
pub use error::{Error, Result};
pub use models::{NEVER_EXPIRES, StorageInfo, StorageItem, StoreOptions};
pub use offline::{
    EVICTION_TARGET_RATIO, KEY_PREFIX, OfflineStorage, StorageOptions, estimate_size,
};
pub use sqlite::SqliteStore;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/resync/engine.db`
/// - macOS: `~/Library/Application Support/resync/engine.db`
/// - Windows: `C:\Users\<user>\AppData\Local\resync\engine.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("resync")
        .join("engine.db")
}
