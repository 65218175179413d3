//! Error types for resync-store.

use std::path::PathBuf;

/// Result type for resync-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in resync-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A single item is larger than the whole storage budget.
    #[error("Item '{key}' is {size} bytes, larger than the {max_size} byte budget")]
    ItemTooLarge { key: String, size: u64, max_size: u64 },

    /// Eviction could not free enough room for the item.
    #[error("No room for '{key}' ({size} bytes): {used} of {max_size} bytes in use after eviction")]
    CapacityExceeded {
        key: String,
        size: u64,
        used: u64,
        max_size: u64,
    },

    /// The backend's lock was poisoned by a panicking writer.
    #[error("Storage backend lock poisoned")]
    Poisoned,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
