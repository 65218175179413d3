//! Data models for stored cache entries.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use resync_types::Priority;

/// TTL marker for entries that never expire.
pub const NEVER_EXPIRES: u64 = u64::MAX;

/// A cached value wrapped with its bookkeeping metadata.
///
/// This is the persisted layout of every cache entry:
/// `{data, timestamp, ttl, priority, size}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageItem {
    pub data: Value,
    /// Write time.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Time-to-live in milliseconds ([`NEVER_EXPIRES`] for no expiry).
    pub ttl: u64,
    pub priority: Priority,
    /// Estimated size of `data` in bytes.
    pub size: u64,
}

impl StorageItem {
    /// Whether more than `ttl` has elapsed since the write.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        if self.ttl == NEVER_EXPIRES {
            return false;
        }
        let age_ms = (now - self.timestamp).whole_milliseconds();
        age_ms > i128::from(self.ttl)
    }
}

/// Per-write options for [`crate::OfflineStorage::store`].
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Overrides the storage default TTL.
    pub ttl: Option<Duration>,
    /// Defaults to [`Priority::Medium`].
    pub priority: Option<Priority>,
    /// Keep the entry until it is removed explicitly.
    pub never_expires: bool,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn never_expires(mut self) -> Self {
        self.never_expires = true;
        self
    }
}

/// Read-only capacity report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageInfo {
    pub total_items: usize,
    /// Sum of item sizes, in bytes.
    pub total_size: u64,
    /// Byte budget.
    pub max_size: u64,
    pub utilization_percent: f64,
}
