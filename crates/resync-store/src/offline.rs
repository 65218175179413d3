//! Capacity- and TTL-bounded offline cache.
//!
//! [`OfflineStorage`] wraps every value in a [`StorageItem`] carrying its write
//! time, TTL, priority and estimated size, and keeps the sum of sizes under a
//! byte budget.
//!
//! # Eviction
//!
//! When a write would not fit, eviction runs before the write:
//!
//! 1. Every expired (or undecodable) entry is purged.
//! 2. If usage is still above 80% of the budget, or the new item still does
//!    not fit, the remaining entries are removed in priority order (low
//!    first), oldest first within a priority, until both conditions hold.
//!
//! Pinned keys are never chosen for eviction.
//!
//! # Failure handling
//!
//! [`OfflineStorage::store`] and [`OfflineStorage::retrieve`] never return
//! errors: failures are logged and degrade to `false` / `None`. Use the
//! `try_` variants to observe the underlying [`Error`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use resync_types::{Clock, Priority, SystemClock};

use crate::backend::KeyValueStore;
use crate::error::{Error, Result};
use crate::models::{NEVER_EXPIRES, StorageInfo, StorageItem, StoreOptions};

/// Namespace for every key this cache writes into the backend.
pub const KEY_PREFIX: &str = "resync:";

/// Usage ratio eviction drives the cache down to.
pub const EVICTION_TARGET_RATIO: f64 = 0.8;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Budget and defaults for an [`OfflineStorage`].
#[derive(Debug, Clone)]
pub struct StorageOptions {
    /// Byte budget for the sum of item sizes.
    pub max_size: u64,
    /// TTL applied when a write does not specify one.
    pub default_ttl: Duration,
    /// Reserved; has no effect on stored data.
    pub compression: bool,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            max_size: 50 * 1024 * 1024,
            default_ttl: Duration::from_secs(24 * 60 * 60),
            compression: false,
        }
    }
}

impl StorageOptions {
    /// Options with a budget given in megabytes.
    pub fn with_max_size_mb(mb: f64) -> Self {
        Self {
            max_size: (mb.max(0.0) * BYTES_PER_MB) as u64,
            ..Default::default()
        }
    }

    pub fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }
}

/// A raw backend entry; `item` is `None` when the stored text does not decode.
struct Entry {
    key: String,
    item: Option<StorageItem>,
}

impl Entry {
    fn size(&self) -> u64 {
        self.item.as_ref().map_or(0, |i| i.size)
    }
}

/// Durable cache with per-item TTL and a global byte budget.
pub struct OfflineStorage {
    backend: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    options: StorageOptions,
    pinned: RwLock<HashSet<String>>,
    /// Serializes read-modify-write sequences (size accounting + eviction).
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for OfflineStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineStorage")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl OfflineStorage {
    /// Create a cache over `backend` using the system clock.
    pub fn new(backend: Arc<dyn KeyValueStore>, options: StorageOptions) -> Self {
        Self::with_clock(backend, options, Arc::new(SystemClock))
    }

    /// Create a cache with an explicit time source.
    pub fn with_clock(
        backend: Arc<dyn KeyValueStore>,
        options: StorageOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        if options.compression {
            debug!("compression flag set; values are stored uncompressed");
        }
        Self {
            backend,
            clock,
            options,
            pinned: RwLock::new(HashSet::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Get the configured options.
    pub fn options(&self) -> &StorageOptions {
        &self.options
    }

    /// Get the time source.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Exclude `key` from capacity eviction. It still counts toward the budget.
    pub fn pin(&self, key: &str) {
        if let Ok(mut pinned) = self.pinned.write() {
            pinned.insert(key.to_string());
        }
    }

    /// Store `data` under `key`. Returns `false` on any failure.
    pub fn store<T: Serialize + ?Sized>(&self, key: &str, data: &T, options: StoreOptions) -> bool {
        match self.try_store(key, data, options) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to store '{}': {}", key, e);
                false
            }
        }
    }

    /// Store `data` under `key`, evicting other entries if needed.
    pub fn try_store<T: Serialize + ?Sized>(
        &self,
        key: &str,
        data: &T,
        options: StoreOptions,
    ) -> Result<()> {
        let data = serde_json::to_value(data)?;
        let size = estimate_size(&data)?;
        let max_size = self.options.max_size;

        if size > max_size {
            return Err(Error::ItemTooLarge {
                key: key.to_string(),
                size,
                max_size,
            });
        }

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let full_key = namespaced(key);
        let now = self.clock.now();

        let mut entries = self.load_entries()?;
        if projected(&entries, &full_key, size) > max_size {
            self.evict(&mut entries, &full_key, size, now)?;

            let used = projected(&entries, &full_key, size);
            if used > max_size {
                return Err(Error::CapacityExceeded {
                    key: key.to_string(),
                    size,
                    used: used - size,
                    max_size,
                });
            }
        }

        let ttl = if options.never_expires {
            NEVER_EXPIRES
        } else {
            let ttl = options.ttl.unwrap_or(self.options.default_ttl);
            u64::try_from(ttl.as_millis()).unwrap_or(NEVER_EXPIRES - 1)
        };

        let item = StorageItem {
            data,
            timestamp: now,
            ttl,
            priority: options.priority.unwrap_or_default(),
            size,
        };
        self.backend.set(&full_key, &serde_json::to_string(&item)?)?;
        debug!("Stored '{}' ({} bytes, {:?})", key, size, item.priority);
        Ok(())
    }

    /// Read `key`, or `None` if absent, expired, or unreadable.
    pub fn retrieve<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_retrieve(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to retrieve '{}': {}", key, e);
                None
            }
        }
    }

    /// Read `key`. Expired entries are deleted as a side effect.
    pub fn try_retrieve<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let full_key = namespaced(key);
        let Some(raw) = self.backend.get(&full_key)? else {
            return Ok(None);
        };

        let item: StorageItem = match serde_json::from_str(&raw) {
            Ok(item) => item,
            Err(e) => {
                let _ = self.remove_if_unchanged(&full_key, &raw);
                return Err(e.into());
            }
        };

        if item.is_expired(self.clock.now()) {
            debug!("'{}' expired; removing", key);
            if let Err(e) = self.remove_if_unchanged(&full_key, &raw) {
                warn!("Failed to remove expired '{}': {}", key, e);
            }
            return Ok(None);
        }

        Ok(Some(serde_json::from_value(item.data)?))
    }

    /// Delete `full_key` only if it still holds `seen`.
    ///
    /// A writer may replace the entry between the unlocked read in
    /// [`try_retrieve`](Self::try_retrieve) and this call; its value is kept.
    fn remove_if_unchanged(&self, full_key: &str, seen: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        match self.backend.get(full_key)? {
            Some(current) if current == seen => self.backend.remove(full_key),
            _ => Ok(false),
        }
    }

    /// Delete `key`. Idempotent; returns `false` only on backend failure.
    pub fn remove(&self, key: &str) -> bool {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        match self.backend.remove(&namespaced(key)) {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to remove '{}': {}", key, e);
                false
            }
        }
    }

    /// Delete every entry in the cache namespace.
    pub fn clear(&self) -> bool {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let keys = match self.backend.keys(KEY_PREFIX) {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Failed to list keys for clear: {}", e);
                return false;
            }
        };

        let mut ok = true;
        for key in keys {
            if let Err(e) = self.backend.remove(&key) {
                warn!("Failed to remove '{}': {}", key, e);
                ok = false;
            }
        }
        info!("Cleared offline storage");
        ok
    }

    /// Purge expired and undecodable entries. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        match self.load_entries() {
            Ok(mut entries) => self.purge_expired(&mut entries, self.clock.now()),
            Err(e) => {
                warn!("Failed to load entries for cleanup: {}", e);
                0
            }
        }
    }

    /// Live (unexpired) keys, without the namespace prefix.
    pub fn keys(&self) -> Vec<String> {
        let now = self.clock.now();
        match self.load_entries() {
            Ok(entries) => entries
                .into_iter()
                .filter(|e| e.item.as_ref().is_some_and(|i| !i.is_expired(now)))
                .filter_map(|e| e.key.strip_prefix(KEY_PREFIX).map(str::to_string))
                .collect(),
            Err(e) => {
                warn!("Failed to list keys: {}", e);
                Vec::new()
            }
        }
    }

    /// Capacity report over every decodable entry.
    pub fn storage_info(&self) -> StorageInfo {
        let entries = self.load_entries().unwrap_or_else(|e| {
            warn!("Failed to read storage info: {}", e);
            Vec::new()
        });
        let total_items = entries.iter().filter(|e| e.item.is_some()).count();
        let total_size: u64 = entries.iter().map(Entry::size).sum();
        let max_size = self.options.max_size;
        let utilization_percent = if max_size == 0 {
            0.0
        } else {
            total_size as f64 / max_size as f64 * 100.0
        };

        StorageInfo {
            total_items,
            total_size,
            max_size,
            utilization_percent,
        }
    }

    fn load_entries(&self) -> Result<Vec<Entry>> {
        let keys = self.backend.keys(KEY_PREFIX)?;
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            // A key can vanish between listing and reading; skip it.
            let Some(raw) = self.backend.get(&key)? else {
                continue;
            };
            let item = serde_json::from_str::<StorageItem>(&raw).ok();
            entries.push(Entry { key, item });
        }
        Ok(entries)
    }

    fn purge_expired(&self, entries: &mut Vec<Entry>, now: OffsetDateTime) -> usize {
        let before = entries.len();
        entries.retain(|entry| {
            let dead = entry.item.as_ref().is_none_or(|i| i.is_expired(now));
            if dead && let Err(e) = self.backend.remove(&entry.key) {
                warn!("Failed to purge '{}': {}", entry.key, e);
            }
            !dead
        });
        let purged = before - entries.len();
        if purged > 0 {
            debug!("Purged {} expired entries", purged);
        }
        purged
    }

    fn evict(
        &self,
        entries: &mut Vec<Entry>,
        protect: &str,
        incoming: u64,
        now: OffsetDateTime,
    ) -> Result<()> {
        self.purge_expired(entries, now);

        let max_size = self.options.max_size;
        let target = (max_size as f64 * EVICTION_TARGET_RATIO) as u64;
        let satisfied = |entries: &[Entry]| {
            let used: u64 = entries.iter().map(Entry::size).sum();
            used <= target && projected(entries, protect, incoming) <= max_size
        };

        if satisfied(entries) {
            return Ok(());
        }

        let pinned: HashSet<String> = self
            .pinned
            .read()
            .map(|p| p.iter().map(|k| namespaced(k)).collect())
            .unwrap_or_default();

        let mut candidates: Vec<(Priority, OffsetDateTime, String)> = entries
            .iter()
            .filter(|e| e.key != protect && !pinned.contains(&e.key))
            .filter_map(|e| e.item.as_ref().map(|i| (i.priority, i.timestamp, e.key.clone())))
            .collect();
        candidates.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut evicted = 0usize;
        for (priority, _, key) in candidates {
            if satisfied(entries) {
                break;
            }
            self.backend.remove(&key)?;
            entries.retain(|e| e.key != key);
            evicted += 1;
            debug!("Evicted '{}' ({:?})", key, priority);
        }

        if evicted > 0 {
            let used: u64 = entries.iter().map(Entry::size).sum();
            info!(
                "Evicted {} entries, {} of {} bytes in use",
                evicted, used, max_size
            );
        }
        Ok(())
    }
}

fn namespaced(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
}

/// Usage after writing `incoming` bytes to `key`, replacing any current value.
fn projected(entries: &[Entry], key: &str, incoming: u64) -> u64 {
    let used: u64 = entries.iter().map(Entry::size).sum();
    let replaced = entries
        .iter()
        .find(|e| e.key == key)
        .map_or(0, Entry::size);
    used - replaced + incoming
}

/// Byte estimate of a JSON payload: the length of its compact encoding.
pub fn estimate_size(data: &serde_json::Value) -> Result<u64> {
    Ok(serde_json::to_vec(data)?.len() as u64)
}
