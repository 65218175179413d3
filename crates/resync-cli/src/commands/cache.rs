//! Cache command - inspect and edit cached entries.

use std::time::Duration;

use anyhow::{Result, bail};
use resync_core::QUEUE_KEY;
use resync_store::{OfflineStorage, StoreOptions};
use serde_json::Value;

use crate::cli::CacheAction;
use crate::util::{Env, parse_json, print_json};

/// Execute the cache command.
pub fn cmd_cache(action: CacheAction, env: &Env) -> Result<()> {
    let storage = env.open_storage()?;

    match action {
        CacheAction::List => list_keys(&storage),
        CacheAction::Get { key } => match storage.try_retrieve::<Value>(&key)? {
            Some(value) => print_json(&value),
            None => bail!("No cached value for '{}'", key),
        },
        CacheAction::Put {
            key,
            value,
            ttl,
            priority,
            never_expires,
        } => {
            let value = parse_json(&value)?;
            let options = put_options(ttl, priority, never_expires);
            storage.try_store(&key, &value, options)?;
            println!("Cached '{}'", key);
            Ok(())
        }
        CacheAction::Remove { key } => {
            if !storage.remove(&key) {
                bail!("Failed to remove '{}'", key);
            }
            println!("Removed '{}'", key);
            Ok(())
        }
        CacheAction::Clear => {
            if !storage.clear() {
                bail!("Failed to clear every entry; see log output");
            }
            println!("Cleared offline storage");
            Ok(())
        }
        CacheAction::Purge => {
            let purged = storage.cleanup_expired();
            println!("Purged {} expired entr{}", purged, if purged == 1 { "y" } else { "ies" });
            Ok(())
        }
    }
}

fn list_keys(storage: &OfflineStorage) -> Result<()> {
    let mut keys = storage.keys();
    if keys.is_empty() {
        println!("Cache is empty.");
        return Ok(());
    }

    keys.sort();
    for key in keys {
        if key == QUEUE_KEY {
            println!("{}  (pending queue)", key);
        } else {
            println!("{}", key);
        }
    }
    Ok(())
}

fn put_options(
    ttl: Option<u64>,
    priority: resync_types::Priority,
    never_expires: bool,
) -> StoreOptions {
    let mut options = StoreOptions::new().priority(priority);
    if never_expires {
        options = options.never_expires();
    } else if let Some(secs) = ttl {
        options = options.ttl(Duration::from_secs(secs));
    }
    options
}
