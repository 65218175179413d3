//! Utility functions shared by the commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use resync_core::{Config, default_config_path};
use resync_store::{OfflineStorage, SqliteStore};
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Resolved configuration plus where it came from.
pub struct Env {
    pub config: Config,
    pub config_path: PathBuf,
    pub database: PathBuf,
    pub no_color: bool,
}

impl Env {
    /// Load the configuration and resolve the database path.
    ///
    /// An explicit `--config` must exist; the default path may be missing.
    pub fn load(config: Option<&Path>, database: Option<&Path>, no_color: bool) -> Result<Self> {
        let (config, config_path) = match config {
            Some(path) => {
                let config = Config::load_validated(path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?;
                (config, path.to_path_buf())
            }
            None => {
                let config = Config::load_default().context("Failed to load default config")?;
                config.validate()?;
                (config, default_config_path())
            }
        };

        let database = database
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config.storage.path.clone());

        Ok(Self {
            config,
            config_path,
            database,
            no_color,
        })
    }

    /// Resolve paths without reading the configuration file.
    pub fn unloaded(config: Option<&Path>, database: Option<&Path>, no_color: bool) -> Self {
        let config_path = config
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);
        let config = Config::default();
        let database = database
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config.storage.path.clone());
        Self {
            config,
            config_path,
            database,
            no_color,
        }
    }

    /// Open the offline storage on top of the configured database.
    pub fn open_storage(&self) -> Result<Arc<OfflineStorage>> {
        let backend = SqliteStore::open(&self.database)
            .with_context(|| format!("Failed to open database {}", self.database.display()))?;
        tracing::debug!("Opened database at {}", self.database.display());
        Ok(Arc::new(OfflineStorage::new(
            Arc::new(backend),
            self.config.storage.options(),
        )))
    }
}

/// Parse a JSON argument.
pub fn parse_json(input: &str) -> Result<Value> {
    serde_json::from_str(input).with_context(|| format!("Invalid JSON: {}", input))
}

/// Print a value as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn format_timestamp(ts: OffsetDateTime) -> Result<String> {
    Ok(ts.format(&Rfc3339)?)
}

/// Human readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// Refuse to continue when `path` exists unless `force` is set.
pub fn ensure_writable(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        );
    }
    Ok(())
}
