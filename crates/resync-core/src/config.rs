//! Engine configuration.
//!
//! Configuration is read from TOML. Every section and field is optional and
//! falls back to its default, so an empty file is a valid configuration.
//!
//! ```toml
//! [storage]
//! max_size_mb = 50.0
//! default_ttl_secs = 86400
//! path = "/var/lib/resync/engine.db"
//!
//! [queue]
//! batch_size = 5
//! batch_delay_ms = 100
//! max_wait_time_secs = 30
//! priority_order = true
//! default_max_retries = 3
//!
//! [monitor]
//! poll_interval_secs = 30
//! event_capacity = 100
//! probe_targets = ["https://example.com"]
//! probe_timeout_secs = 5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use resync_store::StorageOptions;
use resync_types::DEFAULT_MAX_RETRIES;

use crate::queue::DrainStrategy;

/// Largest accepted batch size.
pub const MAX_BATCH_SIZE: usize = 100;
/// Longest accepted poll interval in seconds (1 hour).
pub const MAX_POLL_INTERVAL: u64 = 3600;

/// Engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Offline storage settings.
    pub storage: StorageConfig,
    /// Queue drain settings.
    pub queue: QueueConfig,
    /// Connectivity monitoring settings.
    pub monitor: MonitorConfig,
}

impl Config {
    /// Load configuration from the default path, or defaults if it does not exist.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate every section, collecting all problems.
    ///
    /// # Example
    ///
    /// ```
    /// use resync_core::Config;
    ///
    /// let config = Config::default();
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.storage.validate());
        errors.extend(self.queue.validate());
        errors.extend(self.monitor.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Offline storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Byte budget in megabytes.
    pub max_size_mb: f64,
    /// TTL for entries written without one, in seconds.
    pub default_ttl_secs: u64,
    /// Reserved.
    pub compression: bool,
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_size_mb: 50.0,
            default_ttl_secs: 24 * 60 * 60,
            compression: false,
            path: resync_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !self.max_size_mb.is_finite() || self.max_size_mb <= 0.0 {
            errors.push(ValidationError {
                field: "storage.max_size_mb".to_string(),
                message: format!("must be a positive number, got {}", self.max_size_mb),
            });
        }
        if self.default_ttl_secs == 0 {
            errors.push(ValidationError {
                field: "storage.default_ttl_secs".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.path".to_string(),
                message: "database path cannot be empty".to_string(),
            });
        }

        errors
    }

    /// Options for [`resync_store::OfflineStorage`].
    pub fn options(&self) -> StorageOptions {
        StorageOptions::with_max_size_mb(self.max_size_mb)
            .default_ttl(Duration::from_secs(self.default_ttl_secs))
            .compression(self.compression)
    }
}

/// Queue drain settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub max_wait_time_secs: u64,
    pub priority_order: bool,
    /// Retry budget for actions that do not specify one.
    pub default_max_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        let strategy = DrainStrategy::default();
        Self {
            batch_size: strategy.batch_size,
            batch_delay_ms: strategy.batch_delay.as_millis() as u64,
            max_wait_time_secs: strategy.max_wait_time.as_secs(),
            priority_order: strategy.priority_order,
            default_max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl QueueConfig {
    /// Validate queue configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            errors.push(ValidationError {
                field: "queue.batch_size".to_string(),
                message: format!(
                    "must be between 1 and {}, got {}",
                    MAX_BATCH_SIZE, self.batch_size
                ),
            });
        }
        if self.max_wait_time_secs == 0 {
            errors.push(ValidationError {
                field: "queue.max_wait_time_secs".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        errors
    }

    /// The drain strategy these settings describe.
    pub fn strategy(&self) -> DrainStrategy {
        DrainStrategy {
            batch_size: self.batch_size,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            max_wait_time: Duration::from_secs(self.max_wait_time_secs),
            priority_order: self.priority_order,
        }
    }
}

/// Connectivity monitoring settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Poll the connectivity source this often; 0 relies on change notifications only.
    pub poll_interval_secs: u64,
    /// Capacity of the engine event channel.
    pub event_capacity: usize,
    /// URLs probed by the HTTP connectivity probe.
    pub probe_targets: Vec<String>,
    /// Per-request timeout of the HTTP probe.
    pub probe_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            event_capacity: 100,
            probe_targets: Vec::new(),
            probe_timeout_secs: 5,
        }
    }
}

impl MonitorConfig {
    /// Validate monitor configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.poll_interval_secs > MAX_POLL_INTERVAL {
            errors.push(ValidationError {
                field: "monitor.poll_interval_secs".to_string(),
                message: format!(
                    "must be at most {} (or 0 to disable polling), got {}",
                    MAX_POLL_INTERVAL, self.poll_interval_secs
                ),
            });
        }
        if self.event_capacity == 0 {
            errors.push(ValidationError {
                field: "monitor.event_capacity".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.probe_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "monitor.probe_timeout_secs".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        for (i, target) in self.probe_targets.iter().enumerate() {
            if !target.starts_with("http://") && !target.starts_with("https://") {
                errors.push(ValidationError {
                    field: format!("monitor.probe_targets[{}]", i),
                    message: format!("'{}' is not an http(s) URL", target),
                });
            }
        }

        errors
    }

    /// Poll interval, or `None` when polling is disabled.
    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_secs > 0).then(|| Duration::from_secs(self.poll_interval_secs))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// The field path (e.g., `queue.batch_size`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("resync")
        .join("config.toml")
}
