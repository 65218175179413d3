//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use resync_types::Priority;

#[derive(Parser)]
#[command(name = "resync")]
#[command(author, version, about = "Inspect and maintain an offline-resilience store", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to the per-user config path)
    #[arg(short, long, global = true, env = "RESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database file (overrides storage.path from the config)
    #[arg(short, long, global = true, env = "RESYNC_DATABASE")]
    pub database: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Summarize the pending queue, cache usage and (optionally) connectivity
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Also probe connectivity
        #[arg(short, long)]
        probe: bool,
    },

    /// Inspect or edit the pending action queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Inspect or edit cached entries
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Probe connectivity over HTTP
    Probe {
        /// Targets to probe (defaults to monitor.probe_targets)
        urls: Vec<String>,

        /// Per-request timeout in seconds (defaults to monitor.probe_timeout_secs)
        #[arg(short = 'T', long)]
        timeout: Option<u64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Queue subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum QueueAction {
    /// List pending actions in drain order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Queue an action for the next resync
    Add {
        /// Action type (e.g. "placeBet")
        action_type: String,

        /// JSON payload
        data: String,

        /// Drain priority (low, medium, high, critical)
        #[arg(short, long, default_value = "medium")]
        priority: Priority,

        /// Retry budget (defaults to queue.default_max_retries)
        #[arg(short, long)]
        max_retries: Option<u32>,

        /// Mark the action as needing authentication
        #[arg(long)]
        requires_auth: bool,
    },

    /// Remove one pending action
    #[command(alias = "rm")]
    Drop {
        /// Action id
        id: String,
    },

    /// Remove every pending action
    Clear,
}

/// Cache subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum CacheAction {
    /// List cached keys
    List,

    /// Print a cached value
    Get {
        /// Cache key
        key: String,
    },

    /// Cache a JSON value
    Put {
        /// Cache key
        key: String,

        /// JSON value
        value: String,

        /// Time-to-live in seconds (defaults to storage.default_ttl_secs)
        #[arg(short, long, conflicts_with = "never_expires")]
        ttl: Option<u64>,

        /// Eviction priority (low, medium, high, critical)
        #[arg(short, long, default_value = "medium")]
        priority: Priority,

        /// Keep the entry until it is removed
        #[arg(long)]
        never_expires: bool,
    },

    /// Remove a cached value
    #[command(alias = "rm")]
    Remove {
        /// Cache key
        key: String,
    },

    /// Remove every cached entry, including the pending queue
    Clear,

    /// Remove expired and unreadable entries
    Purge,
}

/// Config subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Show config file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Check the configuration for invalid values
    Validate,
}
