//! Command implementations for the CLI.

mod cache;
mod config;
mod probe;
mod queue;
mod status;

pub use cache::cmd_cache;
pub use config::cmd_config;
pub use probe::cmd_probe;
pub use queue::cmd_queue;
pub use status::cmd_status;
