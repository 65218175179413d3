//! `resync` - inspect and maintain an offline-resilience store.

mod cli;
mod commands;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ConfigAction};
use commands::{cmd_cache, cmd_config, cmd_probe, cmd_queue, cmd_status};
use util::Env;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else if cli.verbose {
        EnvFilter::new("resync=debug,resync_core=debug,resync_store=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // `config init` must work before a valid file exists.
    let env = match &cli.command {
        Commands::Config {
            action: ConfigAction::Init { .. } | ConfigAction::Path,
        } => Env::unloaded(cli.config.as_deref(), cli.database.as_deref(), cli.no_color),
        _ => Env::load(cli.config.as_deref(), cli.database.as_deref(), cli.no_color)?,
    };

    match cli.command {
        Commands::Status { json, probe } => cmd_status(&env, json, probe).await,
        Commands::Queue { action } => cmd_queue(action, &env),
        Commands::Cache { action } => cmd_cache(action, &env),
        Commands::Probe { urls, timeout, json } => cmd_probe(&env, urls, timeout, json).await,
        Commands::Config { action } => cmd_config(action, &env),
    }
}
