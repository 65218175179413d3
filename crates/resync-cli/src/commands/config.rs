//! Config command - show, locate and initialize the configuration file.

use anyhow::{Context, Result};
use resync_core::Config;

use crate::cli::ConfigAction;
use crate::util::{Env, ensure_writable};

/// Execute the config command.
pub fn cmd_config(action: ConfigAction, env: &Env) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let rendered =
                toml::to_string_pretty(&env.config).context("Failed to render configuration")?;
            print!("{}", rendered);
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", env.config_path.display());
            Ok(())
        }
        ConfigAction::Init { force } => {
            ensure_writable(&env.config_path, force)?;
            Config::default().save(&env.config_path)?;
            println!("Wrote {}", env.config_path.display());
            Ok(())
        }
        ConfigAction::Validate => {
            env.config.validate()?;
            println!("{} is valid", env.config_path.display());
            Ok(())
        }
    }
}
