use clap::{Args, Subcommand};

use crate::config::Config;

/// Inspect configuration
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Show the effective configuration
    Show,

    /// Print the default config file path
    Path,
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show => {
                println!("database_path: {}", config.database_path.display());
                println!(
                    "sync.server_url: {}",
                    config.sync.server_url.as_deref().unwrap_or("(not set)")
                );
                println!(
                    "sync.api_key: {}",
                    if config.sync.api_key.is_some() {
                        "(set)"
                    } else {
                        "(not set)"
                    }
                );
                println!("sync.auto_sync: {}", config.sync.auto_sync);
                println!("sync.timeout_secs: {}", config.sync.timeout_secs);
                Ok(())
            }
            ConfigSubcommand::Path => {
                println!("{}", Config::default_config_path().display());
                Ok(())
            }
        }
    }
}
