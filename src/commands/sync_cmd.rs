//! Sync CLI commands for synchronizing with the server.

use clap::{Args, Subcommand};
use std::time::Duration;

use crate::config::Config;
use crate::sync::{
    check_server, outbox, CursorStore, HttpTransport, LocalReplica, SyncDriver,
};

/// Sync with the remote server
#[derive(Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,
}

#[derive(Subcommand)]
enum SyncSubcommand {
    /// Show sync configuration, cursor position, and server status
    Status,

    /// Drop the cursor so the next sync performs a full pull
    Reset,
}

impl SyncCommand {
    pub async fn run(
        &self,
        replica: &LocalReplica,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            None => self.sync(replica, config).await,
            Some(SyncSubcommand::Status) => self.status(replica, config).await,
            Some(SyncSubcommand::Reset) => self.reset(replica).await,
        }
    }

    async fn sync(
        &self,
        replica: &LocalReplica,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (server_url, api_key) = require_configured(config)?;

        println!("Syncing with server...");

        let transport = HttpTransport::new(
            server_url,
            api_key,
            Duration::from_secs(config.sync.timeout_secs),
        )?;
        let mut driver = SyncDriver::new(replica.pool().clone(), transport);

        let report = driver.run_cycle().await?;

        println!(
            "  ✓ pushed {} row(s), pulled {} row(s){}",
            report.pushed,
            report.pulled,
            if report.full_pull { " (full pull)" } else { "" }
        );
        println!("Sync complete.");

        Ok(())
    }

    async fn status(
        &self,
        replica: &LocalReplica,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        println!("Sync Configuration");
        println!("==================");
        println!();

        if !config.sync.is_configured() {
            println!("Status: Not configured");
            println!();
            println!("To enable sync, add to your config file:");
            println!();
            println!("  sync:");
            println!("    server_url: \"http://localhost:8080\"");
            println!("    api_key: \"your-api-key\"");
            println!("    auto_sync: false");
            println!();
            println!("Or set environment variables:");
            println!("  FIELDSYNC_SYNC_URL");
            println!("  FIELDSYNC_SYNC_API_KEY");
            return Ok(());
        }

        let (server_url, api_key) = require_configured(config)?;

        println!("Server:    {}", server_url);
        println!("API Key:   {}...", &api_key[..api_key.len().min(8)]);
        println!(
            "Auto-sync: {}",
            if config.sync.auto_sync {
                "enabled"
            } else {
                "disabled"
            }
        );

        let cursor = CursorStore::new(replica.pool().clone()).get().await?;
        match cursor {
            Some(ts) => println!("Cursor:    {}", ts.to_rfc3339()),
            None => println!("Cursor:    none (next sync is a full pull)"),
        }

        let depth = outbox::depth(replica.pool()).await?;
        println!("Outbox:    {} pending write(s)", depth);
        println!();

        print!("Server status: ");
        if check_server(server_url).await {
            println!("✓ reachable");
        } else {
            println!("✗ unreachable");
        }

        Ok(())
    }

    async fn reset(&self, replica: &LocalReplica) -> Result<(), Box<dyn std::error::Error>> {
        CursorStore::new(replica.pool().clone()).clear().await?;
        println!("Cursor cleared. The next sync will pull everything.");
        Ok(())
    }
}

fn require_configured(config: &Config) -> Result<(&str, &str), Box<dyn std::error::Error>> {
    match (
        config.sync.server_url.as_deref(),
        config.sync.api_key.as_deref(),
    ) {
        (Some(url), Some(key)) => Ok((url, key)),
        _ => Err("Sync not configured. Add server_url and api_key to config.".into()),
    }
}
