//! Auto-sync for CLI commands.
//!
//! When `auto_sync` is enabled in the configuration, write commands attempt
//! a sync cycle afterwards. Any failure is reported and swallowed - the CLI
//! must keep working offline when the server is unavailable.

use sqlx::SqlitePool;
use std::time::Duration;

use crate::config::Config;
use crate::sync::driver::SyncDriver;
use crate::sync::transport::{check_server, HttpTransport};

/// Performs a best-effort sync cycle if auto-sync is enabled.
///
/// This function:
/// 1. Checks if auto_sync is enabled in config
/// 2. Checks if sync is configured (server_url and api_key present)
/// 3. Checks if the server is reachable (fast fail)
/// 4. Runs one sync cycle
pub async fn try_auto_sync(config: &Config, pool: &SqlitePool) {
    if !config.sync.auto_sync || !config.sync.is_configured() {
        return;
    }

    let (server_url, api_key) = match (&config.sync.server_url, &config.sync.api_key) {
        (Some(url), Some(key)) => (url, key),
        _ => return,
    };

    if !check_server(server_url).await {
        eprintln!("Auto-sync: server unreachable, skipping");
        return;
    }

    let transport = match HttpTransport::new(
        server_url,
        api_key,
        Duration::from_secs(config.sync.timeout_secs),
    ) {
        Ok(transport) => transport,
        Err(_) => return,
    };

    let mut driver = SyncDriver::new(pool.clone(), transport);
    if let Err(e) = driver.run_cycle().await {
        eprintln!("Auto-sync: {}", e);
    }
}
