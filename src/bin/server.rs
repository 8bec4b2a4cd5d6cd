//! fieldsync sync server
//!
//! The multi-tenant server of record for fieldsync clients. Stores rows in
//! PostgreSQL with row-level security per org and serves the pull/push sync
//! contract.
//!
//! # Configuration
//!
//! Environment variables:
//! - `FIELDSYNC_PORT`: Port to listen on (default: 8080)
//! - `FIELDSYNC_DATABASE_URL`: PostgreSQL connection URL (required)
//! - `FIELDSYNC_CONFIG`: Path to the API key file (default:
//!   ~/.config/fieldsync-server/config.yaml)
//!
//! # Key File Format
//!
//! ```yaml
//! api_keys:
//!   - key: "your-secret-key-here"
//!     user_id: "lineman1"
//!     org_id: "acme-power"
//! ```
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint (no auth required)
//! - `GET /me`: Returns current user info (auth required)
//! - `GET /sync`: Delta pull (auth required)
//! - `POST /sync`: Batch push (auth required)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fieldsync::server::{db, router, ApiKeyStore, AppState};

/// Server configuration
#[derive(Debug, Clone)]
struct Config {
    /// Port to listen on
    port: u16,
    /// PostgreSQL connection URL
    database_url: Option<String>,
    /// Path to the API key file
    config_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let port = std::env::var("FIELDSYNC_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let database_url = std::env::var("FIELDSYNC_DATABASE_URL").ok();

        let config_path = std::env::var("FIELDSYNC_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("fieldsync-server")
                    .join("config.yaml")
            });

        Self {
            port,
            database_url,
            config_path,
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldsync_server=info,fieldsync=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();

    let database_url = match config.database_url {
        Some(url) => url,
        None => {
            tracing::error!("FIELDSYNC_DATABASE_URL must be set");
            std::process::exit(1);
        }
    };

    tracing::info!("Key file: {}", config.config_path.display());

    // Connect and migrate
    let pool = match db::init_db(&database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    // Load API keys
    let api_keys = Arc::new(ApiKeyStore::load(&config.config_path));

    // Build app state and router
    let state = AppState { pool, api_keys };
    let app = router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
