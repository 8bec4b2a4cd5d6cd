//! Server-side modules for the fieldsync server of record.

pub mod auth;
pub mod db;
pub mod delta;
pub mod ingest;
pub mod routes;
pub mod tables;
pub mod tenant;

pub use auth::{ApiKeyStore, AuthUser};
pub use delta::DeltaExporter;
pub use ingest::UpsertIngester;
pub use routes::{router, AppState};
pub use tenant::{TenantScope, TenantScopeError};
