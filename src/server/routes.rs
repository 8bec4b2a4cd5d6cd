//! HTTP surface of the sync server.
//!
//! # Endpoints
//!
//! - `GET /health`: health check (no auth)
//! - `GET /me`: current caller identity (auth required)
//! - `GET /sync?since=<rfc3339>`: delta pull (auth required)
//! - `POST /sync`: batch push, answered `202 Accepted` (auth required)

use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::protocol::{PullResponse, PushRequest, PushResponse};
use crate::server::auth::{auth_middleware, ApiKeyStore, AuthUser};
use crate::server::delta::{DeltaError, DeltaExporter};
use crate::server::ingest::{IngestError, UpsertIngester};
use crate::server::tenant::{TenantScope, TenantScopeError};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub api_keys: Arc<ApiKeyStore>,
}

/// Builds the full router: public routes, authenticated sync routes, and
/// request tracing.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        .route("/me", get(me))
        .route("/sync", get(pull).post(push))
        .layer(middleware::from_fn_with_state(
            state.api_keys.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Error mapping
// ============================================================================

/// Error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// Errors a sync handler can surface.
#[derive(Debug)]
pub enum SyncApiError {
    InvalidSince(String),
    Tenant(TenantScopeError),
    Ingest(IngestError),
    Delta(DeltaError),
}

impl From<TenantScopeError> for SyncApiError {
    fn from(e: TenantScopeError) -> Self {
        SyncApiError::Tenant(e)
    }
}

impl From<IngestError> for SyncApiError {
    fn from(e: IngestError) -> Self {
        SyncApiError::Ingest(e)
    }
}

impl From<DeltaError> for SyncApiError {
    fn from(e: DeltaError) -> Self {
        SyncApiError::Delta(e)
    }
}

impl IntoResponse for SyncApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            SyncApiError::InvalidSince(raw) => (
                StatusCode::BAD_REQUEST,
                "invalid_since",
                format!("'{}' is not an RFC 3339 timestamp", raw),
            ),
            SyncApiError::Tenant(TenantScopeError::PoolExhausted) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "overloaded",
                "No database connection available".to_string(),
            ),
            SyncApiError::Ingest(IngestError::Constraint(msg)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_batch", msg)
            }
            SyncApiError::Tenant(e) => {
                tracing::error!("tenant scope failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage",
                    "Storage failure".to_string(),
                )
            }
            SyncApiError::Ingest(e) => {
                tracing::error!("push failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage",
                    "Storage failure".to_string(),
                )
            }
            SyncApiError::Delta(e) => {
                tracing::error!("pull failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage",
                    "Storage failure".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error, message })).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint (no auth required).
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Current user response.
#[derive(Serialize)]
struct MeResponse {
    user_id: String,
    org_id: String,
}

/// Get current caller identity (auth required).
async fn me(Extension(user): Extension<AuthUser>) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: user.user_id,
        org_id: user.org_id,
    })
}

#[derive(Debug, Deserialize)]
struct PullParams {
    since: Option<String>,
}

/// Delta pull. `since` absent means full pull.
async fn pull(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<PullParams>,
) -> Result<Json<PullResponse>, SyncApiError> {
    let since = match params.since.as_deref() {
        Some(raw) => Some(parse_since(raw)?),
        None => None,
    };

    let mut scope = TenantScope::begin_snapshot(&state.pool, &user.org_id).await?;
    let response = DeltaExporter::new(&mut scope).export(since).await?;
    scope.commit().await?;

    tracing::info!(
        user = %user.user_id,
        full = since.is_none(),
        "pull served"
    );

    Ok(Json(response))
}

/// Batch push. The whole batch commits or none of it does.
async fn push(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<PushRequest>,
) -> Result<(StatusCode, Json<PushResponse>), SyncApiError> {
    let mut scope = TenantScope::begin(&state.pool, &user.org_id).await?;
    let counts = UpsertIngester::new(&mut scope, &user.org_id)
        .apply(&request.upserts)
        .await?;
    scope.commit().await?;

    tracing::info!(
        user = %user.user_id,
        jobs = counts.jobs,
        materials = counts.materials,
        pins = counts.pins,
        checklist = counts.checklist,
        "push accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(PushResponse {
            idempotency_key: request.idempotency_key,
            accepted: true,
            counts,
        }),
    ))
}

fn parse_since(raw: &str) -> Result<DateTime<Utc>, SyncApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| SyncApiError::InvalidSince(raw.to_string()))
}
