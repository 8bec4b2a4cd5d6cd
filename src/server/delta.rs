//! Delta export.
//!
//! Produces everything changed since a watermark within one transactional
//! snapshot. The caller opens the scope with
//! [`TenantScope::begin_snapshot`](crate::server::tenant::TenantScope::begin_snapshot)
//! so the four entity reads and the `now` read cannot disagree.

use chrono::{DateTime, Utc};

use crate::models::{ChecklistItem, Job, MaterialLine, Pin};
use crate::protocol::PullResponse;
use crate::server::tables::SyncRecord;
use crate::server::tenant::TenantScope;

/// Errors exporting a delta.
#[derive(Debug)]
pub enum DeltaError {
    Storage(sqlx::Error),
}

impl std::fmt::Display for DeltaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeltaError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for DeltaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeltaError::Storage(e) => Some(e),
        }
    }
}

impl From<sqlx::Error> for DeltaError {
    fn from(e: sqlx::Error) -> Self {
        DeltaError::Storage(e)
    }
}

/// Read-only export of all rows changed since a watermark.
pub struct DeltaExporter<'a> {
    scope: &'a mut TenantScope,
}

impl<'a> DeltaExporter<'a> {
    pub fn new(scope: &'a mut TenantScope) -> Self {
        Self { scope }
    }

    /// Returns every row with `updated_at > since` (all rows when `since`
    /// is absent), each list ascending by `updated_at`, plus the snapshot's
    /// own `now`.
    ///
    /// `now` is deliberately the transaction time, not the maximum row
    /// timestamp: a client using it as its next `since` misses nothing that
    /// committed before this snapshot.
    ///
    /// Any query error aborts the whole export; a partial delta is never
    /// returned.
    pub async fn export(
        &mut self,
        since: Option<DateTime<Utc>>,
    ) -> Result<PullResponse, DeltaError> {
        let now: DateTime<Utc> = sqlx::query_scalar("SELECT now()")
            .fetch_one(&mut *self.scope.conn())
            .await?;

        let jobs = self.fetch::<Job>(since).await?;
        let materials = self.fetch::<MaterialLine>(since).await?;
        let pins = self.fetch::<Pin>(since).await?;
        let checklist = self.fetch::<ChecklistItem>(since).await?;

        tracing::debug!(
            jobs = jobs.len(),
            materials = materials.len(),
            pins = pins.len(),
            checklist = checklist.len(),
            "exported delta"
        );

        Ok(PullResponse {
            since,
            now,
            jobs,
            materials,
            pins,
            checklist,
        })
    }

    async fn fetch<T: SyncRecord>(
        &mut self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<T>, DeltaError> {
        let sql = T::TABLE.select_sql(since.is_some());

        let rows = match since {
            Some(since) => {
                sqlx::query(&sql)
                    .bind(since)
                    .fetch_all(&mut *self.scope.conn())
                    .await?
            }
            None => sqlx::query(&sql).fetch_all(&mut *self.scope.conn()).await?,
        };

        rows.iter()
            .map(|row| T::from_row(row).map_err(DeltaError::from))
            .collect()
    }
}
