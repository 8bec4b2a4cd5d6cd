//! Batch upsert ingestion.
//!
//! Applies a client push inside one already-open [`TenantScope`]: every row
//! of every entity type lands in the same transaction, so the batch commits
//! or rolls back as a unit and a failed push can be retried whole.

use crate::protocol::{EntityCounts, UpsertBatch};
use crate::server::tables::SyncRecord;
use crate::server::tenant::TenantScope;

/// Errors applying a push batch.
#[derive(Debug)]
pub enum IngestError {
    /// A row violated a table constraint (bad enum value, missing field).
    Constraint(String),
    /// Any other storage error.
    Storage(sqlx::Error),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Constraint(msg) => write!(f, "Batch rejected: {}", msg),
            IngestError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestError::Storage(e) => Some(e),
            IngestError::Constraint(_) => None,
        }
    }
}

impl From<sqlx::Error> for IngestError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(db) => IngestError::Constraint(db.message().to_string()),
            other => IngestError::Storage(other),
        }
    }
}

/// Applies a grouped batch of row upserts for one org.
pub struct UpsertIngester<'a> {
    scope: &'a mut TenantScope,
    org_id: &'a str,
}

impl<'a> UpsertIngester<'a> {
    pub fn new(scope: &'a mut TenantScope, org_id: &'a str) -> Self {
        Self { scope, org_id }
    }

    /// Upserts every row in the batch.
    ///
    /// Insert when the id is new; otherwise last-write-wins against the
    /// stored `updated_at`. The written `org_id` is always the
    /// authenticated caller's, whatever the payload claimed. The caller
    /// commits the surrounding scope; any error here leaves the whole batch
    /// unapplied.
    ///
    /// Returned counts are the batch's per-entity sizes, so an identical
    /// retried batch reports identical counts.
    pub async fn apply(&mut self, batch: &UpsertBatch) -> Result<EntityCounts, IngestError> {
        self.apply_group(&batch.jobs).await?;
        self.apply_group(&batch.materials).await?;
        self.apply_group(&batch.pins).await?;
        self.apply_group(&batch.checklist).await?;

        Ok(batch.counts())
    }

    async fn apply_group<T: SyncRecord>(&mut self, rows: &[T]) -> Result<(), IngestError> {
        if rows.is_empty() {
            return Ok(());
        }

        let sql = T::TABLE.upsert_sql();
        for row in rows {
            let query = sqlx::query(&sql).bind(row.id()).bind(self.org_id);
            let query = row.bind_payload(query);
            query
                .bind(row.updated_at())
                .execute(&mut *self.scope.conn())
                .await?;
        }

        tracing::debug!(
            table = T::TABLE.table,
            rows = rows.len(),
            "applied upsert group"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_mapping() {
        let err = IngestError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, IngestError::Storage(_)));
    }

    #[test]
    fn test_constraint_display() {
        let err = IngestError::Constraint("bad profit_chip".into());
        assert!(err.to_string().contains("Batch rejected"));
    }
}
