//! Transaction-scoped tenant binding.
//!
//! All server-side reads and writes of sync rows happen inside a
//! [`TenantScope`]: one pooled connection, one transaction, with the
//! caller's org bound as a transaction-local setting that the row-level
//! security policies evaluate. Application code never filters by org in SQL;
//! the binding is the isolation boundary.

use sqlx::{PgConnection, PgPool, Postgres, Transaction};

/// Errors opening or committing a tenant scope.
#[derive(Debug)]
pub enum TenantScopeError {
    /// No pooled connection became available within the acquire timeout.
    PoolExhausted,
    /// Any other storage error.
    Storage(sqlx::Error),
}

impl std::fmt::Display for TenantScopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TenantScopeError::PoolExhausted => {
                write!(f, "No database connection available (pool exhausted)")
            }
            TenantScopeError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for TenantScopeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TenantScopeError::Storage(e) => Some(e),
            TenantScopeError::PoolExhausted => None,
        }
    }
}

impl From<sqlx::Error> for TenantScopeError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => TenantScopeError::PoolExhausted,
            other => TenantScopeError::Storage(other),
        }
    }
}

/// An open transaction with the caller's org bound for its whole lifetime.
///
/// Dropping the scope without calling [`commit`](TenantScope::commit) rolls
/// the transaction back and returns the connection to the pool, so every
/// exit path (`?`, panic, early return) releases cleanly.
pub struct TenantScope {
    tx: Transaction<'static, Postgres>,
}

impl TenantScope {
    /// Opens a scope for writes (default isolation).
    pub async fn begin(pool: &PgPool, org_id: &str) -> Result<Self, TenantScopeError> {
        Self::begin_with(pool, org_id, false).await
    }

    /// Opens a scope under `REPEATABLE READ`, so every query inside it sees
    /// one snapshot. Delta exports run here: the four entity reads and the
    /// `now()` read must agree.
    pub async fn begin_snapshot(pool: &PgPool, org_id: &str) -> Result<Self, TenantScopeError> {
        Self::begin_with(pool, org_id, true).await
    }

    async fn begin_with(
        pool: &PgPool,
        org_id: &str,
        snapshot: bool,
    ) -> Result<Self, TenantScopeError> {
        let mut tx = pool.begin().await.map_err(TenantScopeError::from)?;

        if snapshot {
            // Must precede any other statement in the transaction.
            sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
                .execute(&mut *tx)
                .await?;
        }

        // The third argument makes the setting transaction-local: it
        // evaporates at commit or rollback, never leaking onto the pooled
        // connection's next tenant.
        sqlx::query("SELECT set_config('fieldsync.org_id', $1, true)")
            .bind(org_id)
            .execute(&mut *tx)
            .await?;

        Ok(Self { tx })
    }

    /// The transaction connection, for executing queries inside the scope.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    /// Commits the unit of work.
    pub async fn commit(self) -> Result<(), TenantScopeError> {
        self.tx.commit().await.map_err(TenantScopeError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_maps_to_exhausted() {
        let err = TenantScopeError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, TenantScopeError::PoolExhausted));
    }

    #[test]
    fn test_other_errors_map_to_storage() {
        let err = TenantScopeError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, TenantScopeError::Storage(_)));
    }

    #[test]
    fn test_display() {
        let err = TenantScopeError::PoolExhausted;
        assert!(err.to_string().contains("pool exhausted"));
    }
}
