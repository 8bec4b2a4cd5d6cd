//! Cursor watermark persistence.
//!
//! One watermark covers all four entities. Absent means "never synced":
//! the next pull is a full pull. The driver advances it only after a whole
//! cycle succeeds, inside the same transaction that merges the pull and
//! acknowledges the outbox.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::models::{format_ts, parse_ts};
use crate::sync::replica::ReplicaError;

const CURSOR_KEY: &str = "cursor";

/// Reads and clears the persisted watermark.
pub struct CursorStore {
    pool: SqlitePool,
}

impl CursorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns the watermark, or `None` before the first successful cycle.
    pub async fn get(&self) -> Result<Option<DateTime<Utc>>, ReplicaError> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM sync_state WHERE key = ?")
                .bind(CURSOR_KEY)
                .fetch_optional(&self.pool)
                .await?;

        value
            .map(|raw| parse_ts(&raw).map_err(|e| ReplicaError::Corrupt(e.to_string())))
            .transpose()
    }

    /// Drops the watermark so the next cycle performs a full pull. The
    /// mirror is a disposable cache; this is the "resync from scratch"
    /// lever.
    pub async fn clear(&self) -> Result<(), ReplicaError> {
        sqlx::query("DELETE FROM sync_state WHERE key = ?")
            .bind(CURSOR_KEY)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Advances the watermark inside the driver's end-of-cycle transaction.
pub(crate) async fn set(
    conn: &mut SqliteConnection,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO sync_state (key, value) VALUES (?, ?)
         ON CONFLICT (key) DO UPDATE SET value = excluded.value",
    )
    .bind(CURSOR_KEY)
    .bind(format_ts(now))
    .execute(conn)
    .await?;
    Ok(())
}
