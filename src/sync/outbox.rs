//! Outbox of unsynced local writes.
//!
//! Every local write lands here as a PENDING item in the same transaction
//! that updates the mirror. A sync cycle snapshots the pending items at its
//! start; anything enqueued afterwards has a higher `seq` and belongs to the
//! next cycle. Items leave the queue only when a push was accepted and the
//! rest of the cycle succeeded.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::models::{format_ts, ChecklistItem, Job, MaterialLine, Pin};
use crate::protocol::UpsertBatch;
use crate::sync::replica::ReplicaError;
use crate::sync::EntityKind;

/// One queued local write.
#[derive(Debug, Clone)]
pub struct OutboxItem {
    pub seq: i64,
    pub entity: EntityKind,
    pub row_id: String,
    /// The full row, serialized as JSON at write time.
    pub payload: String,
}

#[derive(sqlx::FromRow)]
struct OutboxRow {
    seq: i64,
    entity: String,
    row_id: String,
    payload: String,
}

/// Returns all pending items, oldest first. This is the cycle's snapshot.
pub async fn pending(pool: &SqlitePool) -> Result<Vec<OutboxItem>, ReplicaError> {
    let rows: Vec<OutboxRow> =
        sqlx::query_as("SELECT seq, entity, row_id, payload FROM outbox ORDER BY seq")
            .fetch_all(pool)
            .await?;

    rows.into_iter()
        .map(|row| {
            let entity = EntityKind::parse(&row.entity).ok_or_else(|| {
                ReplicaError::Corrupt(format!("unknown outbox entity '{}'", row.entity))
            })?;
            Ok(OutboxItem {
                seq: row.seq,
                entity,
                row_id: row.row_id,
                payload: row.payload,
            })
        })
        .collect()
}

/// Number of pending items.
pub async fn depth(pool: &SqlitePool) -> Result<i64, ReplicaError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outbox")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Queues one local write. Runs inside the caller's transaction so the
/// mirror update and the queue entry commit together.
pub(crate) async fn enqueue(
    conn: &mut SqliteConnection,
    entity: EntityKind,
    row_id: &str,
    payload: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO outbox (entity, row_id, payload, queued_at) VALUES (?, ?, ?, ?)")
        .bind(entity.as_str())
        .bind(row_id)
        .bind(payload)
        .bind(format_ts(Utc::now()))
        .execute(conn)
        .await?;
    Ok(())
}

/// Removes acknowledged items. Runs inside the driver's end-of-cycle
/// transaction; items enqueued after the snapshot keep their place.
pub(crate) async fn ack(conn: &mut SqliteConnection, seqs: &[i64]) -> Result<(), sqlx::Error> {
    if seqs.is_empty() {
        return Ok(());
    }

    let placeholders = vec!["?"; seqs.len()].join(", ");
    let sql = format!("DELETE FROM outbox WHERE seq IN ({})", placeholders);

    let mut query = sqlx::query(&sql);
    for seq in seqs {
        query = query.bind(seq);
    }
    query.execute(conn).await?;

    Ok(())
}

/// Groups a pending snapshot into the push batch, deserializing each
/// payload back into its row type.
pub fn into_batch(items: &[OutboxItem]) -> Result<UpsertBatch, ReplicaError> {
    let mut batch = UpsertBatch::default();

    for item in items {
        match item.entity {
            EntityKind::Jobs => {
                let job: Job = serde_json::from_str(&item.payload)
                    .map_err(|e| corrupt_payload(item, &e))?;
                batch.jobs.push(job);
            }
            EntityKind::Materials => {
                let line: MaterialLine = serde_json::from_str(&item.payload)
                    .map_err(|e| corrupt_payload(item, &e))?;
                batch.materials.push(line);
            }
            EntityKind::Pins => {
                let pin: Pin = serde_json::from_str(&item.payload)
                    .map_err(|e| corrupt_payload(item, &e))?;
                batch.pins.push(pin);
            }
            EntityKind::Checklist => {
                let checklist_item: ChecklistItem = serde_json::from_str(&item.payload)
                    .map_err(|e| corrupt_payload(item, &e))?;
                batch.checklist.push(checklist_item);
            }
        }
    }

    Ok(batch)
}

fn corrupt_payload(item: &OutboxItem, err: &serde_json::Error) -> ReplicaError {
    ReplicaError::Corrupt(format!(
        "outbox seq {} ({} {}): {}",
        item.seq,
        item.entity.as_str(),
        item.row_id,
        err
    ))
}
