//! Local replica storage.
//!
//! The client keeps a SQLite mirror of the four entity tables for offline
//! reads, an outbox of unsynced local writes, and a `sync_state` key/value
//! table holding the cursor. The mirror is a disposable cache: dropping the
//! database file and running a full pull rebuilds it.
//!
//! Timestamps are stored as fixed-width RFC 3339 text (see
//! [`crate::models::format_ts`]) so `updated_at` comparisons in SQL are
//! plain string comparisons.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::SqliteConnection;
use std::path::PathBuf;
use std::str::FromStr;

use crate::models::{format_ts, parse_ts, ChecklistItem, Job, MaterialLine, Pin, ProfitChip};
use crate::sync::outbox;
use crate::sync::EntityKind;

/// Errors from client replica storage.
#[derive(Debug)]
pub enum ReplicaError {
    /// Underlying SQLite error.
    Storage(sqlx::Error),
    /// A stored value failed to parse (timestamp or outbox payload).
    Corrupt(String),
}

impl std::fmt::Display for ReplicaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicaError::Storage(e) => write!(f, "Replica storage error: {}", e),
            ReplicaError::Corrupt(msg) => write!(f, "Corrupt replica data: {}", msg),
        }
    }
}

impl std::error::Error for ReplicaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReplicaError::Storage(e) => Some(e),
            ReplicaError::Corrupt(_) => None,
        }
    }
}

impl From<sqlx::Error> for ReplicaError {
    fn from(e: sqlx::Error) -> Self {
        ReplicaError::Storage(e)
    }
}

/// Statements creating the client schema. All idempotent; run at startup.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY,
        org_id TEXT NOT NULL DEFAULT '',
        name TEXT NOT NULL,
        profit_chip TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS material_lines (
        id TEXT PRIMARY KEY,
        org_id TEXT NOT NULL DEFAULT '',
        job_id TEXT NOT NULL,
        sku TEXT NOT NULL,
        quantity REAL NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS pins (
        id TEXT PRIMARY KEY,
        org_id TEXT NOT NULL DEFAULT '',
        job_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        lat REAL NOT NULL,
        lng REAL NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS checklist_items (
        id TEXT PRIMARY KEY,
        org_id TEXT NOT NULL DEFAULT '',
        prompt TEXT NOT NULL,
        required INTEGER NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS outbox (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        entity TEXT NOT NULL,
        row_id TEXT NOT NULL,
        payload TEXT NOT NULL,
        queued_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sync_state (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )",
];

/// Opens (creating if missing) the client replica database and applies the
/// schema idempotently.
pub async fn init_replica(db_path: Option<PathBuf>) -> Result<SqlitePool, sqlx::Error> {
    let path = db_path.expect("database_path must be provided");

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create database directory");
    }

    let db_url = format!("sqlite:{}?mode=rwc", path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    for statement in SCHEMA {
        sqlx::query(statement).execute(&pool).await?;
    }

    Ok(pool)
}

// Row types for database queries
#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    org_id: String,
    name: String,
    profit_chip: String,
    updated_at: String,
}

#[derive(sqlx::FromRow)]
struct MaterialRow {
    id: String,
    org_id: String,
    job_id: String,
    sku: String,
    quantity: f64,
    updated_at: String,
}

#[derive(sqlx::FromRow)]
struct PinRow {
    id: String,
    org_id: String,
    job_id: String,
    kind: String,
    lat: f64,
    lng: f64,
    updated_at: String,
}

#[derive(sqlx::FromRow)]
struct ChecklistRow {
    id: String,
    org_id: String,
    prompt: String,
    required: bool,
    updated_at: String,
}

impl JobRow {
    fn into_job(self) -> Result<Job, ReplicaError> {
        Ok(Job {
            id: self.id,
            org_id: self.org_id,
            name: self.name,
            profit_chip: ProfitChip::from_str(&self.profit_chip)
                .map_err(ReplicaError::Corrupt)?,
            updated_at: parse_ts(&self.updated_at)
                .map_err(|e| ReplicaError::Corrupt(e.to_string()))?,
        })
    }
}

impl MaterialRow {
    fn into_material(self) -> Result<MaterialLine, ReplicaError> {
        Ok(MaterialLine {
            id: self.id,
            org_id: self.org_id,
            job_id: self.job_id,
            sku: self.sku,
            quantity: self.quantity,
            updated_at: parse_ts(&self.updated_at)
                .map_err(|e| ReplicaError::Corrupt(e.to_string()))?,
        })
    }
}

impl PinRow {
    fn into_pin(self) -> Result<Pin, ReplicaError> {
        Ok(Pin {
            id: self.id,
            org_id: self.org_id,
            job_id: self.job_id,
            kind: self.kind,
            lat: self.lat,
            lng: self.lng,
            updated_at: parse_ts(&self.updated_at)
                .map_err(|e| ReplicaError::Corrupt(e.to_string()))?,
        })
    }
}

impl ChecklistRow {
    fn into_item(self) -> Result<ChecklistItem, ReplicaError> {
        Ok(ChecklistItem {
            id: self.id,
            org_id: self.org_id,
            prompt: self.prompt,
            required: self.required,
            updated_at: parse_ts(&self.updated_at)
                .map_err(|e| ReplicaError::Corrupt(e.to_string()))?,
        })
    }
}

/// The client's mirror of the synced dataset.
///
/// Local writes apply optimistically to the mirror and enqueue an outbox
/// entry in the same transaction, so offline reads see them immediately and
/// the next sync cycle pushes them.
pub struct LocalReplica {
    pool: SqlitePool,
}

impl LocalReplica {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Local writes (mirror + outbox, one transaction)
    // ------------------------------------------------------------------

    pub async fn save_job(&self, job: &Job) -> Result<(), ReplicaError> {
        let payload = serde_json::to_string(job)
            .map_err(|e| ReplicaError::Corrupt(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO jobs (id, org_id, name, profit_chip, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                 name = excluded.name,
                 profit_chip = excluded.profit_chip,
                 updated_at = excluded.updated_at",
        )
        .bind(&job.id)
        .bind(&job.org_id)
        .bind(&job.name)
        .bind(job.profit_chip.as_str())
        .bind(format_ts(job.updated_at))
        .execute(&mut *tx)
        .await?;

        outbox::enqueue(&mut *tx, EntityKind::Jobs, &job.id, &payload).await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn save_material(&self, line: &MaterialLine) -> Result<(), ReplicaError> {
        let payload = serde_json::to_string(line)
            .map_err(|e| ReplicaError::Corrupt(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO material_lines (id, org_id, job_id, sku, quantity, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                 job_id = excluded.job_id,
                 sku = excluded.sku,
                 quantity = excluded.quantity,
                 updated_at = excluded.updated_at",
        )
        .bind(&line.id)
        .bind(&line.org_id)
        .bind(&line.job_id)
        .bind(&line.sku)
        .bind(line.quantity)
        .bind(format_ts(line.updated_at))
        .execute(&mut *tx)
        .await?;

        outbox::enqueue(&mut *tx, EntityKind::Materials, &line.id, &payload).await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn save_pin(&self, pin: &Pin) -> Result<(), ReplicaError> {
        let payload = serde_json::to_string(pin)
            .map_err(|e| ReplicaError::Corrupt(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO pins (id, org_id, job_id, kind, lat, lng, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                 job_id = excluded.job_id,
                 kind = excluded.kind,
                 lat = excluded.lat,
                 lng = excluded.lng,
                 updated_at = excluded.updated_at",
        )
        .bind(&pin.id)
        .bind(&pin.org_id)
        .bind(&pin.job_id)
        .bind(&pin.kind)
        .bind(pin.lat)
        .bind(pin.lng)
        .bind(format_ts(pin.updated_at))
        .execute(&mut *tx)
        .await?;

        outbox::enqueue(&mut *tx, EntityKind::Pins, &pin.id, &payload).await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn save_checklist_item(&self, item: &ChecklistItem) -> Result<(), ReplicaError> {
        let payload = serde_json::to_string(item)
            .map_err(|e| ReplicaError::Corrupt(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO checklist_items (id, org_id, prompt, required, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                 prompt = excluded.prompt,
                 required = excluded.required,
                 updated_at = excluded.updated_at",
        )
        .bind(&item.id)
        .bind(&item.org_id)
        .bind(&item.prompt)
        .bind(item.required)
        .bind(format_ts(item.updated_at))
        .execute(&mut *tx)
        .await?;

        outbox::enqueue(&mut *tx, EntityKind::Checklist, &item.id, &payload).await?;

        tx.commit().await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn get_job(&self, id: &str) -> Result<Option<Job>, ReplicaError> {
        let row: Option<JobRow> = sqlx::query_as("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(JobRow::into_job).transpose()
    }

    pub async fn list_jobs(&self) -> Result<Vec<Job>, ReplicaError> {
        let rows: Vec<JobRow> = sqlx::query_as("SELECT * FROM jobs ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    pub async fn list_materials(&self) -> Result<Vec<MaterialLine>, ReplicaError> {
        let rows: Vec<MaterialRow> =
            sqlx::query_as("SELECT * FROM material_lines ORDER BY job_id, sku")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(MaterialRow::into_material).collect()
    }

    pub async fn list_pins(&self) -> Result<Vec<Pin>, ReplicaError> {
        let rows: Vec<PinRow> = sqlx::query_as("SELECT * FROM pins ORDER BY job_id, kind")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(PinRow::into_pin).collect()
    }

    pub async fn list_checklist(&self) -> Result<Vec<ChecklistItem>, ReplicaError> {
        let rows: Vec<ChecklistRow> =
            sqlx::query_as("SELECT * FROM checklist_items ORDER BY prompt")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(ChecklistRow::into_item).collect()
    }
}

// ----------------------------------------------------------------------
// Merge helpers (driver-owned transaction)
// ----------------------------------------------------------------------
//
// A pulled row only replaces the mirror row when its timestamp is not older,
// so a local edit that has not been pushed yet survives the merge. The
// fixed-width timestamp format makes the string comparison chronological.

pub(crate) async fn merge_job(conn: &mut SqliteConnection, job: &Job) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO jobs (id, org_id, name, profit_chip, updated_at)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET
             org_id = excluded.org_id,
             name = excluded.name,
             profit_chip = excluded.profit_chip,
             updated_at = excluded.updated_at
         WHERE excluded.updated_at >= jobs.updated_at",
    )
    .bind(&job.id)
    .bind(&job.org_id)
    .bind(&job.name)
    .bind(job.profit_chip.as_str())
    .bind(format_ts(job.updated_at))
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn merge_material(
    conn: &mut SqliteConnection,
    line: &MaterialLine,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO material_lines (id, org_id, job_id, sku, quantity, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET
             org_id = excluded.org_id,
             job_id = excluded.job_id,
             sku = excluded.sku,
             quantity = excluded.quantity,
             updated_at = excluded.updated_at
         WHERE excluded.updated_at >= material_lines.updated_at",
    )
    .bind(&line.id)
    .bind(&line.org_id)
    .bind(&line.job_id)
    .bind(&line.sku)
    .bind(line.quantity)
    .bind(format_ts(line.updated_at))
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn merge_pin(conn: &mut SqliteConnection, pin: &Pin) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO pins (id, org_id, job_id, kind, lat, lng, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET
             org_id = excluded.org_id,
             job_id = excluded.job_id,
             kind = excluded.kind,
             lat = excluded.lat,
             lng = excluded.lng,
             updated_at = excluded.updated_at
         WHERE excluded.updated_at >= pins.updated_at",
    )
    .bind(&pin.id)
    .bind(&pin.org_id)
    .bind(&pin.job_id)
    .bind(&pin.kind)
    .bind(pin.lat)
    .bind(pin.lng)
    .bind(format_ts(pin.updated_at))
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn merge_checklist_item(
    conn: &mut SqliteConnection,
    item: &ChecklistItem,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO checklist_items (id, org_id, prompt, required, updated_at)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET
             org_id = excluded.org_id,
             prompt = excluded.prompt,
             required = excluded.required,
             updated_at = excluded.updated_at
         WHERE excluded.updated_at >= checklist_items.updated_at",
    )
    .bind(&item.id)
    .bind(&item.org_id)
    .bind(&item.prompt)
    .bind(item.required)
    .bind(format_ts(item.updated_at))
    .execute(conn)
    .await?;
    Ok(())
}
