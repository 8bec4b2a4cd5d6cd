//! Declarative upsert descriptors for the synced tables.
//!
//! One descriptor per entity (table name plus payload columns) drives a
//! single generic upsert statement and a single generic delta select, so
//! adding an entity means adding a descriptor and a binder, not another copy
//! of the ingest logic.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row};
use std::str::FromStr;

use crate::models::{ChecklistItem, Job, MaterialLine, Pin, ProfitChip};

pub type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Shape of one synced table.
#[derive(Debug, Clone, Copy)]
pub struct SyncTable {
    /// Table name in the server schema.
    pub table: &'static str,
    /// Columns besides `id`, `org_id`, and `updated_at`.
    pub payload_columns: &'static [&'static str],
}

impl SyncTable {
    /// Renders the last-write-wins upsert.
    ///
    /// Binds: `$1` id, `$2` org, then one placeholder per payload column,
    /// then the incoming `updated_at` as the guard. The stored timestamp is
    /// always the server clock at apply time, and an existing row is only
    /// replaced when its stored timestamp is not newer than the incoming
    /// one. A conflicting row of another org is invisible under the RLS
    /// policy, which PostgreSQL reports as an error, aborting the batch.
    pub fn upsert_sql(&self) -> String {
        let mut columns = vec!["id", "org_id"];
        columns.extend_from_slice(self.payload_columns);

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
        let assignments: Vec<String> = self
            .payload_columns
            .iter()
            .map(|c| format!("{} = EXCLUDED.{}", c, c))
            .collect();
        let guard = columns.len() + 1;

        format!(
            "INSERT INTO {table} ({columns}, updated_at) VALUES ({placeholders}, now()) \
             ON CONFLICT (id) DO UPDATE SET {assignments}, updated_at = now() \
             WHERE {table}.updated_at <= ${guard}",
            table = self.table,
            columns = columns.join(", "),
            placeholders = placeholders.join(", "),
            assignments = assignments.join(", "),
            guard = guard,
        )
    }

    /// Renders the delta select: all rows, or rows strictly after `$1`.
    ///
    /// No org predicate appears here; visibility is the RLS policy's job.
    /// Ties on `updated_at` are broken by `id` so replay order is
    /// deterministic.
    pub fn select_sql(&self, with_since: bool) -> String {
        let mut columns = vec!["id", "org_id"];
        columns.extend_from_slice(self.payload_columns);
        columns.push("updated_at");

        let filter = if with_since {
            " WHERE updated_at > $1"
        } else {
            ""
        };

        format!(
            "SELECT {columns} FROM {table}{filter} ORDER BY updated_at ASC, id ASC",
            columns = columns.join(", "),
            table = self.table,
            filter = filter,
        )
    }
}

/// A row that can travel through the generic upsert and delta routines.
pub trait SyncRecord: Sized {
    const TABLE: SyncTable;

    fn id(&self) -> &str;
    fn updated_at(&self) -> DateTime<Utc>;

    /// Binds the payload columns, in `TABLE.payload_columns` order.
    fn bind_payload<'q>(&'q self, query: PgQuery<'q>) -> PgQuery<'q>;

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error>;
}

impl SyncRecord for Job {
    const TABLE: SyncTable = SyncTable {
        table: "jobs",
        payload_columns: &["name", "profit_chip"],
    };

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn bind_payload<'q>(&'q self, query: PgQuery<'q>) -> PgQuery<'q> {
        query.bind(&self.name).bind(self.profit_chip.as_str())
    }

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let chip: String = row.try_get("profit_chip")?;
        Ok(Self {
            id: row.try_get("id")?,
            org_id: row.try_get("org_id")?,
            name: row.try_get("name")?,
            profit_chip: ProfitChip::from_str(&chip).map_err(|e| sqlx::Error::Decode(e.into()))?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl SyncRecord for MaterialLine {
    const TABLE: SyncTable = SyncTable {
        table: "material_lines",
        payload_columns: &["job_id", "sku", "quantity"],
    };

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn bind_payload<'q>(&'q self, query: PgQuery<'q>) -> PgQuery<'q> {
        query.bind(&self.job_id).bind(&self.sku).bind(self.quantity)
    }

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            org_id: row.try_get("org_id")?,
            job_id: row.try_get("job_id")?,
            sku: row.try_get("sku")?,
            quantity: row.try_get("quantity")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl SyncRecord for Pin {
    const TABLE: SyncTable = SyncTable {
        table: "pins",
        payload_columns: &["job_id", "kind", "lat", "lng"],
    };

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn bind_payload<'q>(&'q self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(&self.job_id)
            .bind(&self.kind)
            .bind(self.lat)
            .bind(self.lng)
    }

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            org_id: row.try_get("org_id")?,
            job_id: row.try_get("job_id")?,
            kind: row.try_get("kind")?,
            lat: row.try_get("lat")?,
            lng: row.try_get("lng")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl SyncRecord for ChecklistItem {
    const TABLE: SyncTable = SyncTable {
        table: "checklist_items",
        payload_columns: &["prompt", "required"],
    };

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn bind_payload<'q>(&'q self, query: PgQuery<'q>) -> PgQuery<'q> {
        query.bind(&self.prompt).bind(self.required)
    }

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            org_id: row.try_get("org_id")?,
            prompt: row.try_get("prompt")?,
            required: row.try_get("required")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_upsert_sql() {
        let sql = Job::TABLE.upsert_sql();
        assert_eq!(
            sql,
            "INSERT INTO jobs (id, org_id, name, profit_chip, updated_at) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, \
             profit_chip = EXCLUDED.profit_chip, updated_at = now() \
             WHERE jobs.updated_at <= $5"
        );
    }

    #[test]
    fn test_pin_upsert_sql_guard_position() {
        // 2 fixed columns + 4 payload columns, guard lands at $7.
        let sql = Pin::TABLE.upsert_sql();
        assert!(sql.contains("VALUES ($1, $2, $3, $4, $5, $6, now())"));
        assert!(sql.ends_with("WHERE pins.updated_at <= $7"));
    }

    #[test]
    fn test_select_sql_full_pull() {
        let sql = ChecklistItem::TABLE.select_sql(false);
        assert_eq!(
            sql,
            "SELECT id, org_id, prompt, required, updated_at FROM checklist_items \
             ORDER BY updated_at ASC, id ASC"
        );
    }

    #[test]
    fn test_select_sql_delta_is_strictly_greater() {
        let sql = MaterialLine::TABLE.select_sql(true);
        assert!(sql.contains("WHERE updated_at > $1"));
        assert!(!sql.contains(">="));
        assert!(sql.ends_with("ORDER BY updated_at ASC, id ASC"));
    }

    #[test]
    fn test_no_org_predicate_in_generated_sql() {
        // Isolation comes from the bound setting and the table policies,
        // never from query text.
        for sql in [
            Job::TABLE.select_sql(true),
            MaterialLine::TABLE.select_sql(false),
            Pin::TABLE.upsert_sql(),
            ChecklistItem::TABLE.upsert_sql(),
        ] {
            assert!(!sql.contains("org_id ="), "unexpected org filter: {}", sql);
        }
    }
}
