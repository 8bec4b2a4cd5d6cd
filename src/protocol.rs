//! Wire types for the pull/push sync contract.
//!
//! A pull is `GET /sync?since=<rfc3339>` returning a [`PullResponse`]; a push
//! is `POST /sync` with a [`PushRequest`] body answered by a [`PushResponse`].
//! Both binaries and the client transport share these types so the two sides
//! cannot drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ChecklistItem, Job, MaterialLine, Pin};

/// Everything changed since the client's watermark, in one server snapshot.
///
/// Each list is ordered ascending by `updated_at`. `now` is the server's
/// transaction-snapshot time and becomes the client's next cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullResponse {
    pub since: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
    pub jobs: Vec<Job>,
    pub materials: Vec<MaterialLine>,
    pub pins: Vec<Pin>,
    pub checklist: Vec<ChecklistItem>,
}

/// Rows to upsert, grouped by entity type. Absent groups mean "none".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpsertBatch {
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub materials: Vec<MaterialLine>,
    #[serde(default)]
    pub pins: Vec<Pin>,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
}

impl UpsertBatch {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
            && self.materials.is_empty()
            && self.pins.is_empty()
            && self.checklist.is_empty()
    }

    /// Per-entity sizes of this batch.
    pub fn counts(&self) -> EntityCounts {
        EntityCounts {
            jobs: self.jobs.len() as u64,
            materials: self.materials.len() as u64,
            pins: self.pins.len() as u64,
            checklist: self.checklist.len() as u64,
        }
    }
}

/// Body of `POST /sync`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushRequest {
    /// Echoed back in the response; not persisted or checked for duplicate
    /// suppression. Retries are safe because upserts are idempotent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub upserts: UpsertBatch,
}

/// Per-entity counts of rows ingested by a push.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    pub jobs: u64,
    pub materials: u64,
    pub pins: u64,
    pub checklist: u64,
}

/// Body of the `202 Accepted` answer to a push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub accepted: bool,
    pub counts: EntityCounts,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Job, Pin, ProfitChip};

    #[test]
    fn test_upsert_batch_default_is_empty() {
        let batch = UpsertBatch::default();
        assert!(batch.is_empty());
        assert_eq!(batch.counts(), EntityCounts::default());
    }

    #[test]
    fn test_push_request_accepts_partial_groups() {
        let req: PushRequest = serde_json::from_str(
            r#"{"upserts":{"jobs":[{"id":"u1","name":"Pole 42","profit_chip":"green","updated_at":"2024-01-01T00:00:00Z"}]}}"#,
        )
        .unwrap();

        assert!(req.idempotency_key.is_none());
        assert_eq!(req.upserts.jobs.len(), 1);
        assert!(req.upserts.materials.is_empty());
        assert!(req.upserts.pins.is_empty());
        assert!(req.upserts.checklist.is_empty());
        assert_eq!(req.upserts.jobs[0].profit_chip, ProfitChip::Green);
    }

    #[test]
    fn test_batch_counts() {
        let mut batch = UpsertBatch::default();
        batch.jobs.push(Job::new("Pole 42"));
        batch.pins.push(Pin::new("u1", "guy", 37.7, -122.4));

        let counts = batch.counts();
        assert_eq!(counts.jobs, 1);
        assert_eq!(counts.materials, 0);
        assert_eq!(counts.pins, 1);
        assert_eq!(counts.checklist, 0);
    }

    #[test]
    fn test_push_response_json_shape() {
        let resp = PushResponse {
            idempotency_key: Some("k-1".into()),
            accepted: true,
            counts: EntityCounts {
                jobs: 1,
                materials: 0,
                pins: 1,
                checklist: 0,
            },
        };

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["idempotency_key"], "k-1");
        assert_eq!(json["accepted"], true);
        assert_eq!(json["counts"]["jobs"], 1);
        assert_eq!(json["counts"]["checklist"], 0);
    }

    #[test]
    fn test_pull_response_roundtrip() {
        let resp = PullResponse {
            since: None,
            now: chrono::Utc::now(),
            jobs: vec![Job::new("Pole 42")],
            materials: vec![],
            pins: vec![],
            checklist: vec![],
        };

        let json = serde_json::to_string(&resp).unwrap();
        let parsed: PullResponse = serde_json::from_str(&json).unwrap();
        assert!(parsed.since.is_none());
        assert_eq!(parsed.jobs.len(), 1);
        assert_eq!(parsed.jobs[0].name, "Pole 42");
    }
}
