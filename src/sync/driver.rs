//! The sync cycle.
//!
//! Per cycle: push the outbox snapshot, pull the delta from the persisted
//! cursor, merge last-write-wins into the mirror, then advance the cursor
//! and drop the acknowledged outbox rows - the last three in one local
//! transaction. Any failure aborts the cycle with cursor and outbox
//! untouched, so the next cycle resumes from the same point and nothing is
//! lost (at-least-once delivery).

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::protocol::PushRequest;
use crate::sync::cursor::{self, CursorStore};
use crate::sync::replica::{self, ReplicaError};
use crate::sync::transport::{SyncTransport, TransportError};
use crate::sync::outbox;

/// Errors aborting a sync cycle.
#[derive(Debug)]
pub enum SyncCycleError {
    /// Local replica storage failed.
    Replica(ReplicaError),
    /// The push or pull failed in transit or was refused.
    Transport(TransportError),
    /// The server answered the push without accepting it.
    PushNotAccepted,
}

impl std::fmt::Display for SyncCycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncCycleError::Replica(e) => write!(f, "{}", e),
            SyncCycleError::Transport(e) => write!(f, "{}", e),
            SyncCycleError::PushNotAccepted => write!(f, "Server did not accept the push"),
        }
    }
}

impl std::error::Error for SyncCycleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncCycleError::Replica(e) => Some(e),
            SyncCycleError::Transport(e) => Some(e),
            SyncCycleError::PushNotAccepted => None,
        }
    }
}

impl From<ReplicaError> for SyncCycleError {
    fn from(e: ReplicaError) -> Self {
        SyncCycleError::Replica(e)
    }
}

impl From<sqlx::Error> for SyncCycleError {
    fn from(e: sqlx::Error) -> Self {
        SyncCycleError::Replica(ReplicaError::Storage(e))
    }
}

impl From<TransportError> for SyncCycleError {
    fn from(e: TransportError) -> Self {
        SyncCycleError::Transport(e)
    }
}

/// What one completed cycle did.
#[derive(Debug, Clone, Copy)]
pub struct CycleReport {
    /// Rows pushed (and acknowledged) from the outbox.
    pub pushed: usize,
    /// Rows received in the pull.
    pub pulled: usize,
    /// True when no cursor existed and the pull was a full one.
    pub full_pull: bool,
}

/// Runs sync cycles against one transport.
///
/// Takes `&mut self` per cycle: cycles on a device are strictly
/// sequential. Local writes landing while a cycle runs go to the next one.
pub struct SyncDriver<T: SyncTransport> {
    pool: SqlitePool,
    transport: T,
}

impl<T: SyncTransport> SyncDriver<T> {
    pub fn new(pool: SqlitePool, transport: T) -> Self {
        Self { pool, transport }
    }

    /// Runs one push-pull-merge cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, SyncCycleError> {
        // 1. Snapshot the outbox. Writes after this point belong to the
        //    next cycle.
        let snapshot = outbox::pending(&self.pool).await?;
        let acked_seqs: Vec<i64> = snapshot.iter().map(|item| item.seq).collect();

        // 2. Push. Skipped when there is nothing to say.
        if !snapshot.is_empty() {
            let batch = outbox::into_batch(&snapshot)?;
            let request = PushRequest {
                idempotency_key: Some(Uuid::new_v4().to_string()),
                upserts: batch,
            };

            let response = self.transport.push(&request).await?;
            if !response.accepted {
                return Err(SyncCycleError::PushNotAccepted);
            }

            tracing::debug!(
                jobs = response.counts.jobs,
                materials = response.counts.materials,
                pins = response.counts.pins,
                checklist = response.counts.checklist,
                "push acknowledged"
            );
        }

        // 3. Pull from the persisted cursor.
        let since = CursorStore::new(self.pool.clone()).get().await?;
        let pulled = self.transport.pull(since).await?;
        let pulled_rows = pulled.jobs.len()
            + pulled.materials.len()
            + pulled.pins.len()
            + pulled.checklist.len();

        // 4. Merge, advance the cursor, drop the acknowledged outbox rows -
        //    one transaction, so a crash here leaves the previous cycle's
        //    state intact.
        let mut tx = self.pool.begin().await?;

        for job in &pulled.jobs {
            replica::merge_job(&mut *tx, job).await?;
        }
        for line in &pulled.materials {
            replica::merge_material(&mut *tx, line).await?;
        }
        for pin in &pulled.pins {
            replica::merge_pin(&mut *tx, pin).await?;
        }
        for item in &pulled.checklist {
            replica::merge_checklist_item(&mut *tx, item).await?;
        }

        cursor::set(&mut *tx, pulled.now).await?;
        outbox::ack(&mut *tx, &acked_seqs).await?;

        tx.commit().await?;

        tracing::info!(
            pushed = snapshot.len(),
            pulled = pulled_rows,
            full = since.is_none(),
            "sync cycle complete"
        );

        Ok(CycleReport {
            pushed: snapshot.len(),
            pulled: pulled_rows,
            full_pull: since.is_none(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Job, Pin, ProfitChip};
    use crate::protocol::{PullResponse, PushResponse};
    use crate::sync::replica::{init_replica, LocalReplica};
    use chrono::{DateTime, Duration, SubsecRound, Utc};
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// The cursor round-trips through microsecond-precision storage, so
    /// fake server timestamps are truncated the same way.
    fn server_clock() -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }

    /// In-memory server double recording pushes and serving canned pulls.
    struct FakeTransport {
        pushes: Mutex<Vec<PushRequest>>,
        pulls: Mutex<Vec<Option<DateTime<Utc>>>>,
        pull_response: Mutex<PullResponse>,
        fail_push: bool,
        fail_pull: bool,
    }

    impl FakeTransport {
        fn new(now: DateTime<Utc>) -> Self {
            Self {
                pushes: Mutex::new(Vec::new()),
                pulls: Mutex::new(Vec::new()),
                pull_response: Mutex::new(PullResponse {
                    since: None,
                    now,
                    jobs: vec![],
                    materials: vec![],
                    pins: vec![],
                    checklist: vec![],
                }),
                fail_push: false,
                fail_pull: false,
            }
        }

        fn push_count(&self) -> usize {
            self.pushes.lock().unwrap().len()
        }
    }

    impl SyncTransport for FakeTransport {
        async fn push(&self, request: &PushRequest) -> Result<PushResponse, TransportError> {
            if self.fail_push {
                return Err(TransportError::Timeout);
            }
            self.pushes.lock().unwrap().push(request.clone());
            Ok(PushResponse {
                idempotency_key: request.idempotency_key.clone(),
                accepted: true,
                counts: request.upserts.counts(),
            })
        }

        async fn pull(
            &self,
            since: Option<DateTime<Utc>>,
        ) -> Result<PullResponse, TransportError> {
            if self.fail_pull {
                return Err(TransportError::Timeout);
            }
            self.pulls.lock().unwrap().push(since);
            Ok(self.pull_response.lock().unwrap().clone())
        }
    }

    async fn test_setup() -> (SqlitePool, LocalReplica, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let pool = init_replica(Some(temp_dir.path().join("replica.db")))
            .await
            .unwrap();
        (pool.clone(), LocalReplica::new(pool), temp_dir)
    }

    #[tokio::test]
    async fn test_cycle_pushes_outbox_and_advances_cursor() {
        let (pool, replica, _temp) = test_setup().await;
        let server_now = server_clock();

        replica.save_job(&Job::new("Pole 42")).await.unwrap();
        replica
            .save_pin(&Pin::new("u1", "guy", 37.7, -122.4))
            .await
            .unwrap();

        let mut driver = SyncDriver::new(pool.clone(), FakeTransport::new(server_now));
        let report = driver.run_cycle().await.unwrap();

        assert_eq!(report.pushed, 2);
        assert!(report.full_pull);

        // Outbox drained, cursor now at the server's snapshot time.
        assert_eq!(outbox::depth(&pool).await.unwrap(), 0);
        let cursor = CursorStore::new(pool).get().await.unwrap();
        assert_eq!(cursor, Some(server_now));

        let pushed = &driver.transport.pushes.lock().unwrap()[0];
        assert_eq!(pushed.upserts.jobs.len(), 1);
        assert_eq!(pushed.upserts.pins.len(), 1);
        assert!(pushed.idempotency_key.is_some());
    }

    #[tokio::test]
    async fn test_empty_outbox_skips_push_but_pulls() {
        let (pool, _replica, _temp) = test_setup().await;

        let mut driver = SyncDriver::new(pool.clone(), FakeTransport::new(server_clock()));
        let report = driver.run_cycle().await.unwrap();

        assert_eq!(report.pushed, 0);
        assert_eq!(driver.transport.push_count(), 0);
        assert_eq!(driver.transport.pulls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_push_leaves_outbox_and_cursor_untouched() {
        let (pool, replica, _temp) = test_setup().await;

        replica.save_job(&Job::new("Pole 42")).await.unwrap();

        let mut transport = FakeTransport::new(server_clock());
        transport.fail_push = true;

        let mut driver = SyncDriver::new(pool.clone(), transport);
        let result = driver.run_cycle().await;

        assert!(matches!(
            result,
            Err(SyncCycleError::Transport(TransportError::Timeout))
        ));
        assert_eq!(outbox::depth(&pool).await.unwrap(), 1);
        assert!(CursorStore::new(pool).get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_pull_keeps_pushed_items_pending() {
        let (pool, replica, _temp) = test_setup().await;

        replica.save_job(&Job::new("Pole 42")).await.unwrap();

        let mut transport = FakeTransport::new(server_clock());
        transport.fail_pull = true;

        let mut driver = SyncDriver::new(pool.clone(), transport);
        let result = driver.run_cycle().await;

        assert!(result.is_err());
        // The push went out, but without a completed cycle the items stay
        // queued; the retry re-pushes them (idempotent on the server).
        assert_eq!(driver.transport.push_count(), 1);
        assert_eq!(outbox::depth(&pool).await.unwrap(), 1);
        assert!(CursorStore::new(pool).get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_cycle_uses_cursor_from_first() {
        let (pool, _replica, _temp) = test_setup().await;
        let server_now = server_clock();

        let mut driver = SyncDriver::new(pool.clone(), FakeTransport::new(server_now));
        driver.run_cycle().await.unwrap();
        let report = driver.run_cycle().await.unwrap();

        assert!(!report.full_pull);
        let pulls = driver.transport.pulls.lock().unwrap();
        assert_eq!(pulls[0], None);
        assert_eq!(pulls[1], Some(server_now));
    }

    #[tokio::test]
    async fn test_pull_merges_into_mirror() {
        let (pool, replica, _temp) = test_setup().await;
        let server_now = server_clock();

        let transport = FakeTransport::new(server_now);
        {
            let mut response = transport.pull_response.lock().unwrap();
            response.jobs.push(Job {
                id: "srv-1".into(),
                org_id: "acme-power".into(),
                name: "Storm damage survey".into(),
                profit_chip: ProfitChip::Yellow,
                updated_at: server_now - Duration::minutes(5),
            });
        }

        let mut driver = SyncDriver::new(pool, transport);
        let report = driver.run_cycle().await.unwrap();

        assert_eq!(report.pulled, 1);
        let job = replica.get_job("srv-1").await.unwrap().unwrap();
        assert_eq!(job.name, "Storm damage survey");
        assert_eq!(job.org_id, "acme-power");
    }

    #[tokio::test]
    async fn test_pull_does_not_clobber_newer_unpushed_edit() {
        let (pool, replica, _temp) = test_setup().await;
        let server_now = server_clock();

        // Local edit, not yet pushed, newer than what the server returns.
        let local = Job::new("Pole 42 - local truth");
        replica.save_job(&local).await.unwrap();

        let transport = FakeTransport::new(server_now);
        {
            let mut response = transport.pull_response.lock().unwrap();
            response.jobs.push(Job {
                id: local.id.clone(),
                org_id: "acme-power".into(),
                name: "Pole 42 - stale server copy".into(),
                profit_chip: ProfitChip::Red,
                updated_at: local.updated_at - Duration::hours(2),
            });
        }

        let mut driver = SyncDriver::new(pool, transport);
        driver.run_cycle().await.unwrap();

        let kept = replica.get_job(&local.id).await.unwrap().unwrap();
        assert_eq!(kept.name, "Pole 42 - local truth");
    }
}
