//! Reset orchestration. A reset owns the single-flight slot from the moment
//! its STARTED record is stored until its terminal record is written.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::audit::AuditedJobTracker;
use crate::error::FolioError;
use crate::ports::{AuditStore, ResetJob, Result};
use crate::types::AuditRecord;

/// Message recorded on resets whose process died before reaching a terminal state.
pub const ABANDONED_MESSAGE: &str = "abandoned: process exited before completion";

/// Attempts at writing a terminal record before it is parked for a later retry.
pub const FINISH_ATTEMPTS: u32 = 5;
const FINISH_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetStatus {
    pub in_progress: bool,
    pub latest: Option<AuditRecord>,
}

/// A reset that has been claimed and handed to a background task.
pub struct StartedReset {
    pub record: AuditRecord,
    pub task: JoinHandle<()>,
}

/// Terminal records whose write kept failing. Flushed before any read of
/// reset state so a finished job never holds the slot.
type PendingFinishes = Arc<Mutex<Vec<AuditRecord>>>;

pub struct ResetCoordinator {
    store: Arc<dyn AuditStore>,
    job: Arc<dyn ResetJob>,
    tracker: AuditedJobTracker,
    pending: PendingFinishes,
}

impl ResetCoordinator {
    pub fn new(store: Arc<dyn AuditStore>, job: Arc<dyn ResetJob>, tracker: AuditedJobTracker) -> Self {
        Self {
            store,
            job,
            tracker,
            pending: Arc::default(),
        }
    }

    /// Claim the reset slot and start the job. Fails with `Conflict` while
    /// another reset is still `STARTED`.
    pub async fn begin_reset(&self, actor: &str, source_address: Option<&str>) -> Result<StartedReset> {
        let job_id = Uuid::new_v4().to_string();
        let record = self.tracker.start(&job_id, actor, source_address)?;
        self.flush_pending().await;
        let record = self.store.insert_started(record).await?;
        tracing::info!(job_id = %record.job_id, actor, "reset started");

        let store = Arc::clone(&self.store);
        let job = Arc::clone(&self.job);
        let tracker = self.tracker.clone();
        let pending = Arc::clone(&self.pending);
        let running = record.clone();
        let task = tokio::spawn(async move {
            run_to_completion(store, job, tracker, pending, running).await;
        });

        Ok(StartedReset { record, task })
    }

    /// `in_progress` is derived from `latest`: while a reset holds the slot
    /// no newer record can exist.
    pub async fn status(&self) -> Result<ResetStatus> {
        self.flush_pending().await;
        let latest = self.store.list_recent(1).await?.into_iter().next();
        let in_progress = latest.as_ref().is_some_and(AuditRecord::is_in_progress);
        Ok(ResetStatus {
            in_progress,
            latest,
        })
    }

    pub async fn find(&self, job_id: &str) -> Result<Option<AuditRecord>> {
        self.flush_pending().await;
        self.store.find_by_job_id(job_id).await
    }

    pub async fn history(&self, limit: u32) -> Result<Vec<AuditRecord>> {
        self.flush_pending().await;
        self.store.list_recent(limit).await
    }

    /// Fail every `STARTED` record older than `stale_after`. Called once at
    /// startup, before the server accepts requests.
    pub async fn fail_abandoned(&self, stale_after: Duration) -> Result<u32> {
        let stale_after = chrono::Duration::from_std(stale_after)
            .map_err(|e| FolioError::InvalidArgument(format!("stale_after out of range: {e}")))?;
        let cutoff = self.tracker.now() - stale_after;
        let mut failed = 0;
        for record in self.store.list_started().await? {
            if record.started_at > cutoff {
                continue;
            }
            let terminal = self.tracker.fail(&record, ABANDONED_MESSAGE)?;
            self.store.finish(&terminal).await?;
            tracing::warn!(job_id = %record.job_id, started_at = %record.started_at, "failed abandoned reset");
            failed += 1;
        }
        Ok(failed)
    }

    /// Retry parked terminal writes. Failures stay parked and are only logged,
    /// so reads keep working while the store recovers.
    async fn flush_pending(&self) {
        let mut pending = self.pending.lock().await;
        if pending.is_empty() {
            return;
        }
        let mut kept = Vec::new();
        for terminal in pending.drain(..) {
            match self.store.finish(&terminal).await {
                Ok(saved) => tracing::info!(
                    job_id = %saved.job_id,
                    status = %saved.status,
                    "deferred reset outcome recorded"
                ),
                Err(e) if !is_transient(&e) => {
                    tracing::warn!(job_id = %terminal.job_id, "dropping deferred reset outcome: {e}")
                }
                Err(e) => {
                    tracing::warn!(job_id = %terminal.job_id, "deferred reset outcome still not recorded: {e}");
                    kept.push(terminal);
                }
            }
        }
        *pending = kept;
    }
}

/// `InvalidState` and `NotFound` mean the row is already terminal or gone.
fn is_transient(err: &FolioError) -> bool {
    !matches!(err, FolioError::InvalidState(_) | FolioError::NotFound(_))
}

async fn finish_with_backoff(store: &dyn AuditStore, terminal: &AuditRecord) -> Result<AuditRecord> {
    let mut delay = FINISH_BACKOFF;
    let mut attempt = 1;
    loop {
        match store.finish(terminal).await {
            Ok(saved) => return Ok(saved),
            Err(e) if !is_transient(&e) || attempt >= FINISH_ATTEMPTS => return Err(e),
            Err(e) => {
                tracing::warn!(job_id = %terminal.job_id, attempt, "retrying reset outcome write: {e}");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
        }
    }
}

async fn run_to_completion(
    store: Arc<dyn AuditStore>,
    job: Arc<dyn ResetJob>,
    tracker: AuditedJobTracker,
    pending: PendingFinishes,
    record: AuditRecord,
) {
    // Nested spawn so a panicking collaborator still ends in FAILED.
    let outcome = tokio::spawn(async move { job.clear_all().await }).await;
    let terminal = match outcome {
        Ok(Ok(tables)) => tracker.complete(&record, tables),
        Ok(Err(e)) => tracker.fail(&record, &format!("{e:#}")),
        Err(join_err) => tracker.fail(&record, &format!("reset job aborted: {join_err}")),
    };
    let terminal = match terminal {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(job_id = %record.job_id, "reset transition rejected: {e}");
            return;
        }
    };
    match finish_with_backoff(store.as_ref(), &terminal).await {
        Ok(saved) => tracing::info!(
            job_id = %saved.job_id,
            status = %saved.status,
            duration_ms = saved.duration_ms.unwrap_or_default(),
            "reset finished"
        ),
        Err(e) if is_transient(&e) => {
            tracing::error!(job_id = %record.job_id, "reset outcome parked after {FINISH_ATTEMPTS} attempts: {e}");
            pending.lock().await.push(terminal);
        }
        Err(e) => tracing::error!(job_id = %record.job_id, "reset outcome rejected by store: {e}"),
    }
}
