//! Audited job lifecycle: start / complete / fail as pure transitions.
//!
//! ```text
//! STARTED ──complete(n)──▶ COMPLETED
//!    │
//!    └────fail(msg)─────▶ FAILED
//! ```
//!
//! Terminal records are immutable: a second `complete`/`fail` is an
//! `InvalidState` error, never a silent no-op.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::{Clock, SystemClock};
use crate::error::FolioError;
use crate::types::{AuditRecord, AuditStatus};

pub type Result<T> = std::result::Result<T, FolioError>;

impl AuditRecord {
    /// Build a fresh `STARTED` record. `job_id` and `actor` must be non-blank.
    pub fn started(
        job_id: &str,
        actor: &str,
        source_address: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if job_id.trim().is_empty() {
            return Err(FolioError::InvalidArgument("jobId must not be empty".into()));
        }
        if actor.trim().is_empty() {
            return Err(FolioError::InvalidArgument("actor must not be empty".into()));
        }
        Ok(Self {
            id: None,
            job_id: job_id.to_string(),
            started_at: now,
            finished_at: None,
            started_by: actor.to_string(),
            status: AuditStatus::Started,
            error_message: None,
            tables_cleared: None,
            duration_ms: None,
            source_address: source_address.map(str::to_string),
        })
    }

    pub fn completed(&self, tables_cleared: u32, now: DateTime<Utc>) -> Result<Self> {
        self.require_started("complete")?;
        Ok(Self {
            status: AuditStatus::Completed,
            finished_at: Some(now),
            duration_ms: Some(self.elapsed_ms(now)),
            tables_cleared: Some(tables_cleared),
            error_message: None,
            ..self.clone()
        })
    }

    pub fn failed(&self, error_message: &str, now: DateTime<Utc>) -> Result<Self> {
        self.require_started("fail")?;
        Ok(Self {
            status: AuditStatus::Failed,
            finished_at: Some(now),
            duration_ms: Some(self.elapsed_ms(now)),
            error_message: Some(error_message.to_string()),
            tables_cleared: None,
            ..self.clone()
        })
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == AuditStatus::Started
    }

    fn require_started(&self, op: &str) -> Result<()> {
        if self.is_in_progress() {
            Ok(())
        } else {
            Err(FolioError::InvalidState(format!(
                "cannot {op} job {}: already {}",
                self.job_id, self.status
            )))
        }
    }

    // Clamped so a backwards clock step never yields a negative duration.
    fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_milliseconds().max(0)
    }
}

/// Stamps lifecycle transitions with a shared clock.
#[derive(Clone)]
pub struct AuditedJobTracker {
    clock: Arc<dyn Clock>,
}

impl Default for AuditedJobTracker {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl AuditedJobTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn start(
        &self,
        job_id: &str,
        actor: &str,
        source_address: Option<&str>,
    ) -> Result<AuditRecord> {
        AuditRecord::started(job_id, actor, source_address, self.clock.now())
    }

    pub fn complete(&self, record: &AuditRecord, tables_cleared: u32) -> Result<AuditRecord> {
        record.completed(tables_cleared, self.clock.now())
    }

    pub fn fail(&self, record: &AuditRecord, error_message: &str) -> Result<AuditRecord> {
        record.failed(error_message, self.clock.now())
    }

    pub fn is_in_progress(&self, record: &AuditRecord) -> bool {
        record.is_in_progress()
    }
}
