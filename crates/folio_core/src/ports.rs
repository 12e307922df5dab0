//! Port traits implemented by storage adapters (`folio_postgres`) and by the
//! in-memory doubles in [`crate::memory`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::FolioError;
use crate::types::{AuditRecord, ReconcilableRecord, RecordUpdate};

pub type Result<T> = std::result::Result<T, FolioError>;

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist a `STARTED` record and return it with its storage id.
    ///
    /// Must be atomic with respect to other `STARTED` records: when one already
    /// exists the call fails with `Conflict` and nothing is written.
    async fn insert_started(&self, record: AuditRecord) -> Result<AuditRecord>;

    /// Persist a terminal transition of a stored record.
    /// Fails with `InvalidState` if the stored row is no longer `STARTED`.
    async fn finish(&self, record: &AuditRecord) -> Result<AuditRecord>;

    async fn find_by_job_id(&self, job_id: &str) -> Result<Option<AuditRecord>>;

    /// Most recent first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<AuditRecord>>;

    /// All records still in `STARTED`, oldest first.
    async fn list_started(&self) -> Result<Vec<AuditRecord>>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<ReconcilableRecord>>;

    /// Apply `update` if the stored version still equals `expected_version`.
    /// A stale version fails with `Conflict`.
    async fn apply_update(
        &self,
        id: i64,
        expected_version: i64,
        update: &RecordUpdate,
        now: DateTime<Utc>,
    ) -> Result<ReconcilableRecord>;
}

/// The destructive "factory reset" collaborator. Returns the number of tables cleared.
#[async_trait]
pub trait ResetJob: Send + Sync {
    async fn clear_all(&self) -> anyhow::Result<u32>;
}
