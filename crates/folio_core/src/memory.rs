//! In-memory port implementations. Used by tests and by `folio serve --in-memory`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::FolioError;
use crate::ports::{AuditStore, RecordStore, ResetJob, Result};
use crate::types::{AuditRecord, AuditStatus, ReconcilableRecord, RecordUpdate};

#[derive(Default)]
struct AuditRows {
    next_id: i64,
    rows: Vec<AuditRecord>,
}

/// Audit store backed by a mutex-guarded vector. The check-and-insert in
/// `insert_started` happens under one lock, which gives the single-flight guarantee.
#[derive(Default)]
pub struct InMemoryAuditStore {
    inner: Mutex<AuditRows>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn insert_started(&self, record: AuditRecord) -> Result<AuditRecord> {
        if record.status != AuditStatus::Started {
            return Err(FolioError::InvalidState(format!(
                "insert_started called with a {} record",
                record.status
            )));
        }
        let mut inner = self.inner.lock().await;
        if let Some(running) = inner.rows.iter().find(|r| r.is_in_progress()) {
            return Err(FolioError::Conflict(format!(
                "reset {} is already in progress",
                running.job_id
            )));
        }
        if inner.rows.iter().any(|r| r.job_id == record.job_id) {
            return Err(FolioError::Conflict(format!(
                "job id {} already used",
                record.job_id
            )));
        }
        inner.next_id += 1;
        let stored = AuditRecord {
            id: Some(inner.next_id),
            ..record
        };
        inner.rows.push(stored.clone());
        Ok(stored)
    }

    async fn finish(&self, record: &AuditRecord) -> Result<AuditRecord> {
        let mut inner = self.inner.lock().await;
        let row = inner
            .rows
            .iter_mut()
            .find(|r| r.job_id == record.job_id)
            .ok_or_else(|| FolioError::NotFound(format!("job {}", record.job_id)))?;
        if !row.is_in_progress() {
            return Err(FolioError::InvalidState(format!(
                "job {} is already {}",
                row.job_id, row.status
            )));
        }
        *row = AuditRecord {
            id: row.id,
            ..record.clone()
        };
        Ok(row.clone())
    }

    async fn find_by_job_id(&self, job_id: &str) -> Result<Option<AuditRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner.rows.iter().find(|r| r.job_id == job_id).cloned())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<AuditRecord>> {
        let inner = self.inner.lock().await;
        let mut rows = inner.rows.clone();
        rows.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn list_started(&self) -> Result<Vec<AuditRecord>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<_> = inner
            .rows
            .iter()
            .filter(|r| r.is_in_progress())
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(rows)
    }
}

#[derive(Default)]
pub struct InMemoryRecordStore {
    rows: Mutex<BTreeMap<i64, ReconcilableRecord>>,
}

impl InMemoryRecordStore {
    pub fn new(records: impl IntoIterator<Item = ReconcilableRecord>) -> Self {
        Self {
            rows: Mutex::new(records.into_iter().map(|r| (r.id, r)).collect()),
        }
    }

    pub async fn get(&self, id: i64) -> Option<ReconcilableRecord> {
        self.rows.lock().await.get(&id).cloned()
    }

    /// Simulates a user edit racing the engine.
    pub async fn replace(&self, record: ReconcilableRecord) {
        self.rows.lock().await.insert(record.id, record);
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn list_all(&self) -> Result<Vec<ReconcilableRecord>> {
        Ok(self.rows.lock().await.values().cloned().collect())
    }

    async fn apply_update(
        &self,
        id: i64,
        expected_version: i64,
        update: &RecordUpdate,
        now: DateTime<Utc>,
    ) -> Result<ReconcilableRecord> {
        let mut rows = self.rows.lock().await;
        let current = rows
            .get(&id)
            .ok_or_else(|| FolioError::NotFound(format!("record {id}")))?;
        if current.version != expected_version {
            return Err(FolioError::Conflict(format!(
                "record {id} changed (version {} != {expected_version})",
                current.version
            )));
        }
        let next = update.apply_to(current, now);
        rows.insert(id, next.clone());
        Ok(next)
    }
}

/// Clearing the in-memory content counts as one table.
#[async_trait]
impl ResetJob for InMemoryRecordStore {
    async fn clear_all(&self) -> anyhow::Result<u32> {
        self.rows.lock().await.clear();
        Ok(1)
    }
}
