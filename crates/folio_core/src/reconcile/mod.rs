//! Reconciliation engine: idempotent backfill of derived project fields.
//!
//! Per record, in order:
//! 1. link an external repository from the title slug (only when no link exists)
//! 2. default the protection flags to all-unlocked (only when absent)
//! 3. set completion status and priority (set-once, never overwritten)
//! 4. recompute the completeness assessment
//!
//! The proposal passes through [`ProtectionGate`] before it is written. Writes
//! are version-checked; a record that fails derivation or loses a write race is
//! skipped and reported, and the pass continues.

pub mod heuristics;
pub mod slug;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::error::FolioError;
use crate::ports::{RecordStore, Result};
use crate::protection::ProtectionGate;
use crate::types::{FieldProtection, ReconcilableRecord, RecordUpdate};

use heuristics::{assess_completeness, determine_priority, determine_status, CompletenessInputs};

pub const DEFAULT_REPO_BASE_URL: &str = "https://github.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Account that owns linked repositories. `None` disables linking entirely.
    pub repo_account: Option<String>,
    pub repo_base_url: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            repo_account: None,
            repo_base_url: DEFAULT_REPO_BASE_URL.to_string(),
        }
    }
}

impl ReconcileConfig {
    fn account(&self) -> Option<&str> {
        self.repo_account
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    fn repo_url(&self, account: &str, slug: &str) -> String {
        format!("{}/{account}/{slug}", self.repo_base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRecord {
    pub record_id: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub scanned: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub skipped: Vec<SkippedRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Compute the update the engine wants to make to `record`, before protection
/// filtering. Empty when the record is already reconciled.
pub fn propose(record: &ReconcilableRecord, config: &ReconcileConfig) -> Result<RecordUpdate> {
    let mut update = RecordUpdate::default();

    if record.external_repo_url.is_none() {
        if let Some(account) = config.account() {
            if record.title.trim().is_empty() {
                return Err(FolioError::InvalidArgument(format!(
                    "record {} has no title to derive a repository slug from",
                    record.id
                )));
            }
            match slug::slugify(&record.title) {
                Some(s) => update.external_repo_url = Some(config.repo_url(account, &s)),
                None => tracing::debug!(record_id = record.id, title = %record.title, "title yields no usable slug"),
            }
        }
    }

    if record.protection.is_none() {
        update.protection = Some(FieldProtection::default());
    }

    let description = record.description.as_deref();
    let live_demo = record.live_demo_url.as_deref();
    if record.completion_status.is_none() {
        update.completion_status = Some(determine_status(description, live_demo));
    }
    if record.priority.is_none() {
        update.priority = Some(determine_priority(description, live_demo));
    }

    // An external link stands in for experience linkage during backfill.
    let linked = record.external_repo_url.is_some() || update.external_repo_url.is_some();
    let completeness = assess_completeness(CompletenessInputs {
        description,
        live_demo_url: live_demo,
        has_skills: !record.skill_ids.is_empty(),
        has_experiences: !record.experience_ids.is_empty() || linked,
    });
    if record.completeness.as_ref() != Some(&completeness) {
        update.completeness = Some(completeness);
    }

    Ok(update)
}

pub struct ReconciliationEngine {
    store: Arc<dyn RecordStore>,
    config: ReconcileConfig,
    clock: Arc<dyn Clock>,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn RecordStore>, config: ReconcileConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn RecordStore>,
        config: ReconcileConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// Run one full pass. Only a failure to list records aborts the pass.
    pub async fn run(&self) -> Result<ReconcileReport> {
        let started_at = self.clock.now();
        let records = self.store.list_all().await?;
        tracing::info!(count = records.len(), linking = self.config.account().is_some(), "reconciliation pass started");

        let mut report = ReconcileReport {
            scanned: 0,
            updated: 0,
            unchanged: 0,
            skipped: Vec::new(),
            started_at,
            finished_at: started_at,
        };

        for record in &records {
            report.scanned += 1;
            match self.reconcile_one(record).await {
                Ok(true) => report.updated += 1,
                Ok(false) => report.unchanged += 1,
                Err(e) => {
                    tracing::warn!(record_id = record.id, "skipping record: {e}");
                    report.skipped.push(SkippedRecord {
                        record_id: record.id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.finished_at = self.clock.now();
        tracing::info!(
            scanned = report.scanned,
            updated = report.updated,
            unchanged = report.unchanged,
            skipped = report.skipped.len(),
            "reconciliation pass finished"
        );
        Ok(report)
    }

    /// Returns whether a write happened.
    async fn reconcile_one(&self, record: &ReconcilableRecord) -> Result<bool> {
        let proposed = propose(record, &self.config)?;
        let allowed = ProtectionGate::filter_writable(proposed, &record.effective_protection());
        if allowed.is_empty() {
            return Ok(false);
        }
        self.store
            .apply_update(record.id, record.version, &allowed, self.clock.now())
            .await?;
        tracing::debug!(record_id = record.id, "record reconciled");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRecordStore;
    use crate::types::{
        AuditMetadata, CompletenessCriterion, CompletionStatus, Priority,
    };
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap()
    }

    fn record(id: i64, title: &str) -> ReconcilableRecord {
        ReconcilableRecord {
            id,
            title: title.into(),
            external_repo_url: None,
            description: None,
            live_demo_url: None,
            skill_ids: vec![],
            experience_ids: vec![],
            completion_status: None,
            priority: None,
            protection: None,
            completeness: None,
            meta: AuditMetadata::new(ts()),
            version: 1,
        }
    }

    fn linking() -> ReconcileConfig {
        ReconcileConfig {
            repo_account: Some("octo".into()),
            ..Default::default()
        }
    }

    #[test]
    fn propose_links_from_slug() {
        let update = propose(&record(1, "My Cool, Project!!"), &linking()).unwrap();
        assert_eq!(
            update.external_repo_url.as_deref(),
            Some("https://github.com/octo/my-cool-project")
        );
    }

    #[test]
    fn existing_link_is_never_replaced() {
        let mut r = record(1, "Another Name");
        r.external_repo_url = Some("https://gitlab.com/me/original".into());
        assert!(propose(&r, &linking()).unwrap().external_repo_url.is_none());
    }

    #[test]
    fn no_account_means_no_linking() {
        let update = propose(&record(1, "Linkable Title"), &ReconcileConfig::default()).unwrap();
        assert!(update.external_repo_url.is_none());
        let blank = ReconcileConfig {
            repo_account: Some("   ".into()),
            ..Default::default()
        };
        assert!(propose(&record(1, "Linkable Title"), &blank)
            .unwrap()
            .external_repo_url
            .is_none());
    }

    #[test]
    fn rejected_slug_produces_no_link_but_still_backfills() {
        let update = propose(&record(1, "a"), &linking()).unwrap();
        assert!(update.external_repo_url.is_none());
        assert_eq!(update.completion_status, Some(CompletionStatus::Backlog));
    }

    #[test]
    fn blank_title_is_malformed_when_linking() {
        assert!(matches!(
            propose(&record(1, "  "), &linking()),
            Err(FolioError::InvalidArgument(_))
        ));
        assert!(propose(&record(1, "  "), &ReconcileConfig::default()).is_ok());
    }

    #[test]
    fn status_and_priority_are_set_once() {
        let mut r = record(1, "Demo");
        r.live_demo_url = Some("https://demo.example".into());
        r.completion_status = Some(CompletionStatus::Backlog);
        r.priority = Some(Priority::Low);
        let update = propose(&r, &ReconcileConfig::default()).unwrap();
        assert!(update.completion_status.is_none());
        assert!(update.priority.is_none());
    }

    #[test]
    fn live_demo_with_long_description_resolves_live() {
        let mut r = record(1, "Demo");
        r.live_demo_url = Some("https://demo.example".into());
        r.description = Some("d".repeat(200));
        let update = propose(&r, &ReconcileConfig::default()).unwrap();
        assert_eq!(update.completion_status, Some(CompletionStatus::Live));
        assert_eq!(update.priority, Some(Priority::High));
    }

    #[test]
    fn existing_protection_is_kept() {
        let mut r = record(1, "Demo");
        r.protection = Some(FieldProtection {
            skills: true,
            ..Default::default()
        });
        assert!(propose(&r, &ReconcileConfig::default())
            .unwrap()
            .protection
            .is_none());
    }

    #[test]
    fn link_counts_toward_experiences() {
        let update = propose(&record(1, "Linked Project"), &linking()).unwrap();
        let c = update.completeness.unwrap();
        assert!(!c.missing.contains(&CompletenessCriterion::HasExperiences));
        assert_eq!(c.score, 1);
    }

    #[tokio::test]
    async fn second_pass_is_a_no_op() {
        let mut busy = record(2, "Busy Project");
        busy.description = Some("A fairly detailed description of what this project does, long enough.".into());
        busy.skill_ids = vec![3, 4];
        let store = Arc::new(InMemoryRecordStore::new(vec![
            record(1, "My Cool, Project!!"),
            busy,
            record(3, "x"),
        ]));
        let engine = ReconciliationEngine::new(store.clone(), linking());

        let first = engine.run().await.unwrap();
        assert_eq!(first.scanned, 3);
        assert_eq!(first.updated, 3);
        let after_first = store.list_all().await.unwrap();

        let second = engine.run().await.unwrap();
        assert_eq!(second.updated, 0);
        assert_eq!(second.unchanged, 3);
        assert!(second.skipped.is_empty());
        assert_eq!(store.list_all().await.unwrap(), after_first);
    }

    #[tokio::test]
    async fn protected_description_never_changes() {
        let mut r = record(1, "Guarded");
        r.description = Some("hand written".into());
        r.protection = Some(FieldProtection {
            description: true,
            ..Default::default()
        });
        let store = Arc::new(InMemoryRecordStore::new(vec![r]));
        let engine = ReconciliationEngine::new(store.clone(), linking());
        for _ in 0..3 {
            engine.run().await.unwrap();
            let saved = store.get(1).await.unwrap();
            assert_eq!(saved.description.as_deref(), Some("hand written"));
            assert!(saved.protection.unwrap().description);
        }
    }

    #[tokio::test]
    async fn bad_record_does_not_abort_the_pass() {
        let store = Arc::new(InMemoryRecordStore::new(vec![
            record(1, ""),
            record(2, "Fine Project"),
        ]));
        let engine = ReconciliationEngine::new(store.clone(), linking());
        let report = engine.run().await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.updated, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].record_id, 1);
        assert!(store.get(2).await.unwrap().external_repo_url.is_some());
        assert!(store.get(1).await.unwrap().completion_status.is_none());
    }

    #[tokio::test]
    async fn report_and_writes_use_the_injected_clock() {
        let clock = Arc::new(crate::clock::ManualClock::new(ts()));
        let store = Arc::new(InMemoryRecordStore::new(vec![record(1, "Timed Project")]));
        let engine = ReconciliationEngine::with_clock(store.clone(), linking(), clock.clone());

        let first = engine.run().await.unwrap();
        assert_eq!(first.started_at, ts());
        assert_eq!(first.finished_at, ts());
        let saved = store.get(1).await.unwrap();
        assert_eq!(saved.meta.updated_at, ts());
        assert_eq!(saved.meta.created_at, ts());

        clock.advance(chrono::Duration::hours(1));
        let second = engine.run().await.unwrap();
        assert_eq!(second.started_at, ts() + chrono::Duration::hours(1));
        assert_eq!(second.updated, 0);
        // No write, so the record keeps its earlier timestamp.
        assert_eq!(store.get(1).await.unwrap().meta.updated_at, ts());
    }

    /// Store whose records move on between listing and writing.
    struct RacingStore {
        inner: InMemoryRecordStore,
    }

    #[async_trait::async_trait]
    impl RecordStore for RacingStore {
        async fn list_all(&self) -> Result<Vec<ReconcilableRecord>> {
            let rows = self.inner.list_all().await?;
            for r in &rows {
                let mut edited = r.clone();
                edited.version += 1;
                self.inner.replace(edited).await;
            }
            Ok(rows)
        }

        async fn apply_update(
            &self,
            id: i64,
            expected_version: i64,
            update: &RecordUpdate,
            now: DateTime<Utc>,
        ) -> Result<ReconcilableRecord> {
            self.inner.apply_update(id, expected_version, update, now).await
        }
    }

    #[tokio::test]
    async fn lost_write_race_is_skipped() {
        let store = Arc::new(RacingStore {
            inner: InMemoryRecordStore::new(vec![record(1, "Contended")]),
        });
        let engine = ReconciliationEngine::new(store, ReconcileConfig::default());
        let report = engine.run().await.unwrap();
        assert_eq!(report.updated, 0);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.starts_with("conflict"));
    }
}
