//! Core domain types for the Folio admin subsystem.
//! Pure value types: no sqlx, no HTTP. Every transition returns a new value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

// ── Audit ────────────────────────────────────────────────────

/// Lifecycle status of an administrative job.
///
/// `Started` is the only initial state; `Completed` and `Failed` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Started,
    Completed,
    Failed,
}

impl AuditStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One administrative job's lifecycle entry.
///
/// Invariants (enforced by the constructors in `audit.rs`):
/// - `finished_at` is `None` iff `status == Started`
/// - `duration_ms` is `Some` iff `finished_at` is `Some`
/// - `error_message` is set only on `Failed`, `tables_cleared` only on `Completed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Assigned by storage; `None` until persisted.
    pub id: Option<i64>,
    pub job_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub started_by: String,
    pub status: AuditStatus,
    pub error_message: Option<String>,
    pub tables_cleared: Option<u32>,
    pub duration_ms: Option<i64>,
    pub source_address: Option<String>,
}

// ── Portfolio content ────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionStatus {
    Live,
    InProgress,
    Backlog,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Per-field "do not overwrite" flags set by explicit user edits.
/// A missing record is treated as all-false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldProtection {
    pub description: bool,
    pub live_demo_url: bool,
    pub skills: bool,
    pub experiences: bool,
}

/// Fields guarded by [`FieldProtection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ProtectedField {
    Description,
    LiveDemoUrl,
    Skills,
    Experiences,
}

impl FieldProtection {
    pub fn is_locked(&self, field: ProtectedField) -> bool {
        match field {
            ProtectedField::Description => self.description,
            ProtectedField::LiveDemoUrl => self.live_demo_url,
            ProtectedField::Skills => self.skills,
            ProtectedField::Experiences => self.experiences,
        }
    }

    /// True if `other` keeps every flag that is set here.
    pub fn is_preserved_by(&self, other: &FieldProtection) -> bool {
        (!self.description || other.description)
            && (!self.live_demo_url || other.live_demo_url)
            && (!self.skills || other.skills)
            && (!self.experiences || other.experiences)
    }
}

/// Completeness checklist entries, in declaration (reporting) order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum CompletenessCriterion {
    HasDescription,
    HasLiveDemo,
    HasSkills,
    HasExperiences,
}

impl CompletenessCriterion {
    pub const ALL: [CompletenessCriterion; 4] = [
        Self::HasDescription,
        Self::HasLiveDemo,
        Self::HasSkills,
        Self::HasExperiences,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletenessAssessment {
    /// Count of satisfied criteria, 0..=4.
    pub score: u8,
    pub missing: Vec<CompletenessCriterion>,
}

impl CompletenessAssessment {
    pub fn percentage(&self) -> u8 {
        (u32::from(self.score) * 100 / CompletenessCriterion::ALL.len() as u32) as u8
    }
}

/// Created/updated timestamps carried by every persisted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AuditMetadata {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touched(self, now: DateTime<Utc>) -> Self {
        Self {
            updated_at: now,
            ..self
        }
    }
}

/// The slice of a portfolio project the reconciliation engine reads and writes.
/// Owned by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilableRecord {
    pub id: i64,
    pub title: String,
    pub external_repo_url: Option<String>,
    pub description: Option<String>,
    pub live_demo_url: Option<String>,
    pub skill_ids: Vec<i64>,
    pub experience_ids: Vec<i64>,
    pub completion_status: Option<CompletionStatus>,
    pub priority: Option<Priority>,
    pub protection: Option<FieldProtection>,
    pub completeness: Option<CompletenessAssessment>,
    pub meta: AuditMetadata,
    /// Optimistic concurrency token, bumped on every write.
    pub version: i64,
}

impl ReconcilableRecord {
    pub fn effective_protection(&self) -> FieldProtection {
        self.protection.unwrap_or_default()
    }
}

/// A proposed partial update. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordUpdate {
    pub external_repo_url: Option<String>,
    pub description: Option<String>,
    pub live_demo_url: Option<String>,
    pub skill_ids: Option<Vec<i64>>,
    pub experience_ids: Option<Vec<i64>>,
    pub completion_status: Option<CompletionStatus>,
    pub priority: Option<Priority>,
    pub protection: Option<FieldProtection>,
    pub completeness: Option<CompletenessAssessment>,
}

impl RecordUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Produce the record that results from applying this update.
    /// Bumps `version` and `updated_at` only when something changes.
    pub fn apply_to(&self, record: &ReconcilableRecord, now: DateTime<Utc>) -> ReconcilableRecord {
        if self.is_empty() {
            return record.clone();
        }
        ReconcilableRecord {
            id: record.id,
            title: record.title.clone(),
            external_repo_url: self
                .external_repo_url
                .clone()
                .or_else(|| record.external_repo_url.clone()),
            description: self
                .description
                .clone()
                .or_else(|| record.description.clone()),
            live_demo_url: self
                .live_demo_url
                .clone()
                .or_else(|| record.live_demo_url.clone()),
            skill_ids: self
                .skill_ids
                .clone()
                .unwrap_or_else(|| record.skill_ids.clone()),
            experience_ids: self
                .experience_ids
                .clone()
                .unwrap_or_else(|| record.experience_ids.clone()),
            completion_status: self.completion_status.or(record.completion_status),
            priority: self.priority.or(record.priority),
            protection: self.protection.or(record.protection),
            completeness: self
                .completeness
                .clone()
                .or_else(|| record.completeness.clone()),
            meta: record.meta.touched(now),
            version: record.version + 1,
        }
    }
}
