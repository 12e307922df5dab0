//! Postgres implementations of the folio_core port traits.
//!
//! Each adapter is a newtype wrapping PgPool. All SQL is runtime-checked
//! (sqlx::query, not sqlx::query!) to avoid a compile-time DB requirement.

use std::str::FromStr;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use folio_core::error::FolioError;
use folio_core::ports::{AuditStore, RecordStore, Result};
use folio_core::types::*;

const UNIQUE_VIOLATION: &str = "23505";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

// ── PgAuditStore ──────────────────────────────────────────────

#[derive(Debug, FromRow)]
struct AuditRow {
    id: i64,
    job_id: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    started_by: String,
    status: String,
    error_message: Option<String>,
    tables_cleared: Option<i32>,
    duration_ms: Option<i64>,
    source_address: Option<String>,
}

impl TryFrom<AuditRow> for AuditRecord {
    type Error = FolioError;

    fn try_from(row: AuditRow) -> Result<Self> {
        let status = AuditStatus::from_str(&row.status)
            .map_err(|_| anyhow!("unknown audit status {:?} on job {}", row.status, row.job_id))?;
        Ok(Self {
            id: Some(row.id),
            job_id: row.job_id,
            started_at: row.started_at,
            finished_at: row.finished_at,
            started_by: row.started_by,
            status,
            error_message: row.error_message,
            tables_cleared: row.tables_cleared.map(|n| n.max(0) as u32),
            duration_ms: row.duration_ms,
            source_address: row.source_address,
        })
    }
}

const AUDIT_COLUMNS: &str = "id, job_id, started_at, finished_at, started_by, status, \
     error_message, tables_cleared, duration_ms, source_address";

/// Postgres-backed reset audit store. Single-flight is enforced by the
/// partial unique index `reset_audit_single_flight`.
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn insert_started(&self, record: AuditRecord) -> Result<AuditRecord> {
        let row = sqlx::query_as::<_, AuditRow>(&format!(
            r#"
            INSERT INTO reset_audit (job_id, started_at, started_by, status, source_address)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {AUDIT_COLUMNS}
            "#
        ))
        .bind(&record.job_id)
        .bind(record.started_at)
        .bind(&record.started_by)
        .bind(record.status.to_string())
        .bind(&record.source_address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                FolioError::Conflict("a reset is already in progress".into())
            } else {
                FolioError::Internal(anyhow!(e))
            }
        })?;
        row.try_into()
    }

    async fn finish(&self, record: &AuditRecord) -> Result<AuditRecord> {
        // Guarded on status so a terminal row can never be rewritten.
        let row = sqlx::query_as::<_, AuditRow>(&format!(
            r#"
            UPDATE reset_audit
            SET status = $2,
                finished_at = $3,
                error_message = $4,
                tables_cleared = $5,
                duration_ms = $6
            WHERE job_id = $1
              AND status = 'STARTED'
            RETURNING {AUDIT_COLUMNS}
            "#
        ))
        .bind(&record.job_id)
        .bind(record.status.to_string())
        .bind(record.finished_at)
        .bind(&record.error_message)
        .bind(record.tables_cleared.map(|n| n as i32))
        .bind(record.duration_ms)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        match row {
            Some(r) => r.try_into(),
            None => match self.find_by_job_id(&record.job_id).await? {
                Some(existing) => Err(FolioError::InvalidState(format!(
                    "job {} is already {}",
                    existing.job_id, existing.status
                ))),
                None => Err(FolioError::NotFound(format!("job {}", record.job_id))),
            },
        }
    }

    async fn find_by_job_id(&self, job_id: &str) -> Result<Option<AuditRecord>> {
        let row = sqlx::query_as::<_, AuditRow>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM reset_audit WHERE job_id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        row.map(AuditRecord::try_from).transpose()
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<AuditRecord>> {
        let rows = sqlx::query_as::<_, AuditRow>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM reset_audit ORDER BY started_at DESC, id DESC LIMIT $1"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        rows.into_iter().map(AuditRecord::try_from).collect()
    }

    async fn list_started(&self) -> Result<Vec<AuditRecord>> {
        let rows = sqlx::query_as::<_, AuditRow>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM reset_audit WHERE status = 'STARTED' ORDER BY started_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        rows.into_iter().map(AuditRecord::try_from).collect()
    }
}

// ── PgRecordStore ─────────────────────────────────────────────

#[derive(Debug, FromRow)]
struct ProjectRow {
    id: i64,
    title: String,
    external_repo_url: Option<String>,
    description: Option<String>,
    live_demo_url: Option<String>,
    completion_status: Option<String>,
    priority: Option<String>,
    completeness_score: Option<i16>,
    completeness_missing: Option<Vec<String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
    protection_project_id: Option<i64>,
    protect_description: Option<bool>,
    protect_live_demo_url: Option<bool>,
    protect_skills: Option<bool>,
    protect_experiences: Option<bool>,
    skill_ids: Vec<i64>,
    experience_ids: Vec<i64>,
}

fn parse_opt<T: FromStr>(value: Option<String>, column: &str, id: i64) -> Result<Option<T>> {
    value
        .map(|v| {
            T::from_str(&v)
                .map_err(|_| FolioError::Internal(anyhow!("project {id}: bad {column} {v:?}")))
        })
        .transpose()
}

impl TryFrom<ProjectRow> for ReconcilableRecord {
    type Error = FolioError;

    fn try_from(row: ProjectRow) -> Result<Self> {
        let completion_status = parse_opt(row.completion_status, "completion_status", row.id)?;
        let priority = parse_opt(row.priority, "priority", row.id)?;

        let completeness = match row.completeness_score {
            Some(score) => {
                let missing = row
                    .completeness_missing
                    .unwrap_or_default()
                    .iter()
                    .map(|name| {
                        CompletenessCriterion::from_str(name).map_err(|_| {
                            FolioError::Internal(anyhow!(
                                "project {}: unknown completeness criterion {name:?}",
                                row.id
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Some(CompletenessAssessment {
                    score: score.clamp(0, 4) as u8,
                    missing,
                })
            }
            None => None,
        };

        let protection = row.protection_project_id.map(|_| FieldProtection {
            description: row.protect_description.unwrap_or(false),
            live_demo_url: row.protect_live_demo_url.unwrap_or(false),
            skills: row.protect_skills.unwrap_or(false),
            experiences: row.protect_experiences.unwrap_or(false),
        });

        Ok(Self {
            id: row.id,
            title: row.title,
            external_repo_url: row.external_repo_url,
            description: row.description,
            live_demo_url: row.live_demo_url,
            skill_ids: row.skill_ids,
            experience_ids: row.experience_ids,
            completion_status,
            priority,
            protection,
            completeness,
            meta: AuditMetadata {
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            version: row.version,
        })
    }
}

const PROJECT_SELECT: &str = r#"
    SELECT p.id, p.title, p.external_repo_url, p.description, p.live_demo_url,
           p.completion_status, p.priority,
           p.completeness_score, p.completeness_missing,
           p.created_at, p.updated_at, p.version,
           fp.project_id   AS protection_project_id,
           fp.description  AS protect_description,
           fp.live_demo_url AS protect_live_demo_url,
           fp.skills       AS protect_skills,
           fp.experiences  AS protect_experiences,
           COALESCE(
               (SELECT array_agg(ps.skill_id ORDER BY ps.skill_id)
                FROM project_skills ps WHERE ps.project_id = p.id),
               '{}'::bigint[]) AS skill_ids,
           COALESCE(
               (SELECT array_agg(pe.experience_id ORDER BY pe.experience_id)
                FROM project_experiences pe WHERE pe.project_id = p.id),
               '{}'::bigint[]) AS experience_ids
    FROM projects p
    LEFT JOIN project_field_protection fp ON fp.project_id = p.id
"#;

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<ReconcilableRecord> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!("{PROJECT_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| anyhow!(e))?;
        row.try_into()
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn list_all(&self) -> Result<Vec<ReconcilableRecord>> {
        let rows = sqlx::query_as::<_, ProjectRow>(&format!("{PROJECT_SELECT} ORDER BY p.id"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        rows.into_iter().map(ReconcilableRecord::try_from).collect()
    }

    async fn apply_update(
        &self,
        id: i64,
        expected_version: i64,
        update: &RecordUpdate,
        now: DateTime<Utc>,
    ) -> Result<ReconcilableRecord> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;

        let (score, percentage, missing) = match &update.completeness {
            Some(c) => (
                Some(i16::from(c.score)),
                Some(i16::from(c.percentage())),
                Some(c.missing.iter().map(|m| m.to_string()).collect::<Vec<_>>()),
            ),
            None => (None, None, None),
        };

        let updated = sqlx::query(
            r#"
            UPDATE projects
            SET external_repo_url       = COALESCE($3, external_repo_url),
                description             = COALESCE($4, description),
                live_demo_url           = COALESCE($5, live_demo_url),
                completion_status       = COALESCE($6, completion_status),
                priority                = COALESCE($7, priority),
                completeness_score      = COALESCE($8, completeness_score),
                completeness_percentage = COALESCE($9, completeness_percentage),
                completeness_missing    = COALESCE($10, completeness_missing),
                updated_at              = $11,
                version                 = version + 1
            WHERE id = $1
              AND version = $2
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(&update.external_repo_url)
        .bind(&update.description)
        .bind(&update.live_demo_url)
        .bind(update.completion_status.map(|s| s.to_string()))
        .bind(update.priority.map(|p| p.to_string()))
        .bind(score)
        .bind(percentage)
        .bind(missing)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| anyhow!(e))?;

        if updated.rows_affected() == 0 {
            let exists = sqlx::query_as::<_, (i64,)>("SELECT version FROM projects WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| anyhow!(e))?;
            return Err(match exists {
                Some((current,)) => FolioError::Conflict(format!(
                    "record {id} changed (version {current} != {expected_version})"
                )),
                None => FolioError::NotFound(format!("record {id}")),
            });
        }

        if let Some(p) = &update.protection {
            // OR-merge: storage never clears a flag either.
            sqlx::query(
                r#"
                INSERT INTO project_field_protection
                    (project_id, description, live_demo_url, skills, experiences)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (project_id) DO UPDATE
                SET description   = project_field_protection.description   OR EXCLUDED.description,
                    live_demo_url = project_field_protection.live_demo_url OR EXCLUDED.live_demo_url,
                    skills        = project_field_protection.skills        OR EXCLUDED.skills,
                    experiences   = project_field_protection.experiences   OR EXCLUDED.experiences
                "#,
            )
            .bind(id)
            .bind(p.description)
            .bind(p.live_demo_url)
            .bind(p.skills)
            .bind(p.experiences)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        }

        if let Some(skill_ids) = &update.skill_ids {
            sqlx::query("DELETE FROM project_skills WHERE project_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| anyhow!(e))?;
            sqlx::query(
                "INSERT INTO project_skills (project_id, skill_id) SELECT $1, unnest($2::bigint[])",
            )
            .bind(id)
            .bind(skill_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        }

        if let Some(experience_ids) = &update.experience_ids {
            sqlx::query("DELETE FROM project_experiences WHERE project_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| anyhow!(e))?;
            sqlx::query(
                "INSERT INTO project_experiences (project_id, experience_id) \
                 SELECT $1, unnest($2::bigint[])",
            )
            .bind(id)
            .bind(experience_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        }

        let record = Self::fetch(&mut tx, id).await?;
        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(record)
    }
}
