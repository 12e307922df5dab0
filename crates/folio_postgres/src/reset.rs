//! Content reset: truncates the portfolio tables in one transaction.

use anyhow::{bail, Context};
use async_trait::async_trait;
use sqlx::PgPool;

use folio_core::ports::ResetJob;

pub const DEFAULT_RESET_TABLES: &[&str] = &[
    "project_skills",
    "project_experiences",
    "project_field_protection",
    "projects",
    "skills",
    "experiences",
];

/// The audit table is never a valid reset target.
const AUDIT_TABLE: &str = "reset_audit";

pub struct PgContentReset {
    pool: PgPool,
    tables: Vec<String>,
}

impl PgContentReset {
    /// Table names are interpolated into SQL, so only plain identifiers are accepted.
    pub fn new(pool: PgPool, tables: Vec<String>) -> anyhow::Result<Self> {
        if tables.is_empty() {
            bail!("reset table list is empty");
        }
        for t in &tables {
            let valid = !t.is_empty()
                && t.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !t.starts_with(|c: char| c.is_ascii_digit());
            if !valid {
                bail!("invalid reset table name {t:?}");
            }
            if t.eq_ignore_ascii_case(AUDIT_TABLE) {
                bail!("{AUDIT_TABLE} cannot be cleared by a reset");
            }
        }
        Ok(Self { pool, tables })
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }
}

#[async_trait]
impl ResetJob for PgContentReset {
    async fn clear_all(&self) -> anyhow::Result<u32> {
        let mut tx = self.pool.begin().await.context("begin reset transaction")?;
        for table in &self.tables {
            sqlx::query(&format!("TRUNCATE TABLE {table} RESTART IDENTITY CASCADE"))
                .execute(&mut *tx)
                .await
                .with_context(|| format!("truncate {table}"))?;
            tracing::debug!(table = %table, "table cleared");
        }
        tx.commit().await.context("commit reset transaction")?;
        Ok(self.tables.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy_pool() -> PgPool {
        PgPool::connect_lazy("postgres://localhost/folio_unused").unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn default_tables_are_accepted() {
        let reset = PgContentReset::new(lazy_pool(), names(DEFAULT_RESET_TABLES)).unwrap();
        assert_eq!(reset.tables().len(), DEFAULT_RESET_TABLES.len());
    }

    #[tokio::test]
    async fn injection_shaped_names_are_rejected() {
        assert!(PgContentReset::new(lazy_pool(), names(&["projects; DROP TABLE x"])).is_err());
        assert!(PgContentReset::new(lazy_pool(), names(&["public.projects"])).is_err());
        assert!(PgContentReset::new(lazy_pool(), names(&["1projects"])).is_err());
        assert!(PgContentReset::new(lazy_pool(), names(&[""])).is_err());
    }

    #[tokio::test]
    async fn audit_table_and_empty_list_are_rejected() {
        assert!(PgContentReset::new(lazy_pool(), names(&["projects", "RESET_AUDIT"])).is_err());
        assert!(PgContentReset::new(lazy_pool(), vec![]).is_err());
    }
}
