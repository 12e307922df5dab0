//! Folio PostgreSQL adapter.

pub mod reset;
pub mod store;

use sqlx::PgPool;

pub use reset::{PgContentReset, DEFAULT_RESET_TABLES};
pub use store::{PgAuditStore, PgRecordStore};

/// All Postgres-backed stores, constructed from one pool.
pub struct PgStores {
    pub audit: PgAuditStore,
    pub records: PgRecordStore,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self {
            audit: PgAuditStore::new(pool.clone()),
            records: PgRecordStore::new(pool),
        }
    }
}

/// Apply the embedded schema migrations.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
