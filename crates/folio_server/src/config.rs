//! Environment-driven configuration.
//!
//! Variables (all optional unless noted):
//!   FOLIO_DATABASE_URL        Postgres connection string (falls back to DATABASE_URL)
//!   FOLIO_BIND_ADDR           listen address (default 0.0.0.0:8080)
//!   FOLIO_ADMIN_TOKEN         shared admin secret; unset or blank denies every guarded request
//!   FOLIO_ADMIN_AUTH_DISABLED `true` turns the admin gate off
//!   FOLIO_REPO_ACCOUNT        account used to derive repository links
//!   FOLIO_REPO_BASE_URL       repository host (default https://github.com)
//!   FOLIO_STREAM_POLL_MS      status stream poll interval (default 500)
//!   FOLIO_RESET_STALE_SECS    age after which a STARTED reset is abandoned (default 3600)
//!   FOLIO_RESET_TABLES        comma-separated tables cleared by a reset

use std::time::Duration;

use anyhow::{bail, Context};
use folio_core::reconcile::{ReconcileConfig, DEFAULT_REPO_BASE_URL};
use folio_postgres::DEFAULT_RESET_TABLES;

use crate::middleware::admin_token::AccessConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_STREAM_POLL_MS: u64 = 500;
const DEFAULT_RESET_STALE_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub access: AccessConfig,
    pub reconcile: ReconcileConfig,
    pub stream_poll: Duration,
    pub reset_stale_after: Duration,
    pub reset_tables: Vec<String>,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let database_url = get("FOLIO_DATABASE_URL").or_else(|| get("DATABASE_URL"));
        let bind_addr = get("FOLIO_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());

        let disabled = match get("FOLIO_ADMIN_AUTH_DISABLED") {
            Some(v) => parse_bool(&v).context("FOLIO_ADMIN_AUTH_DISABLED")?,
            None => false,
        };
        let access = AccessConfig::new(get("FOLIO_ADMIN_TOKEN"), disabled);

        let reconcile = ReconcileConfig {
            repo_account: get("FOLIO_REPO_ACCOUNT"),
            repo_base_url: get("FOLIO_REPO_BASE_URL")
                .unwrap_or_else(|| DEFAULT_REPO_BASE_URL.into()),
        };

        let stream_poll_ms: u64 = match get("FOLIO_STREAM_POLL_MS") {
            Some(v) => v.parse().context("FOLIO_STREAM_POLL_MS")?,
            None => DEFAULT_STREAM_POLL_MS,
        };
        if stream_poll_ms == 0 {
            bail!("FOLIO_STREAM_POLL_MS must be positive");
        }
        let stale_secs: u64 = match get("FOLIO_RESET_STALE_SECS") {
            Some(v) => v.parse().context("FOLIO_RESET_STALE_SECS")?,
            None => DEFAULT_RESET_STALE_SECS,
        };

        let reset_tables = match get("FOLIO_RESET_TABLES") {
            Some(v) => v
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
            None => DEFAULT_RESET_TABLES.iter().map(|t| t.to_string()).collect(),
        };

        Ok(Self {
            database_url,
            bind_addr,
            access,
            reconcile,
            stream_poll: Duration::from_millis(stream_poll_ms),
            reset_stale_after: Duration::from_secs(stale_secs),
            reset_tables,
        })
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("FOLIO_DATABASE_URL (or DATABASE_URL) must be set")
    }
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}
