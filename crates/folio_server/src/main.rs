//! folio: admin server and maintenance commands.
//!
//! Configuration comes from the environment (see `folio_server::config`);
//! a `.env` file in the working directory is loaded first if present.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use folio_core::audit::AuditedJobTracker;
use folio_core::jobs::ResetCoordinator;
use folio_core::memory::{InMemoryAuditStore, InMemoryRecordStore};
use folio_core::ports::{AuditStore, RecordStore, ResetJob};
use folio_core::reconcile::ReconciliationEngine;
use folio_postgres::{migrate, PgContentReset, PgStores};
use folio_server::config::ServerConfig;
use folio_server::handlers::stream::StreamSettings;
use folio_server::router::{build_router, AdminServices};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "folio", about = "Portfolio admin data lifecycle")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Use in-memory stores instead of Postgres
        #[arg(long)]
        in_memory: bool,
    },
    /// Run one reconciliation pass and print the report as JSON
    Reconcile,
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,folio_server=debug,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::from_env()?;

    match cli.command.unwrap_or(Command::Serve { in_memory: false }) {
        Command::Serve { in_memory } => serve(config, in_memory).await,
        Command::Reconcile => {
            let pool = connect(&config).await?;
            let records: Arc<dyn RecordStore> = Arc::new(PgStores::new(pool).records);
            let report = ReconciliationEngine::new(records, config.reconcile.clone())
                .run()
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Migrate => {
            connect(&config).await?;
            tracing::info!("migrations applied");
            Ok(())
        }
    }
}

async fn connect(config: &ServerConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(config.require_database_url()?)
        .await
        .context("failed to connect to database")?;
    tracing::info!("Connected to database");
    migrate(&pool).await.context("migrations failed")?;
    Ok(pool)
}

async fn serve(config: ServerConfig, in_memory: bool) -> anyhow::Result<()> {
    let (audit, records, job) = if in_memory {
        tracing::warn!("using in-memory stores; state is lost on exit");
        let store = Arc::new(InMemoryRecordStore::default());
        let audit: Arc<dyn AuditStore> = Arc::new(InMemoryAuditStore::new());
        let job: Arc<dyn ResetJob> = store.clone();
        let records: Arc<dyn RecordStore> = store;
        (audit, records, job)
    } else {
        let pool = connect(&config).await?;
        let job: Arc<dyn ResetJob> =
            Arc::new(PgContentReset::new(pool.clone(), config.reset_tables.clone())?);
        let stores = PgStores::new(pool);
        let audit: Arc<dyn AuditStore> = Arc::new(stores.audit);
        let records: Arc<dyn RecordStore> = Arc::new(stores.records);
        (audit, records, job)
    };

    if config.access.is_disabled() {
        tracing::warn!("admin gate disabled; admin endpoints are open");
    } else if !config.access.has_secret() {
        tracing::warn!("FOLIO_ADMIN_TOKEN not set; admin endpoints will deny every request");
    }

    let resets = Arc::new(ResetCoordinator::new(
        audit,
        job,
        AuditedJobTracker::default(),
    ));
    let abandoned = resets.fail_abandoned(config.reset_stale_after).await?;
    if abandoned > 0 {
        tracing::warn!(abandoned, "marked stale resets as failed");
    }

    let services = AdminServices {
        resets,
        engine: Arc::new(ReconciliationEngine::new(records, config.reconcile.clone())),
        stream: StreamSettings {
            poll: config.stream_poll,
        },
    };
    let app = build_router(services, config.access.clone());

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;
    tracing::info!("folio listening on {}", config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutdown requested");
    })
    .await
    .context("server error")
}
