//! POST /api/admin/reconcile runs one reconciliation pass synchronously.

use std::sync::Arc;

use axum::{Extension, Json};
use folio_core::reconcile::{ReconcileReport, ReconciliationEngine};

use crate::error::AppError;
use crate::middleware::admin_token::AdminPrincipal;

pub async fn reconcile(
    Extension(engine): Extension<Arc<ReconciliationEngine>>,
    principal: Option<Extension<AdminPrincipal>>,
) -> Result<Json<ReconcileReport>, AppError> {
    let actor = principal.map(|Extension(p)| p.actor);
    tracing::info!(actor = actor.as_deref().unwrap_or("anonymous"), "reconcile requested");
    let report = engine.run().await?;
    Ok(Json(report))
}
