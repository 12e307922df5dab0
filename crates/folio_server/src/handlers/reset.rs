//! Reset handlers.
//!
//! POST /api/admin/reset          start a reset (202, or 409 while one runs)
//! GET  /api/admin/reset/status   in-progress flag and latest audit record
//! GET  /api/admin/reset/audit    audit trail, most recent first

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Query},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use folio_core::jobs::{ResetCoordinator, ResetStatus};
use folio_core::types::AuditRecord;
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::admin_token::AdminPrincipal;

pub const DEFAULT_AUDIT_LIMIT: u32 = 50;
pub const MAX_AUDIT_LIMIT: u32 = 500;

/// First hop of `X-Forwarded-For`, else the peer address.
fn source_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .or_else(|| peer.map(|p| p.ip().to_string()))
}

pub async fn trigger_reset(
    Extension(resets): Extension<Arc<ResetCoordinator>>,
    principal: Option<Extension<AdminPrincipal>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<AuditRecord>), AppError> {
    let actor = principal
        .map(|Extension(p)| p.actor)
        .unwrap_or_else(|| "anonymous".into());
    let source = source_address(&headers, peer.map(|ConnectInfo(addr)| addr));
    let started = resets.begin_reset(&actor, source.as_deref()).await?;
    Ok((StatusCode::ACCEPTED, Json(started.record)))
}

pub async fn reset_status(
    Extension(resets): Extension<Arc<ResetCoordinator>>,
) -> Result<Json<ResetStatus>, AppError> {
    Ok(Json(resets.status().await?))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<u32>,
}

pub async fn reset_audit(
    Extension(resets): Extension<Arc<ResetCoordinator>>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditRecord>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT);
    Ok(Json(resets.history(limit).await?))
}
