//! Router construction for the Folio admin server.

use std::sync::Arc;

use axum::{
    http::{header, HeaderName, Method},
    middleware as axum_mw,
    routing::{get, post},
    Extension, Router,
};
use folio_core::jobs::ResetCoordinator;
use folio_core::reconcile::ReconciliationEngine;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::handlers::stream::StreamSettings;
use crate::middleware::admin_token::{admin_gate, AccessConfig, ADMIN_TOKEN_HEADER};

/// Services shared by every handler.
#[derive(Clone)]
pub struct AdminServices {
    pub resets: Arc<ResetCoordinator>,
    pub engine: Arc<ReconciliationEngine>,
    pub stream: StreamSettings,
}

/// Build the full axum router with all routes and middleware.
pub fn build_router(services: AdminServices, access: AccessConfig) -> Router {
    let admin = Router::new()
        .route("/api/admin/reset", post(handlers::reset::trigger_reset))
        .route("/api/admin/reset/status", get(handlers::reset::reset_status))
        .route("/api/admin/reset/audit", get(handlers::reset::reset_audit))
        .route(
            "/api/admin/reset/stream/:job_id",
            get(handlers::stream::stream_reset),
        )
        .route("/api/admin/reconcile", post(handlers::reconcile::reconcile));

    let public = Router::new().route("/health", get(handlers::health::health));

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(ADMIN_TOKEN_HEADER),
        ]);

    // Gate wraps CORS: preflights pass through to the CORS layer, and denials
    // carry their own CORS headers.
    public
        .merge(admin)
        .layer(Extension(services.resets))
        .layer(Extension(services.engine))
        .layer(Extension(services.stream))
        .layer(cors)
        .layer(axum_mw::from_fn_with_state(Arc::new(access), admin_gate))
        .layer(TraceLayer::new_for_http())
}
