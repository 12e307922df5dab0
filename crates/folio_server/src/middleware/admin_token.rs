//! Admin access gate.
//!
//! Rules, first match wins:
//!   1. OPTIONS requests pass (CORS preflight).
//!   2. A disabled gate passes everything.
//!   3. Allow-listed read-only admin paths pass.
//!   4. Paths outside the admin prefix pass.
//!   5. Otherwise the presented token must equal the configured secret.
//!
//! The token comes from `Authorization: Bearer <t>`, or from `X-Admin-Token`
//! when no Bearer credential is present. With no secret configured rule 5
//! always denies.

use std::fmt;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

pub const ADMIN_PREFIX: &str = "/api/admin";
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

const PUBLIC_ADMIN_PATHS: &[&str] = &["/api/admin/reset/status", "/api/admin/reset/audit"];
const PUBLIC_ADMIN_PREFIXES: &[&str] = &["/api/admin/reset/stream/"];

#[derive(Clone, Default)]
pub struct AccessConfig {
    secret: Option<String>,
    disabled: bool,
}

impl AccessConfig {
    /// Blank secrets are treated as unset.
    pub fn new(secret: Option<String>, disabled: bool) -> Self {
        let secret = secret
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Self { secret, disabled }
    }

    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self::new(Some(secret.into()), false)
    }

    pub fn disabled() -> Self {
        Self::new(None, true)
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }
}

impl fmt::Debug for AccessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("disabled", &self.disabled)
            .finish()
    }
}

/// Which rule admitted the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Preflight,
    GateDisabled,
    PublicAdminPath,
    NotGuarded,
    Token,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    SecretNotConfigured,
    MissingToken,
    TokenMismatch,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SecretNotConfigured => "admin secret not configured",
            Self::MissingToken => "no admin token presented",
            Self::TokenMismatch => "admin token mismatch",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow(Grant),
    Deny(DenyReason),
}

/// Attached to requests admitted through the gate. `elevated` is set only
/// when a matching token was presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPrincipal {
    pub actor: String,
    pub elevated: bool,
}

impl AdminPrincipal {
    fn from_grant(grant: Grant) -> Self {
        match grant {
            Grant::Token => Self {
                actor: "admin".into(),
                elevated: true,
            },
            _ => Self {
                actor: "anonymous".into(),
                elevated: false,
            },
        }
    }
}

pub fn is_admin_path(path: &str) -> bool {
    path == ADMIN_PREFIX
        || path
            .strip_prefix(ADMIN_PREFIX)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn is_public_admin_path(path: &str) -> bool {
    let path = match path.strip_suffix('/') {
        Some(p) if !p.is_empty() => p,
        _ => path,
    };
    PUBLIC_ADMIN_PATHS.contains(&path)
        || PUBLIC_ADMIN_PREFIXES
            .iter()
            .any(|p| path.len() > p.len() && path.starts_with(p))
}

/// Bearer wins; `X-Admin-Token` is consulted only without a Bearer credential.
fn presented_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, rest) = v.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| rest.trim())
        })
        .filter(|t| !t.is_empty());
    bearer.or_else(|| {
        headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    })
}

/// Byte comparison that does not short-circuit on the first difference.
fn tokens_match(presented: &str, secret: &str) -> bool {
    let (a, b) = (presented.as_bytes(), secret.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn authorize(
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    config: &AccessConfig,
) -> AccessDecision {
    if *method == Method::OPTIONS {
        return AccessDecision::Allow(Grant::Preflight);
    }
    if config.disabled {
        return AccessDecision::Allow(Grant::GateDisabled);
    }
    if is_public_admin_path(path) {
        return AccessDecision::Allow(Grant::PublicAdminPath);
    }
    if !is_admin_path(path) {
        return AccessDecision::Allow(Grant::NotGuarded);
    }
    let Some(secret) = config.secret.as_deref() else {
        return AccessDecision::Deny(DenyReason::SecretNotConfigured);
    };
    match presented_token(headers) {
        None => AccessDecision::Deny(DenyReason::MissingToken),
        Some(token) if tokens_match(token, secret) => AccessDecision::Allow(Grant::Token),
        Some(_) => AccessDecision::Deny(DenyReason::TokenMismatch),
    }
}

/// 401 with CORS headers echoing the caller's origin, so browsers can read it.
pub fn unauthorized_response(origin: Option<&HeaderValue>) -> Response {
    let body = serde_json::json!({
        "error": "Unauthorized",
        "message": "Valid admin token required",
    });
    let mut resp = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    if let Some(origin) = origin {
        let headers = resp.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(header::VARY, HeaderValue::from_static("origin"));
    }
    resp
}

/// Axum middleware applying [`authorize`] to every request.
pub async fn admin_gate(
    State(config): State<Arc<AccessConfig>>,
    mut req: Request,
    next: Next,
) -> Response {
    match authorize(req.method(), req.uri().path(), req.headers(), &config) {
        AccessDecision::Allow(grant) => {
            req.extensions_mut().insert(AdminPrincipal::from_grant(grant));
            next.run(req).await
        }
        AccessDecision::Deny(reason) => {
            tracing::warn!(
                method = %req.method(),
                path = %req.uri().path(),
                %reason,
                "admin request denied"
            );
            unauthorized_response(req.headers().get(header::ORIGIN))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.insert(*k, HeaderValue::from_static(v));
        }
        h
    }

    fn check(
        method: Method,
        path: &str,
        h: &[(&'static str, &'static str)],
        c: &AccessConfig,
    ) -> AccessDecision {
        authorize(&method, path, &headers(h), c)
    }

    #[test]
    fn preflight_is_always_allowed() {
        let c = AccessConfig::default();
        assert_eq!(
            check(Method::OPTIONS, "/api/admin/reset", &[], &c),
            AccessDecision::Allow(Grant::Preflight)
        );
    }

    #[test]
    fn disabled_gate_allows_everything() {
        assert_eq!(
            check(Method::POST, "/api/admin/reset", &[], &AccessConfig::disabled()),
            AccessDecision::Allow(Grant::GateDisabled)
        );
    }

    #[test]
    fn public_admin_paths_need_no_token() {
        let c = AccessConfig::with_secret("s3cret");
        for path in [
            "/api/admin/reset/status",
            "/api/admin/reset/audit",
            "/api/admin/reset/audit/",
            "/api/admin/reset/stream/abc",
        ] {
            assert_eq!(
                check(Method::GET, path, &[], &c),
                AccessDecision::Allow(Grant::PublicAdminPath),
                "{path}"
            );
        }
        assert_eq!(
            check(Method::GET, "/api/admin/reset/stream/", &[], &c),
            AccessDecision::Deny(DenyReason::MissingToken)
        );
    }

    #[test]
    fn non_admin_paths_pass() {
        let c = AccessConfig::with_secret("s3cret");
        assert_eq!(
            check(Method::GET, "/health", &[], &c),
            AccessDecision::Allow(Grant::NotGuarded)
        );
        assert_eq!(
            check(Method::GET, "/api/administrator", &[], &c),
            AccessDecision::Allow(Grant::NotGuarded)
        );
    }

    #[test]
    fn empty_secret_denies_even_with_a_token() {
        let c = AccessConfig::new(Some("  ".into()), false);
        assert_eq!(
            check(Method::POST, "/api/admin/reset", &[("authorization", "Bearer ")], &c),
            AccessDecision::Deny(DenyReason::SecretNotConfigured)
        );
        assert_eq!(
            check(Method::POST, "/api/admin/reset", &[("x-admin-token", "anything")], &c),
            AccessDecision::Deny(DenyReason::SecretNotConfigured)
        );
    }

    #[test]
    fn bearer_and_header_tokens_are_accepted() {
        let c = AccessConfig::with_secret("s3cret");
        assert_eq!(
            check(Method::POST, "/api/admin/reset", &[("authorization", "Bearer  s3cret ")], &c),
            AccessDecision::Allow(Grant::Token)
        );
        assert_eq!(
            check(Method::POST, "/api/admin/reset", &[("x-admin-token", "s3cret")], &c),
            AccessDecision::Allow(Grant::Token)
        );
    }

    #[test]
    fn bearer_takes_precedence_over_header() {
        let c = AccessConfig::with_secret("s3cret");
        assert_eq!(
            check(
                Method::POST,
                "/api/admin/reset",
                &[("authorization", "Bearer wrong"), ("x-admin-token", "s3cret")],
                &c
            ),
            AccessDecision::Deny(DenyReason::TokenMismatch)
        );
        // A non-Bearer Authorization header does not shadow X-Admin-Token.
        assert_eq!(
            check(
                Method::POST,
                "/api/admin/reset",
                &[("authorization", "Basic Zm9vOmJhcg=="), ("x-admin-token", "s3cret")],
                &c
            ),
            AccessDecision::Allow(Grant::Token)
        );
    }

    #[test]
    fn comparison_is_exact() {
        let c = AccessConfig::with_secret("s3cret");
        for wrong in ["S3CRET", "s3cre", "s3cret2"] {
            let mut h = HeaderMap::new();
            h.insert(ADMIN_TOKEN_HEADER, HeaderValue::from_str(wrong).unwrap());
            assert_eq!(
                authorize(&Method::POST, "/api/admin/reset", &h, &c),
                AccessDecision::Deny(DenyReason::TokenMismatch)
            );
        }
        assert_eq!(
            check(Method::POST, "/api/admin/reset", &[], &c),
            AccessDecision::Deny(DenyReason::MissingToken)
        );
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let rendered = format!("{:?}", AccessConfig::with_secret("s3cret"));
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn unauthorized_echoes_origin() {
        let origin = HeaderValue::from_static("https://portfolio.example");
        let resp = unauthorized_response(Some(&origin));
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://portfolio.example"
        );
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert!(unauthorized_response(None)
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}
