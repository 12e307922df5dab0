use thiserror::Error;

#[derive(Debug, Error)]
pub enum FolioError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl FolioError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidArgument(_) => 400,
            Self::InvalidState(_) => 409,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Unauthorized(_) => 401,
            Self::Internal(_) => 500,
        }
    }

    /// Short machine-readable kind used as the `error` field of HTTP bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::InvalidState(_) => "InvalidState",
            Self::NotFound(_) => "NotFound",
            Self::Conflict(_) => "Conflict",
            Self::Unauthorized(_) => "Unauthorized",
            Self::Internal(_) => "Internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── http_status ──────────────────────────────────────────────

    #[test]
    fn http_status_invalid_argument() {
        assert_eq!(FolioError::InvalidArgument("x".into()).http_status(), 400);
    }

    #[test]
    fn http_status_invalid_state() {
        assert_eq!(FolioError::InvalidState("x".into()).http_status(), 409);
    }

    #[test]
    fn http_status_not_found() {
        assert_eq!(FolioError::NotFound("x".into()).http_status(), 404);
    }

    #[test]
    fn http_status_conflict() {
        assert_eq!(FolioError::Conflict("x".into()).http_status(), 409);
    }

    #[test]
    fn http_status_unauthorized() {
        assert_eq!(FolioError::Unauthorized("x".into()).http_status(), 401);
    }

    #[test]
    fn http_status_internal() {
        let err = FolioError::Internal(anyhow::anyhow!("boom"));
        assert_eq!(err.http_status(), 500);
    }

    // ── Display ──────────────────────────────────────────────────

    #[test]
    fn display_invalid_argument() {
        let e = FolioError::InvalidArgument("jobId must not be empty".into());
        assert_eq!(e.to_string(), "invalid argument: jobId must not be empty");
    }

    #[test]
    fn display_invalid_state() {
        let e = FolioError::InvalidState("already COMPLETED".into());
        assert_eq!(e.to_string(), "invalid state: already COMPLETED");
    }

    #[test]
    fn display_internal() {
        let e = FolioError::Internal(anyhow::anyhow!("pool closed"));
        assert_eq!(e.to_string(), "internal: pool closed");
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(FolioError::Conflict("x".into()).kind(), "Conflict");
        assert_eq!(FolioError::Unauthorized("x".into()).kind(), "Unauthorized");
    }
}
