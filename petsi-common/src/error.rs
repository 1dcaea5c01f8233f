//! Error types for the PETSI gateway.

use thiserror::Error;

/// Result type alias using the gateway error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the gateway.
///
/// Everything that goes wrong while talking to the upstream webhook service
/// collapses into [`Error::Upstream`], which always maps to a 500. The other
/// variants are raised locally, before any outbound call.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing, malformed, or expired bearer token
    #[error("{0}")]
    Unauthorized(String),

    /// Rejected credentials or otherwise bad input (e.g. oversize upload)
    #[error("{0}")]
    BadRequest(String),

    /// Request parameters failed boundary validation
    #[error("{0}")]
    Validation(String),

    /// Transport, timeout, non-2xx, or decode failure talking to the upstream
    #[error("{0}")]
    Upstream(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Check if this error came from the upstream service.
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }

    /// Get HTTP status code for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized(_) => 401,
            Self::BadRequest(_) => 400,
            Self::Validation(_) => 422,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(Error::Unauthorized("test".into()).status_code(), 401);
        assert_eq!(Error::BadRequest("test".into()).status_code(), 400);
        assert_eq!(Error::Validation("test".into()).status_code(), 422);
        assert_eq!(Error::Upstream("test".into()).status_code(), 500);
        assert_eq!(Error::Internal("test".into()).status_code(), 500);
    }

    #[test]
    fn test_upstream_message_is_verbatim() {
        let err = Error::Upstream("connection refused".into());
        assert!(err.is_upstream());
        assert_eq!(err.to_string(), "connection refused");
    }
}
