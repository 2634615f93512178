//! Error types and HTTP status mapping
//!
//! Every sub-component surfaces failures as an [`ApiError`] kind and the kind
//! travels unmodified to the HTTP layer; `status_code()` is the single place
//! where kinds become transport statuses.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// Bridge error with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("invalid token signature: {message}")]
    InvalidSignature { message: String },

    #[error("identity token has expired")]
    ExpiredToken,

    #[error("audience mismatch: {message}")]
    AudienceMismatch { message: String },

    #[error("issuer mismatch: {message}")]
    IssuerMismatch { message: String },

    #[error("malformed token: {message}")]
    MalformedToken { message: String },

    #[error("identity mismatch: {message}")]
    IdentityMismatch { message: String },

    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("identity provider unavailable: {message}")]
    UpstreamUnavailable { message: String },

    #[error("identity provider rejected the request (HTTP {status}): {message}")]
    UpstreamRejected { status: u16, message: String },

    #[error("malformed identity provider response: {message}")]
    MalformedUpstreamResponse { message: String },

    #[error("account store error: {message}")]
    Repository { message: String },

    #[error("partial update: {message}")]
    PartialUpdate { message: String },

    #[error("session signing unavailable: {message}")]
    SigningUnavailable { message: String },
}

impl ApiError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn invalid_signature(message: impl Into<String>) -> Self {
        Self::InvalidSignature {
            message: message.into(),
        }
    }

    pub fn audience_mismatch(message: impl Into<String>) -> Self {
        Self::AudienceMismatch {
            message: message.into(),
        }
    }

    pub fn issuer_mismatch(message: impl Into<String>) -> Self {
        Self::IssuerMismatch {
            message: message.into(),
        }
    }

    pub fn malformed_token(message: impl Into<String>) -> Self {
        Self::MalformedToken {
            message: message.into(),
        }
    }

    pub fn identity_mismatch(message: impl Into<String>) -> Self {
        Self::IdentityMismatch {
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
        }
    }

    pub fn upstream_rejected(status: u16, message: impl Into<String>) -> Self {
        Self::UpstreamRejected {
            status,
            message: message.into(),
        }
    }

    pub fn malformed_upstream_response(message: impl Into<String>) -> Self {
        Self::MalformedUpstreamResponse {
            message: message.into(),
        }
    }

    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
        }
    }

    pub fn partial_update(message: impl Into<String>) -> Self {
        Self::PartialUpdate {
            message: message.into(),
        }
    }

    pub fn signing_unavailable(message: impl Into<String>) -> Self {
        Self::SigningUnavailable {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest { .. } => 400,
            Self::InvalidSignature { .. } => 401,
            Self::ExpiredToken => 401,
            Self::AudienceMismatch { .. } => 401,
            Self::IssuerMismatch { .. } => 401,
            Self::MalformedToken { .. } => 401,
            Self::IdentityMismatch { .. } => 401,
            Self::PermissionDenied { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::Configuration { .. } => 500,
            Self::UpstreamUnavailable { .. } => 500,
            Self::UpstreamRejected { .. } => 500,
            Self::MalformedUpstreamResponse { .. } => 500,
            Self::Repository { .. } => 500,
            Self::PartialUpdate { .. } => 500,
            Self::SigningUnavailable { .. } => 500,
        }
    }

    /// Get the error key for this error
    pub fn error_key(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidSignature { .. } => "invalid_signature",
            Self::ExpiredToken => "expired_token",
            Self::AudienceMismatch { .. } => "audience_mismatch",
            Self::IssuerMismatch { .. } => "issuer_mismatch",
            Self::MalformedToken { .. } => "malformed_token",
            Self::IdentityMismatch { .. } => "identity_mismatch",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::NotFound { .. } => "not_found",
            Self::Configuration { .. } => "configuration_error",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::UpstreamRejected { .. } => "upstream_rejected",
            Self::MalformedUpstreamResponse { .. } => "malformed_upstream_response",
            Self::Repository { .. } => "repository_error",
            Self::PartialUpdate { .. } => "partial_update_failure",
            Self::SigningUnavailable { .. } => "signing_unavailable",
        }
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self {
            error: err.error_key().to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_failures_map_to_401() {
        for err in [
            ApiError::invalid_signature("x"),
            ApiError::ExpiredToken,
            ApiError::audience_mismatch("x"),
            ApiError::issuer_mismatch("x"),
            ApiError::malformed_token("x"),
            ApiError::identity_mismatch("x"),
        ] {
            assert_eq!(err.status_code(), 401, "{}", err.error_key());
        }
    }

    #[test]
    fn infrastructure_failures_map_to_500() {
        for err in [
            ApiError::configuration("x"),
            ApiError::upstream_unavailable("x"),
            ApiError::upstream_rejected(503, "x"),
            ApiError::malformed_upstream_response("x"),
            ApiError::repository("x"),
            ApiError::partial_update("x"),
            ApiError::signing_unavailable("x"),
        ] {
            assert_eq!(err.status_code(), 500, "{}", err.error_key());
        }
    }

    #[test]
    fn error_response_carries_key_and_message() {
        let err = ApiError::upstream_rejected(400, "bad code");
        let body = ErrorResponse::from(&err);
        assert_eq!(body.error, "upstream_rejected");
        assert!(body.message.contains("HTTP 400"));
    }
}
