//! Error types for the alias service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use email_routing_client::RoutingError;
use kv_store::KvError;
use serde::Serialize;
use thiserror::Error;

/// Alias service error types.
#[derive(Debug, Error)]
pub enum AliasError {
    #[error("Prefix may only contain lowercase letters, digits and hyphens")]
    InvalidPrefix,

    #[error("Invalid target email format")]
    InvalidTargetEmail,

    #[error("Email type must be temporary or permanent")]
    InvalidEmailType,

    #[error("Failed to create forwarding rule: {0}")]
    RuleRejected(String),

    #[error("Not Found")]
    NotFound,

    #[error("Server error: {0}")]
    MalformedBody(String),

    #[error("Server error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Server error: {0}")]
    Store(#[from] KvError),
}

impl AliasError {
    /// HTTP status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AliasError::InvalidPrefix => (StatusCode::BAD_REQUEST, "INVALID_PREFIX"),
            AliasError::InvalidTargetEmail => (StatusCode::BAD_REQUEST, "INVALID_TARGET_EMAIL"),
            AliasError::InvalidEmailType => (StatusCode::BAD_REQUEST, "INVALID_EMAIL_TYPE"),
            AliasError::RuleRejected(_) => (StatusCode::INTERNAL_SERVER_ERROR, "RULE_REJECTED"),
            AliasError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AliasError::MalformedBody(_) => (StatusCode::INTERNAL_SERVER_ERROR, "MALFORMED_BODY"),
            AliasError::Routing(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ROUTING_API_ERROR"),
            AliasError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for AliasError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for AliasError {
    fn from(e: serde_json::Error) -> Self {
        AliasError::MalformedBody(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_client_errors() {
        assert_eq!(
            AliasError::InvalidPrefix.status_and_code().0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AliasError::InvalidTargetEmail.status_and_code().0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AliasError::InvalidEmailType.status_and_code().0,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_rejection_message_embeds_provider_reason() {
        let err = AliasError::RuleRejected("Rule already exists".into());
        assert_eq!(
            err.to_string(),
            "Failed to create forwarding rule: Rule already exists"
        );
        assert_eq!(
            err.status_and_code(),
            (StatusCode::INTERNAL_SERVER_ERROR, "RULE_REJECTED")
        );
    }

    #[test]
    fn test_unexpected_errors_are_server_errors() {
        let err: AliasError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(err.to_string().starts_with("Server error: "));
        assert_eq!(err.status_and_code().0, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
