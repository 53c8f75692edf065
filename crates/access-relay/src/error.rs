//! Client-facing outcomes of a rejected or failed relay request.
//!
//! Components below the relay report plain values and storage errors; only
//! the relay maps them onto these variants, and only these variants are ever
//! rendered to clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("proof verification failed")]
    InvalidProof,

    #[error("malformed public signals: {0}")]
    MalformedSignals(String),

    #[error("missing endpoint hash")]
    MissingEndpoint,

    #[error("unknown endpoint hash")]
    UnknownEndpoint,

    #[error("endpoint not allowed")]
    EndpointNotAllowed,

    #[error("replay detected: nullifier already used")]
    ReplayDetected,

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Stable machine-readable reason code
    pub fn reason(&self) -> &'static str {
        match self {
            RelayError::InvalidRequest(_) => "invalid_request",
            RelayError::InvalidProof => "invalid_proof",
            RelayError::MalformedSignals(_) => "malformed_signals",
            RelayError::MissingEndpoint => "missing_endpoint",
            RelayError::UnknownEndpoint => "unknown_endpoint",
            RelayError::EndpointNotAllowed => "endpoint_not_allowed",
            RelayError::ReplayDetected => "replay_detected",
            RelayError::Upstream(_) => "upstream_error",
            RelayError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidRequest(_)
            | RelayError::MalformedSignals(_)
            | RelayError::MissingEndpoint => StatusCode::BAD_REQUEST,
            RelayError::InvalidProof
            | RelayError::UnknownEndpoint
            | RelayError::EndpointNotAllowed => StatusCode::FORBIDDEN,
            RelayError::ReplayDetected => StatusCode::CONFLICT,
            RelayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            RelayError::InvalidRequest(d)
            | RelayError::MalformedSignals(d)
            | RelayError::Upstream(d)
            | RelayError::Internal(d) => Some(d.clone()),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.reason(),
            details: self.details(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(RelayError::InvalidProof.status(), StatusCode::FORBIDDEN);
        assert_eq!(RelayError::EndpointNotAllowed.status(), StatusCode::FORBIDDEN);
        assert_eq!(RelayError::MissingEndpoint.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RelayError::MalformedSignals("short".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(RelayError::ReplayDetected.status(), StatusCode::CONFLICT);
        assert_eq!(RelayError::Upstream("x".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            RelayError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_reason_codes() {
        assert_eq!(RelayError::ReplayDetected.reason(), "replay_detected");
        assert_eq!(RelayError::MissingEndpoint.reason(), "missing_endpoint");
        assert_eq!(RelayError::UnknownEndpoint.reason(), "unknown_endpoint");
    }
}
