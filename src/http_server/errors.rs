//! HTTP error mapping
//!
//! The only place record errors become status codes. Not-found and invalid
//! input are both 400. Internal failures are logged here and returned with an
//! opaque message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::observability::Event;
use crate::service::RecordError;

/// Result type for handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid id; id must be a positive number")]
    InvalidId,

    #[error("invalid version; version must be a positive number")]
    InvalidVersion,

    #[error("invalid at; must be an RFC3339 timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// Engine-side client error, already worded for the caller.
    #[error("{0}")]
    Rejected(RecordError),

    #[error("request cancelled")]
    Cancelled,

    #[error("internal server error")]
    Internal,
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidId
            | ApiError::InvalidVersion
            | ApiError::InvalidTimestamp(_)
            | ApiError::InvalidBody(_)
            | ApiError::Rejected(_) => StatusCode::BAD_REQUEST,
            ApiError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RecordError> for ApiError {
    fn from(err: RecordError) -> Self {
        if err.is_client_error() {
            return ApiError::Rejected(err);
        }
        match err {
            RecordError::Cancelled => ApiError::Cancelled,
            other => {
                error!(event = %Event::InternalError, error = %other, "request failed");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_bad_request() {
        let errors = [
            ApiError::from(RecordError::RecordNotFound(1)),
            ApiError::from(RecordError::VersionNotFound { id: 1, version: 2 }),
            ApiError::from(RecordError::RecordAlreadyExists(1)),
            ApiError::from(RecordError::InvalidId("id")),
            ApiError::InvalidBody("expected map".into()),
        ];
        for err in errors {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{}", err);
        }
    }

    #[test]
    fn test_internal_message_is_opaque() {
        let err = ApiError::from(RecordError::Internal("disk on fire".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "internal server error");
    }

    #[test]
    fn test_cancelled_is_unavailable() {
        let err = ApiError::from(RecordError::Cancelled);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
