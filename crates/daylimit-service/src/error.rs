//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<daylimit_store::StoreError> for ApiError {
    fn from(err: daylimit_store::StoreError) -> Self {
        match err {
            daylimit_store::StoreError::InvalidMonth { year, month } => {
                Self::BadRequest(format!("invalid month: {year}-{month:02}"))
            }
            daylimit_store::StoreError::Database(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<daylimit_engine::EngineError> for ApiError {
    fn from(err: daylimit_engine::EngineError) -> Self {
        match err {
            daylimit_engine::EngineError::Store(e) => e.into(),
            daylimit_engine::EngineError::Cache(e) => Self::Internal(e.to_string()),
        }
    }
}
