//! Error types for the HTTP boundary
//!
//! Generation failures and persistence failures map to distinct codes so a
//! client can tell "not generated" from "generated but not saved".

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::{PersistenceError, PipelineError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// No usable credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Generation ended without an article (500)
    #[error("{0}")]
    Generation(#[from] PipelineError),

    /// Document store or credential failure (502)
    #[error("{0}")]
    Persistence(#[from] PersistenceError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// redactor-common error
    #[error("Common error: {0}")]
    Common(#[from] redactor_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut stage = None;
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Generation(ref err) => {
                stage = err.failure_reason().map(|r| r.stage().number());
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "GENERATION_FAILED",
                    err.to_string(),
                )
            }
            ApiError::Persistence(PersistenceError::NotConnected) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                PersistenceError::NotConnected.to_string(),
            ),
            ApiError::Persistence(ref err) => {
                (StatusCode::BAD_GATEWAY, "PERSISTENCE_FAILED", err.to_string())
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(redactor_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
        };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let Some(stage) = stage {
            error["stage"] = json!(stage);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
