// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use bioflow_types::TaskId;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Unknown job kind: {0}")]
    UnknownJobKind(String),

    /// Submission rejected before a task was created.
    #[error("Invalid upload: {0}")]
    Validation(String),

    /// The task exists but its artifact cannot be served yet: either it
    /// has not completed, or the recorded archive is missing from disk.
    #[error("Result not ready for task {0}")]
    NotReady(TaskId),

    /// The task exists but has no run log on disk (only
    /// external-process jobs produce one).
    #[error("No run log for task {0}")]
    LogNotFound(TaskId),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::TaskNotFound(id) => {
                tracing::warn!(task_id = %id, "Task not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Task not found", format!("Task ID: {}", id)),
                )
            }
            ApiError::UnknownJobKind(kind) => {
                tracing::warn!(job_kind = %kind, "Unknown job kind");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Unknown job kind", kind.clone()),
                )
            }
            ApiError::Validation(msg) => {
                tracing::warn!(message = %msg, "Upload rejected");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Invalid upload", msg.clone()),
                )
            }
            ApiError::NotReady(id) => {
                tracing::debug!(task_id = %id, "Download requested before result ready");
                (
                    StatusCode::CONFLICT,
                    ErrorResponse::with_details(
                        "Result not ready",
                        format!("Task {} has no downloadable archive yet", id),
                    ),
                )
            }
            ApiError::LogNotFound(id) => {
                tracing::debug!(task_id = %id, "Run log not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details(
                        "Run log not found",
                        format!("Task {} has no run log", id),
                    ),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
