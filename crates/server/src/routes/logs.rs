// crates/server/src/routes/logs.rs
//! Plain-text execution log endpoint.
//!
//! Logs are looked up through the registry, so only ids that name a
//! registered task can reach the filesystem at all; the path served is
//! derived from the task record, never from client input.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::error::{ApiError, ApiResult};
use crate::jobs::{monitor::PROGRESS_LOG, structure::RUN_LOG};
use crate::routes::status::parse_task_id;
use crate::state::AppState;

/// GET /api/tasks/{task_id}/log - The task's execution log as text.
///
/// External-process tasks produce a `run.log` with the tool's combined
/// output; monitor-driven tasks additionally append a `progress.log`.
/// The run log wins when both exist.
pub async fn get_log(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<Response> {
    let task_id = parse_task_id(&task_id)?;
    let task = state
        .registry
        .get(task_id)
        .ok_or(ApiError::TaskNotFound(task_id))?;

    let output_dir = state.config.task_output_dir(task.kind(), task_id);
    for name in [RUN_LOG, PROGRESS_LOG] {
        let path = output_dir.join(name);
        if let Ok(contents) = tokio::fs::read_to_string(&path).await {
            return Ok((
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                contents,
            )
                .into_response());
        }
    }
    Err(ApiError::LogNotFound(task_id))
}

/// Create the log routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/tasks/{task_id}/log", get(get_log))
}
