// crates/server/src/routes/status.rs
//! Task status polling and listing endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use bioflow_types::{TaskId, TaskListEntry, TaskSnapshot};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/status/{task_id} - Point-in-time snapshot of one task.
///
/// The snapshot a poller sees is always internally consistent with the
/// lifecycle: progress never decreases between polls, and a terminal
/// status never changes again.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskSnapshot>> {
    let task_id = parse_task_id(&task_id)?;
    state
        .registry
        .snapshot(task_id)
        .map(Json)
        .ok_or(ApiError::TaskNotFound(task_id))
}

/// GET /api/tasks - Lightweight listing of every task, newest first.
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<TaskListEntry>> {
    Json(state.registry.list())
}

/// A path segment that is not a UUID can never name a task.
pub(crate) fn parse_task_id(raw: &str) -> ApiResult<TaskId> {
    raw.parse()
        .map_err(|_| ApiError::Validation(format!("invalid task id: {raw}")))
}

/// Create the status routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status/{task_id}", get(get_status))
        .route("/tasks", get(list_tasks))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_id() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(parse_task_id(&id.to_string()).unwrap(), id);
        assert!(matches!(
            parse_task_id("not-a-uuid"),
            Err(ApiError::Validation(_))
        ));
    }
}
