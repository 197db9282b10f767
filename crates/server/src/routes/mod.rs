// crates/server/src/routes/mod.rs
//! API route handlers for the bioflow server.

pub mod download;
pub mod health;
pub mod logs;
pub mod status;
pub mod upload;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health - Health check
/// - POST /api/upload/{job_kind} - Submit files for analysis
/// - GET  /api/status/{task_id} - Poll one task's full snapshot
/// - GET  /api/tasks - List all tasks, newest first
/// - GET  /api/tasks/{task_id}/log - Plain-text execution log
/// - GET  /api/download/{task_id} - Stream the result archive
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", upload::router())
        .nest("/api", status::router())
        .nest("/api", logs::router())
        .nest("/api", download::router())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bioflow_core::AppConfig;

    #[tokio::test]
    async fn test_api_routes_creation() {
        let tmp = tempfile::TempDir::new().unwrap();
        let state = AppState::new(AppConfig::new(tmp.path()));
        let _router = api_routes(state);
    }
}
