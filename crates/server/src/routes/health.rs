// crates/server/src/routes/health.rs
//! Liveness endpoint.
//!
//! Answers from in-memory state only (uptime, registry size, the
//! registered job kinds); it never touches the data directory, so a
//! full disk or wedged external tool cannot make the server look dead.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use bioflow_types::JobKind;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Job kinds this server accepts uploads for.
    pub job_kinds: Vec<String>,
    /// Tasks held in the registry since startup (all states).
    pub tasks_tracked: usize,
}

/// GET /api/health - Liveness check with a summary of what this
/// instance is serving.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        job_kinds: JobKind::ALL.iter().map(|k| k.to_string()).collect(),
        tasks_tracked: state.registry.list().len(),
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}
