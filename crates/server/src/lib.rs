// crates/server/src/lib.rs
//! Bioflow server library.
//!
//! This crate provides the Axum-based HTTP server for batch file
//! analysis: clients upload a set of files for a job kind, poll the
//! resulting task until it completes, and download the zipped results.
//! All task state is in-memory; the filesystem holds only inputs,
//! outputs and archives.

pub mod error;
pub mod jobs;
pub mod routes;
pub mod state;

pub use error::*;
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use bioflow_types::JobKind;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, upload, status, download, logs)
/// - a body limit sized to the largest per-kind upload limit
/// - CORS for development (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    // The framework-level limit only has to let the largest legal
    // upload through; per-kind limits are enforced in the handler.
    let body_limit = JobKind::ALL
        .iter()
        .map(|kind| state.config.job(*kind).max_size_bytes)
        .max()
        .unwrap_or(0) as usize
        + 1024 * 1024;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Integration Tests
// ============================================================================
