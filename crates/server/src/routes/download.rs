// crates/server/src/routes/download.rs
//! Result archive download endpoint.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio_util::io::ReaderStream;

use bioflow_types::TaskStatus;

use crate::error::{ApiError, ApiResult};
use crate::routes::status::parse_task_id;
use crate::state::AppState;

/// GET /api/download/{task_id} - Stream the finished result archive.
///
/// Only a completed task has an archive; a pending, processing or
/// failed task answers 409 so pollers can distinguish "not yet" from
/// "no such task". The archive is streamed, never buffered whole.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<Response> {
    let task_id = parse_task_id(&task_id)?;
    let task = state
        .registry
        .get(task_id)
        .ok_or(ApiError::TaskNotFound(task_id))?;

    if task.status() != TaskStatus::Completed {
        return Err(ApiError::NotReady(task_id));
    }
    let artifact = task.artifact_path().ok_or(ApiError::NotReady(task_id))?;

    // Completed tasks record the artifact before the transition, so a
    // missing file means it was removed out-of-band.
    let file = match tokio::fs::File::open(&artifact).await {
        Ok(file) => file,
        Err(err) => {
            tracing::error!(task_id = %task_id, path = %artifact.display(), error = %err, "Recorded archive missing from disk");
            return Err(ApiError::NotReady(task_id));
        }
    };
    let len = file.metadata().await.ok().map(|m| m.len());

    let filename = format!("{}_results_{task_id}.zip", task.kind());
    let mut response = Response::builder()
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        );
    if let Some(len) = len {
        response = response.header(header::CONTENT_LENGTH, len);
    }

    response
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::Internal(format!("building download response: {e}")))
        .map(IntoResponse::into_response)
}

/// Create the download routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/download/{task_id}", get(download))
}
