// crates/server/src/routes/upload.rs
//! Multipart upload endpoint that creates and starts analysis tasks.
//!
//! Validation happens entirely before a task exists: every file must
//! carry an extension the job kind accepts and fit under its size
//! limit, or the whole submission is rejected and nothing is kept.
//! Once all inputs are persisted the handler registers the task,
//! spawns its background execution and returns a receipt immediately;
//! it never waits for any processing.

use std::path::Path as FsPath;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    routing::post,
    Json, Router,
};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use bioflow_types::{JobKind, SubmissionReceipt, UnknownJobKind};

use crate::error::{ApiError, ApiResult};
use crate::jobs;
use crate::state::AppState;

/// POST /api/upload/{job_kind} - Submit a batch of files for analysis.
///
/// Accepts any number of multipart file fields. Responds with the task
/// id and a status URL to poll; the analysis itself runs detached.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Path(job_kind): Path<String>,
    multipart: Multipart,
) -> ApiResult<Json<SubmissionReceipt>> {
    let kind: JobKind = job_kind
        .parse()
        .map_err(|UnknownJobKind(k)| ApiError::UnknownJobKind(k))?;

    let task_id = Uuid::new_v4();
    let upload_dir = state.config.task_upload_dir(kind, task_id);

    let saved = match persist_uploads(&state, kind, &upload_dir, multipart).await {
        Ok(saved) => saved,
        Err(err) => {
            // Reject the submission whole; partial inputs are not kept.
            let _ = tokio::fs::remove_dir_all(&upload_dir).await;
            return Err(err);
        }
    };

    if saved.is_empty() {
        return Err(ApiError::Validation(
            "no files in upload".to_string(),
        ));
    }

    let file_count = saved.len();
    tracing::info!(task_id = %task_id, job_kind = %kind, files = file_count, "Upload accepted");
    jobs::submit(&state, kind, task_id, saved);

    Ok(Json(SubmissionReceipt {
        task_id,
        job_kind: kind,
        file_count,
        message: format!("{kind} analysis started for {file_count} files"),
        status_url: format!("/api/status/{task_id}"),
    }))
}

/// Validate every part against the kind's file policy and write it
/// under the task's upload directory. Fails on the first bad part.
///
/// Parts are streamed chunk-by-chunk to disk with a running size
/// check, so an oversized upload is rejected after one chunk past the
/// limit instead of being buffered whole in memory first.
async fn persist_uploads(
    state: &AppState,
    kind: JobKind,
    upload_dir: &FsPath,
    mut multipart: Multipart,
) -> ApiResult<Vec<PathBuf>> {
    let policy = state.config.job(kind);
    let mut saved = Vec::new();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
    {
        // Parts without a filename (plain form values) are ignored.
        let Some(original) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let filename = sanitize_filename(&original)?;

        if !policy.accepts(&filename) {
            return Err(ApiError::Validation(format!(
                "file type not allowed for {kind}: {filename} (allowed: {})",
                policy.allowed_extensions.join(", ")
            )));
        }

        tokio::fs::create_dir_all(upload_dir)
            .await
            .map_err(|e| ApiError::Internal(format!("creating upload dir: {e}")))?;
        let dest = upload_dir.join(&filename);
        let mut out = tokio::fs::File::create(&dest)
            .await
            .map_err(|e| ApiError::Internal(format!("creating {filename}: {e}")))?;

        let mut written: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::Validation(format!("failed reading {filename}: {e}")))?
        {
            written += chunk.len() as u64;
            if written > policy.max_size_bytes {
                return Err(ApiError::Validation(format!(
                    "file too large: {filename} (limit {} bytes)",
                    policy.max_size_bytes
                )));
            }
            out.write_all(&chunk)
                .await
                .map_err(|e| ApiError::Internal(format!("writing {filename}: {e}")))?;
        }
        out.flush()
            .await
            .map_err(|e| ApiError::Internal(format!("writing {filename}: {e}")))?;
        saved.push(dest);
    }

    Ok(saved)
}

/// Reduce a client-supplied filename to a bare file name. Path
/// components are stripped rather than rejected; a name that reduces
/// to nothing is invalid.
fn sanitize_filename(original: &str) -> ApiResult<String> {
    let name = FsPath::new(original)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." {
        return Err(ApiError::Validation(format!(
            "invalid filename: {original:?}"
        )));
    }
    Ok(name)
}

/// Create the upload routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/upload/{job_kind}", post(upload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_path_components() {
        assert_eq!(sanitize_filename("reads.fasta").unwrap(), "reads.fasta");
        assert_eq!(
            sanitize_filename("../../etc/passwd.txt").unwrap(),
            "passwd.txt"
        );
        assert_eq!(sanitize_filename("/abs/path/a.json").unwrap(), "a.json");
    }

    #[test]
    fn test_sanitize_rejects_empty_and_dots() {
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("dir/").is_err());
    }
}
