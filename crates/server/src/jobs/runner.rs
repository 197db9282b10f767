// crates/server/src/jobs/runner.rs
//! Spawns and drives one background execution per submitted task.
//!
//! The submission path registers a pending task, spawns a detached
//! tokio task, and returns immediately; everything after that is
//! visible only through the registry. The spawned unit owns the task's
//! fields while it is processing and is the only writer of its terminal
//! transition (the background monitor abstains once terminal).

use std::path::PathBuf;
use std::sync::Arc;

use bioflow_core::{archive, JobError, TaskState};
use bioflow_types::{JobKind, TaskId};

use crate::jobs::{monitor::OutputMonitor, Job, JobContext, JobOutcome};
use crate::state::AppState;

/// Register a new task for `kind` over the already-persisted input
/// files and start its background execution. The caller allocates
/// `task_id` because the uploaded inputs are stored under an id-named
/// directory before the task exists. Returns as soon as the execution
/// is spawned.
pub fn submit(
    state: &Arc<AppState>,
    kind: JobKind,
    task_id: TaskId,
    input_files: Vec<PathBuf>,
) -> TaskId {
    let filenames: Vec<String> = input_files
        .iter()
        .map(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .collect();

    let task = state
        .registry
        .create(TaskState::new(task_id, kind, filenames));

    let ctx = JobContext {
        task: Arc::clone(&task),
        config: Arc::clone(&state.config),
        input_files,
        output_dir: state.config.task_output_dir(kind, task_id),
    };

    // Jobs that block on an external process get a secondary observer
    // estimating progress from output files appearing on disk.
    if let Some(monitor_config) = &state.config.job(kind).monitor {
        OutputMonitor::new(
            Arc::clone(&task),
            ctx.output_dir.clone(),
            monitor_config.clone(),
            ctx.input_files.len() as u64,
        )
        .spawn();
    }

    // Detached: no handle retained, no ordering assumed. The only
    // externally observable effect is registry writes.
    tokio::spawn(run_task(ctx, kind));

    task_id
}

/// Drive one task from `pending` to a terminal state. Never panics the
/// spawn; every fault lands on the task record instead.
async fn run_task(ctx: JobContext, kind: JobKind) {
    let task = Arc::clone(&ctx.task);
    let task_id = task.id();

    task.start(format!("starting {kind} analysis"));
    tracing::info!(task_id = %task_id, job_kind = %kind, files = ctx.input_files.len(), "Task started");

    let result = match kind {
        JobKind::TextStats => crate::jobs::text_stats::TextStatsJob.execute(&ctx).await,
        JobKind::Rnafold => crate::jobs::rnafold::RnafoldJob.execute(&ctx).await,
        JobKind::Structure => crate::jobs::structure::StructureJob.execute(&ctx).await,
    };

    match result {
        Ok(outcome) => finalize(&ctx, kind, outcome).await,
        Err(err) => {
            tracing::warn!(task_id = %task_id, job_kind = %kind, error = %err, "Task failed");
            task.fail(format!("{kind} analysis failed: {err}"), err.detail());
        }
    }
}

/// Archive the output directory and record completion. An archive
/// failure degrades the whole task to `error`: results a client cannot
/// download are not results.
async fn finalize(ctx: &JobContext, kind: JobKind, outcome: JobOutcome) {
    let task = &ctx.task;
    let task_id = task.id();
    task.update_progress(95, "creating result archive");

    let artifact = ctx.config.artifact_path(kind, task_id);
    let policy = ctx.config.job(kind).archive.clone();
    let output_dir = ctx.output_dir.clone();
    let dest = artifact.clone();

    let archived = tokio::task::spawn_blocking(move || {
        archive::build_archive(&output_dir, &dest, &policy)
    })
    .await;

    match archived {
        Ok(Ok(entries)) => {
            let download_url = format!("/api/download/{task_id}");
            task.complete(artifact, download_url, outcome.message);
            tracing::info!(task_id = %task_id, job_kind = %kind, entries, "Task completed");
        }
        Ok(Err(err)) => {
            tracing::warn!(task_id = %task_id, error = %err, "Archive step failed");
            let err = JobError::from(err);
            task.fail(format!("{kind} analysis failed: {err}"), err.detail());
        }
        Err(join_err) => {
            tracing::error!(task_id = %task_id, error = %join_err, "Archive task panicked");
            task.fail(
                format!("{kind} analysis failed while archiving results"),
                join_err.to_string(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bioflow_core::AppConfig;
    use bioflow_types::TaskStatus;
    use std::time::Duration;
    use uuid::Uuid;

    async fn wait_terminal(state: &Arc<AppState>, id: TaskId) -> TaskStatus {
        for _ in 0..200 {
            if let Some(snap) = state.registry.snapshot(id) {
                if snap.status.is_terminal() {
                    return snap.status;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {id} never reached a terminal state");
    }

    fn test_state() -> (tempfile::TempDir, Arc<AppState>) {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = AppConfig::new(tmp.path());
        config.ensure_dirs().unwrap();
        (tmp, AppState::new(config))
    }

    #[tokio::test]
    async fn test_submit_returns_pending_before_work_finishes() {
        let (_tmp, state) = test_state();
        let dir = state.config.upload_dir(JobKind::TextStats).join("stage");
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("a.txt");
        std::fs::write(&input, "hello world\nsecond line\n").unwrap();

        let id = submit(&state, JobKind::TextStats, Uuid::new_v4(), vec![input]);
        // Submission never blocks on the job; the entry exists at once.
        let snap = state.registry.snapshot(id).expect("task registered");
        assert!(matches!(
            snap.status,
            TaskStatus::Pending | TaskStatus::Processing | TaskStatus::Completed
        ));

        assert_eq!(wait_terminal(&state, id).await, TaskStatus::Completed);
        let snap = state.registry.snapshot(id).unwrap();
        assert_eq!(snap.progress, 100);
        assert!(snap.download_url.is_some());
        assert!(state
            .config
            .artifact_path(JobKind::TextStats, id)
            .is_file());
    }

    #[tokio::test]
    async fn test_missing_input_fails_task_without_archive() {
        let (_tmp, state) = test_state();
        let id = submit(
            &state,
            JobKind::TextStats,
            Uuid::new_v4(),
            vec![PathBuf::from("/nonexistent/input.txt")],
        );

        assert_eq!(wait_terminal(&state, id).await, TaskStatus::Error);
        let snap = state.registry.snapshot(id).unwrap();
        assert!(snap.error_detail.is_some());
        assert!(snap.download_url.is_none());
        assert!(!state.config.artifact_path(JobKind::TextStats, id).exists());
    }

    #[tokio::test]
    async fn test_progress_trajectory_through_band() {
        let (_tmp, state) = test_state();
        let dir = state.config.upload_dir(JobKind::TextStats).join("stage");
        std::fs::create_dir_all(&dir).unwrap();
        let mut inputs = Vec::new();
        for i in 0..3 {
            let path = dir.join(format!("f{i}.txt"));
            std::fs::write(&path, format!("file number {i}\n")).unwrap();
            inputs.push(path);
        }

        let id = submit(&state, JobKind::TextStats, Uuid::new_v4(), inputs);
        assert_eq!(wait_terminal(&state, id).await, TaskStatus::Completed);
        assert_eq!(state.registry.snapshot(id).unwrap().progress, 100);
    }
}
