// crates/core/src/registry.rs
//! Concurrent task registry with per-entry atomic state.
//!
//! The map-level lock is held only to insert or look up an entry; all
//! mutation happens on the entry itself through atomics (status,
//! progress, output count) or short-lived per-field `RwLock`s, so
//! writers for unrelated tasks never serialize against each other.
//!
//! Write discipline: the runner that created a task owns its fields
//! while it is processing; a background monitor is an occasional
//! secondary writer. Every mutator checks the status first and becomes
//! a no-op once the task is terminal, so a finished task can never be
//! resurrected. Entries are never removed; task state lives for the
//! process lifetime.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use bioflow_types::{JobKind, TaskId, TaskListEntry, TaskSnapshot, TaskStatus};

/// Sentinel for "no output count observed yet".
const OUTPUT_COUNT_UNSET: u64 = u64::MAX;

/// Mutable state of a single task.
pub struct TaskState {
    id: TaskId,
    kind: JobKind,
    filenames: Vec<String>,
    created_at: DateTime<Utc>,
    status: AtomicU8,
    progress: AtomicU8,
    output_count: AtomicU64,
    message: RwLock<String>,
    error_detail: RwLock<Option<String>>,
    artifact_path: RwLock<Option<PathBuf>>,
    download_url: RwLock<Option<String>>,
    started_at: RwLock<Option<DateTime<Utc>>>,
    finished_at: RwLock<Option<DateTime<Utc>>>,
}

impl TaskState {
    pub fn new(id: TaskId, kind: JobKind, filenames: Vec<String>) -> Self {
        Self {
            id,
            kind,
            filenames,
            created_at: Utc::now(),
            status: AtomicU8::new(TaskStatus::Pending as u8),
            progress: AtomicU8::new(0),
            output_count: AtomicU64::new(OUTPUT_COUNT_UNSET),
            message: RwLock::new("waiting to start".to_string()),
            error_detail: RwLock::new(None),
            artifact_path: RwLock::new(None),
            download_url: RwLock::new(None),
            started_at: RwLock::new(None),
            finished_at: RwLock::new(None),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn file_count(&self) -> usize {
        self.filenames.len()
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::Relaxed)
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Path of the finished artifact, if completion recorded one.
    pub fn artifact_path(&self) -> Option<PathBuf> {
        match self.artifact_path.read() {
            Ok(guard) => guard.clone(),
            Err(e) => {
                tracing::error!(task_id = %self.id, "RwLock poisoned reading artifact path: {e}");
                None
            }
        }
    }

    /// Transition `pending → processing`. Returns false if the task was
    /// not pending (already started or already terminal).
    pub fn start(&self, message: impl Into<String>) -> bool {
        let moved = self
            .status
            .compare_exchange(
                TaskStatus::Pending as u8,
                TaskStatus::Processing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if moved {
            self.write_lock_field(&self.started_at, Some(Utc::now()), "started_at");
            self.progress.fetch_max(crate::progress::FLOOR, Ordering::Relaxed);
            self.write_lock_field(&self.message, message.into(), "message");
        }
        moved
    }

    /// Record forward progress. No-op (returns false) once terminal.
    ///
    /// Progress is monotonic: a stale writer carrying a lower value
    /// cannot move the bar backwards.
    pub fn update_progress(&self, progress: u8, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.progress.fetch_max(progress.min(100), Ordering::Relaxed);
        self.write_lock_field(&self.message, message.into(), "message");
        true
    }

    /// Record the number of result files observed so far. No-op once
    /// terminal.
    pub fn set_output_count(&self, count: u64) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.output_count.store(count, Ordering::Relaxed);
        true
    }

    /// Transition `processing → completed`, recording the artifact.
    /// Returns false if the task was not processing; a task completes
    /// at most once.
    ///
    /// The artifact fields are recorded before the status is published,
    /// so a poller that observes `completed` always finds the artifact
    /// path and download URL already in place. Safe because the runner
    /// that drives the task is the only caller of terminal transitions.
    pub fn complete(
        &self,
        artifact: PathBuf,
        download_url: impl Into<String>,
        message: impl Into<String>,
    ) -> bool {
        if self.status() != TaskStatus::Processing {
            return false;
        }
        self.write_lock_field(&self.artifact_path, Some(artifact), "artifact_path");
        self.write_lock_field(&self.download_url, Some(download_url.into()), "download_url");
        self.write_lock_field(&self.finished_at, Some(Utc::now()), "finished_at");
        let moved = self
            .status
            .compare_exchange(
                TaskStatus::Processing as u8,
                TaskStatus::Completed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if moved {
            self.progress.store(100, Ordering::Relaxed);
            self.write_lock_field(&self.message, message.into(), "message");
        }
        moved
    }

    /// Transition `processing → error`, recording the fault. Progress is
    /// left frozen at its last value. Returns false if already terminal.
    ///
    /// As with [`Self::complete`], the fault detail is recorded before
    /// the status is published.
    pub fn fail(&self, message: impl Into<String>, detail: impl Into<String>) -> bool {
        if self.status() != TaskStatus::Processing {
            return false;
        }
        self.write_lock_field(&self.error_detail, Some(detail.into()), "error_detail");
        self.write_lock_field(&self.finished_at, Some(Utc::now()), "finished_at");
        let moved = self
            .status
            .compare_exchange(
                TaskStatus::Processing as u8,
                TaskStatus::Error as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if moved {
            self.write_lock_field(&self.message, message.into(), "message");
        }
        moved
    }

    /// Point-in-time view for pollers.
    pub fn snapshot(&self) -> TaskSnapshot {
        let output_count = self.output_count.load(Ordering::Relaxed);
        TaskSnapshot {
            id: self.id,
            job_kind: self.kind,
            status: self.status(),
            progress: self.progress(),
            message: self.read_lock_field(&self.message, "message").unwrap_or_default(),
            file_count: self.filenames.len(),
            filenames: self.filenames.clone(),
            created_at: self.created_at,
            started_at: self.read_lock_field(&self.started_at, "started_at").flatten(),
            finished_at: self.read_lock_field(&self.finished_at, "finished_at").flatten(),
            output_file_count: (output_count != OUTPUT_COUNT_UNSET).then_some(output_count),
            download_url: self.read_lock_field(&self.download_url, "download_url").flatten(),
            error_detail: self.read_lock_field(&self.error_detail, "error_detail").flatten(),
        }
    }

    fn write_lock_field<T>(&self, lock: &RwLock<T>, value: T, name: &str) {
        match lock.write() {
            Ok(mut guard) => *guard = value,
            Err(e) => tracing::error!(task_id = %self.id, "RwLock poisoned writing {name}: {e}"),
        }
    }

    fn read_lock_field<T: Clone>(&self, lock: &RwLock<T>, name: &str) -> Option<T> {
        match lock.read() {
            Ok(guard) => Some(guard.clone()),
            Err(e) => {
                tracing::error!(task_id = %self.id, "RwLock poisoned reading {name}: {e}");
                None
            }
        }
    }
}

/// Process-wide map from task id to task state.
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, std::sync::Arc<TaskState>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }

    /// Register a freshly created task and return the shared handle.
    pub fn create(&self, state: TaskState) -> std::sync::Arc<TaskState> {
        let state = std::sync::Arc::new(state);
        match self.tasks.write() {
            Ok(mut tasks) => {
                tasks.insert(state.id(), std::sync::Arc::clone(&state));
            }
            Err(e) => tracing::error!("RwLock poisoned inserting task: {e}"),
        }
        state
    }

    pub fn get(&self, id: TaskId) -> Option<std::sync::Arc<TaskState>> {
        match self.tasks.read() {
            Ok(tasks) => tasks.get(&id).cloned(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading tasks: {e}");
                None
            }
        }
    }

    pub fn snapshot(&self, id: TaskId) -> Option<TaskSnapshot> {
        self.get(id).map(|state| state.snapshot())
    }

    /// Lightweight listing of every task, newest first.
    pub fn list(&self) -> Vec<TaskListEntry> {
        let mut entries: Vec<TaskListEntry> = match self.tasks.read() {
            Ok(tasks) => tasks
                .values()
                .map(|state| TaskListEntry {
                    id: state.id(),
                    job_kind: state.kind(),
                    status: state.status(),
                    progress: state.progress(),
                    created_at: state.created_at,
                })
                .collect(),
            Err(e) => {
                tracing::error!("RwLock poisoned listing tasks: {e}");
                Vec::new()
            }
        };
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bioflow_types::JobKind;
    use uuid::Uuid;

    fn new_task() -> TaskState {
        TaskState::new(
            Uuid::new_v4(),
            JobKind::TextStats,
            vec!["a.txt".to_string(), "b.txt".to_string()],
        )
    }

    #[test]
    fn test_lifecycle_pending_processing_completed() {
        let task = new_task();
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.progress(), 0);

        assert!(task.start("starting"));
        assert_eq!(task.status(), TaskStatus::Processing);
        assert_eq!(task.progress(), 10);
        assert!(task.snapshot().started_at.is_some());

        assert!(task.update_progress(50, "halfway"));
        assert_eq!(task.progress(), 50);

        assert!(task.complete(PathBuf::from("/out/task.zip"), "/api/download/x", "done"));
        let snap = task.snapshot();
        assert_eq!(snap.status, TaskStatus::Completed);
        assert_eq!(snap.progress, 100);
        assert!(snap.finished_at.is_some());
        assert_eq!(snap.download_url.as_deref(), Some("/api/download/x"));
    }

    #[test]
    fn test_start_is_one_shot() {
        let task = new_task();
        assert!(task.start("go"));
        assert!(!task.start("again"));
    }

    #[test]
    fn test_terminal_is_reached_at_most_once() {
        let task = new_task();
        task.start("go");
        assert!(task.complete(PathBuf::from("/a.zip"), "/dl", "done"));
        // Neither terminal transition can fire again.
        assert!(!task.complete(PathBuf::from("/b.zip"), "/dl2", "done again"));
        assert!(!task.fail("too late", "detail"));
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.artifact_path(), Some(PathBuf::from("/a.zip")));
    }

    #[test]
    fn test_error_freezes_progress_and_records_detail() {
        let task = new_task();
        task.start("go");
        task.update_progress(63, "file 2 of 3");
        assert!(task.fail("boom", "caused by: disk on fire"));

        let snap = task.snapshot();
        assert_eq!(snap.status, TaskStatus::Error);
        assert_eq!(snap.progress, 63);
        assert_eq!(snap.message, "boom");
        assert_eq!(snap.error_detail.as_deref(), Some("caused by: disk on fire"));
        assert!(snap.download_url.is_none());
    }

    #[test]
    fn test_error_unreachable_from_pending() {
        let task = new_task();
        assert!(!task.fail("never started", "detail"));
        assert_eq!(task.status(), TaskStatus::Pending);
    }

    #[test]
    fn test_writes_refused_after_terminal() {
        let task = new_task();
        task.start("go");
        task.complete(PathBuf::from("/a.zip"), "/dl", "done");

        assert!(!task.update_progress(50, "stale monitor write"));
        assert!(!task.set_output_count(7));
        let snap = task.snapshot();
        assert_eq!(snap.progress, 100);
        assert_eq!(snap.message, "done");
        assert!(snap.output_file_count.is_none());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let task = new_task();
        task.start("go");
        task.update_progress(70, "ahead");
        // A slower writer reporting an older value cannot regress the bar.
        task.update_progress(36, "behind");
        assert_eq!(task.progress(), 70);
    }

    #[test]
    fn test_output_count_visible_in_snapshot() {
        let task = new_task();
        assert!(task.snapshot().output_file_count.is_none());
        task.start("go");
        task.set_output_count(3);
        assert_eq!(task.snapshot().output_file_count, Some(3));
    }

    #[test]
    fn test_concurrent_writers_never_regress_progress() {
        use std::sync::Arc;

        let task = Arc::new(new_task());
        task.start("go");

        let mut handles = Vec::new();
        for writer in 0..4u8 {
            let task = Arc::clone(&task);
            handles.push(std::thread::spawn(move || {
                for step in 0..=80u8 {
                    task.update_progress(10 + step, format!("writer {writer}"));
                }
            }));
        }

        // Concurrent reader asserting monotonicity while writers run.
        let reader_task = Arc::clone(&task);
        let reader = std::thread::spawn(move || {
            let mut last = 0;
            for _ in 0..2000 {
                let p = reader_task.progress();
                assert!(p >= last, "progress regressed: {last} -> {p}");
                last = p;
            }
        });

        for handle in handles {
            handle.join().unwrap();
        }
        reader.join().unwrap();
        assert_eq!(task.progress(), 90);
    }

    #[test]
    fn test_completed_never_observed_without_artifact() {
        use std::sync::Arc;

        // A poller that sees `completed` must also see the artifact
        // fields; the terminal status is published last.
        for _ in 0..50 {
            let task = Arc::new(new_task());
            task.start("go");

            let reader_task = Arc::clone(&task);
            let reader = std::thread::spawn(move || loop {
                let snap = reader_task.snapshot();
                if snap.status == TaskStatus::Completed {
                    assert!(snap.download_url.is_some(), "completed without download_url");
                    assert!(
                        reader_task.artifact_path().is_some(),
                        "completed without artifact path"
                    );
                    assert!(snap.finished_at.is_some(), "completed without finished_at");
                    return;
                }
            });

            task.complete(PathBuf::from("/out/task.zip"), "/api/download/x", "done");
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_failed_never_observed_without_detail() {
        use std::sync::Arc;

        for _ in 0..50 {
            let task = Arc::new(new_task());
            task.start("go");

            let reader_task = Arc::clone(&task);
            let reader = std::thread::spawn(move || loop {
                let snap = reader_task.snapshot();
                if snap.status == TaskStatus::Error {
                    assert!(snap.error_detail.is_some(), "error without detail");
                    return;
                }
            });

            task.fail("boom", "caused by: disk on fire");
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_registry_create_and_get() {
        let registry = TaskRegistry::new();
        let state = registry.create(new_task());
        let id = state.id();

        assert!(registry.get(id).is_some());
        assert_eq!(registry.snapshot(id).unwrap().file_count, 2);
    }

    #[test]
    fn test_registry_unknown_id_is_none() {
        let registry = TaskRegistry::new();
        assert!(registry.get(Uuid::new_v4()).is_none());
        assert!(registry.snapshot(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_registry_list_newest_first() {
        let registry = TaskRegistry::new();
        let first = registry.create(new_task()).id();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = registry.create(new_task()).id();

        let listed: Vec<TaskId> = registry.list().into_iter().map(|e| e.id).collect();
        assert_eq!(listed, vec![second, first]);
    }
}
