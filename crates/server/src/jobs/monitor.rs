// crates/server/src/jobs/monitor.rs
//! Filesystem-polling progress observer.
//!
//! External tools like the structure-prediction container expose no
//! progress channel; the only signal is result files appearing in the
//! task's output directory. While the primary execution blocks on the
//! process, this monitor wakes on a fixed interval, counts files whose
//! extension marks them as results, and refines the task's progress
//! estimate.
//!
//! Contract: the monitor is a secondary writer. It checks the task's
//! status before every write and exits silently the first time it
//! observes a terminal status. A failed poll is logged and skipped;
//! the loop continues. It never escalates anything to the task record.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bioflow_core::{progress, MonitorConfig, TaskState};
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

/// Name of the append-only progress log in the task output directory.
pub const PROGRESS_LOG: &str = "progress.log";

pub struct OutputMonitor {
    task: Arc<TaskState>,
    output_dir: PathBuf,
    config: MonitorConfig,
    total_inputs: u64,
}

impl OutputMonitor {
    pub fn new(
        task: Arc<TaskState>,
        output_dir: PathBuf,
        config: MonitorConfig,
        total_inputs: u64,
    ) -> Self {
        Self {
            task,
            output_dir,
            config,
            total_inputs,
        }
    }

    /// Start the polling loop on its own execution context. Detached;
    /// the loop ends itself when the task becomes terminal.
    pub fn spawn(self) {
        tokio::spawn(self.run());
    }

    async fn run(self) {
        loop {
            tokio::time::sleep(self.config.interval).await;
            if self.task.is_terminal() {
                tracing::debug!(task_id = %self.task.id(), "Monitor observed terminal status, stopping");
                return;
            }
            if let Err(err) = self.poll_once().await {
                // A single bad poll must not take the monitor down.
                tracing::warn!(task_id = %self.task.id(), error = %err, "Monitor poll failed, continuing");
            }
        }
    }

    async fn poll_once(&self) -> std::io::Result<()> {
        let dir = self.output_dir.clone();
        let config = self.config.clone();
        let count = tokio::task::spawn_blocking(move || count_output_files(&dir, &config))
            .await
            .unwrap_or(0);

        let estimated = progress::estimate(count, self.total_inputs, self.task.progress());
        let message = format!(
            "analysis running, {count}/{} result files so far",
            self.total_inputs
        );

        // Re-check inside the write path: update_progress refuses writes
        // on a terminal task, so a completion racing this poll wins.
        if !self.task.update_progress(estimated, message) {
            return Ok(());
        }
        self.task.set_output_count(count);
        self.append_log(estimated, count).await
    }

    async fn append_log(&self, progress: u8, count: u64) -> std::io::Result<()> {
        let line = format!(
            "{} progress={progress}% output_files={count}\n",
            chrono::Utc::now().to_rfc3339()
        );
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.output_dir.join(PROGRESS_LOG))
            .await?;
        file.write_all(line.as_bytes()).await
    }
}

/// Count files under `dir` whose extension marks them as results.
/// A missing directory counts as zero results, not an error.
pub fn count_output_files(dir: &Path, config: &MonitorConfig) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| config.matches(&entry.file_name().to_string_lossy()))
        .count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use bioflow_types::JobKind;
    use std::time::Duration;
    use uuid::Uuid;

    fn fast_config() -> MonitorConfig {
        MonitorConfig {
            interval: Duration::from_millis(20),
            output_extensions: vec!["pdb".to_string(), "cif".to_string()],
        }
    }

    fn processing_task() -> Arc<TaskState> {
        let task = Arc::new(TaskState::new(
            Uuid::new_v4(),
            JobKind::Structure,
            vec!["a.json".to_string(), "b.json".to_string()],
        ));
        task.start("running");
        task
    }

    #[test]
    fn test_count_output_files_recursive_and_filtered() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("model_0.pdb"), "ATOM").unwrap();
        std::fs::write(tmp.path().join("sub/model_1.cif"), "data_").unwrap();
        std::fs::write(tmp.path().join("run.log"), "noise").unwrap();

        assert_eq!(count_output_files(tmp.path(), &fast_config()), 2);
    }

    #[test]
    fn test_count_missing_dir_is_zero() {
        let tmp = tempfile::TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        assert_eq!(count_output_files(&missing, &fast_config()), 0);
    }

    #[tokio::test]
    async fn test_monitor_raises_progress_and_logs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let task = processing_task();

        std::fs::write(tmp.path().join("model_0.pdb"), "ATOM").unwrap();
        OutputMonitor::new(
            Arc::clone(&task),
            tmp.path().to_path_buf(),
            fast_config(),
            2,
        )
        .spawn();

        tokio::time::sleep(Duration::from_millis(100)).await;
        // 1 of 2 outputs: estimate = 10 + 40 = 50.
        assert_eq!(task.progress(), 50);
        assert_eq!(task.snapshot().output_file_count, Some(1));

        let log = std::fs::read_to_string(tmp.path().join(PROGRESS_LOG)).unwrap();
        assert!(log.lines().count() >= 1);
        assert!(log.contains("output_files=1"));
    }

    #[tokio::test]
    async fn test_monitor_stops_writing_after_terminal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let task = processing_task();

        OutputMonitor::new(
            Arc::clone(&task),
            tmp.path().to_path_buf(),
            fast_config(),
            2,
        )
        .spawn();

        // Complete before the first poll fires.
        task.complete(tmp.path().join("t.zip"), "/dl", "done");
        tokio::time::sleep(Duration::from_millis(120)).await;

        // Terminal record untouched, nothing logged after completion.
        let snap = task.snapshot();
        assert_eq!(snap.progress, 100);
        assert_eq!(snap.message, "done");
        assert!(!tmp.path().join(PROGRESS_LOG).exists());
    }

    #[tokio::test]
    async fn test_monitor_survives_unreadable_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let task = processing_task();

        // Output dir does not exist yet; polls see zero files and carry on.
        OutputMonitor::new(
            Arc::clone(&task),
            tmp.path().join("not-yet-created"),
            fast_config(),
            2,
        )
        .spawn();

        tokio::time::sleep(Duration::from_millis(80)).await;
        // Floor preserved, no panic, task still live.
        assert_eq!(task.progress(), 10);
        assert!(!task.is_terminal());
    }
}
