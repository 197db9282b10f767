// crates/server/src/jobs/mod.rs
//! Background job system for submitted analysis tasks.
//!
//! Provides:
//! - [`Job`] — the contract every job kind implements
//! - [`runner`] — spawns one detached execution per task and drives it
//!   through the registry's state machine
//! - [`monitor`] — filesystem-polling progress observer for jobs that
//!   block on an external process
//! - one module per job kind: [`text_stats`], [`rnafold`], [`structure`]

pub mod monitor;
pub mod rnafold;
pub mod runner;
pub mod structure;
pub mod text_stats;

use std::path::PathBuf;
use std::sync::Arc;

use bioflow_core::{AppConfig, JobError, TaskState};

pub use monitor::OutputMonitor;
pub use runner::submit;

/// Everything a job implementation needs to do its work.
///
/// Jobs communicate outcomes by mutating `task`; the spawning code
/// never observes a return value, only registry state.
pub struct JobContext {
    pub task: Arc<TaskState>,
    pub config: Arc<AppConfig>,
    /// Uploaded input files, in submission order.
    pub input_files: Vec<PathBuf>,
    /// Per-task directory for intermediate outputs.
    pub output_dir: PathBuf,
}

/// What a successful job hands back to the runner, which then archives
/// the output directory and records completion.
pub struct JobOutcome {
    /// Completion message shown to status pollers.
    pub message: String,
}

/// The contract every analysis job implements.
///
/// `execute` writes result files under `ctx.output_dir` and reports
/// per-unit progress through `ctx.task`. It must return rather than
/// panic on failure; the runner records an `Err` as the task's terminal
/// error. Dispatch is a compile-time-checked match over [`JobKind`],
/// not a string registry.
///
/// [`JobKind`]: bioflow_types::JobKind
pub trait Job {
    fn execute(
        &self,
        ctx: &JobContext,
    ) -> impl std::future::Future<Output = Result<JobOutcome, JobError>> + Send;
}
