// crates/core/src/lib.rs
//! Bioflow orchestration core.
//!
//! Library half of the task server: everything the HTTP layer needs to
//! track a batch-analysis task from submission to a downloadable
//! archive, without any HTTP or runtime dependency of its own.
//!
//! - [`registry`] — concurrent task registry with per-entry atomic state
//! - [`progress`] — banded percentage estimation shared by all job kinds
//! - [`archive`] — zip builder with transient-file exclusion rules
//! - [`config`] — per-job-kind file policy and directory layout
//! - [`fasta`] — minimal FASTA record parser
//! - [`fold`] — RNA secondary-structure folding engine

pub mod archive;
pub mod config;
pub mod error;
pub mod fasta;
pub mod fold;
pub mod progress;
pub mod registry;

pub use archive::{ArchivePolicy, build_archive};
pub use config::{AppConfig, ExternalToolConfig, JobKindConfig, MonitorConfig};
pub use error::{ArchiveError, FastaError, JobError};
pub use progress::estimate;
pub use registry::{TaskRegistry, TaskState};
