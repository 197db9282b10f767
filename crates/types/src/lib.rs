// crates/types/src/lib.rs
//! Shared wire types for the bioflow task server.
//!
//! Everything a status poller or upload client sees on the wire lives
//! here: job kinds, task lifecycle status, and the JSON snapshot of a
//! task. The core and server crates both depend on this crate so the
//! registry's in-memory record and the HTTP responses agree on shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a submitted task.
pub type TaskId = Uuid;

/// The category of analysis a task requests.
///
/// A closed set: adding a kind is a compile-time change that forces
/// every dispatch site to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    /// Per-file text statistics (size, lines, words, chars).
    TextStats,
    /// RNA secondary-structure folding over FASTA inputs.
    Rnafold,
    /// Structure prediction delegated to an external containerized tool.
    Structure,
}

impl JobKind {
    /// All registered kinds, in a stable order.
    pub const ALL: [JobKind; 3] = [JobKind::TextStats, JobKind::Rnafold, JobKind::Structure];

    /// The path segment / directory name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::TextStats => "text-stats",
            JobKind::Rnafold => "rnafold",
            JobKind::Structure => "structure",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a URL path segment names no registered job kind.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown job kind: {0}")]
pub struct UnknownJobKind(pub String);

impl std::str::FromStr for JobKind {
    type Err = UnknownJobKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text-stats" => Ok(JobKind::TextStats),
            "rnafold" => Ok(JobKind::Rnafold),
            "structure" => Ok(JobKind::Structure),
            other => Err(UnknownJobKind(other.to_string())),
        }
    }
}

/// Lifecycle status of a task.
///
/// `Completed` and `Error` are terminal: once a task reaches either,
/// no field of the task record changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum TaskStatus {
    Pending = 0,
    Processing = 1,
    Completed = 2,
    Error = 3,
}

impl TaskStatus {
    /// Whether this status permits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }

    /// Decode the atomic representation stored in the registry.
    pub fn from_u8(v: u8) -> TaskStatus {
        match v {
            0 => TaskStatus::Pending,
            1 => TaskStatus::Processing,
            2 => TaskStatus::Completed,
            _ => TaskStatus::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        }
    }
}

/// JSON-serializable point-in-time view of a task, as returned by the
/// status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub job_kind: JobKind,
    pub status: TaskStatus,
    /// Integer percentage in [0, 100], non-decreasing while processing.
    pub progress: u8,
    pub message: String,
    pub file_count: usize,
    pub filenames: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Result files discovered so far (monitor-driven jobs only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

/// Response body for a successful submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub task_id: TaskId,
    pub job_kind: JobKind,
    pub file_count: usize,
    pub message: String,
    pub status_url: String,
}

/// One entry in the `/api/tasks` listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskListEntry {
    pub id: TaskId,
    pub job_kind: JobKind,
    pub status: TaskStatus,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
}
