// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building a result archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("output directory not found: {path}")]
    RootNotFound { path: PathBuf },

    #[error("IO error archiving {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("zip error writing {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

impl ArchiveError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::RootNotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Errors that can occur while parsing a FASTA file.
#[derive(Debug, Error)]
pub enum FastaError {
    #[error("FASTA file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no sequence records in {path}")]
    Empty { path: PathBuf },

    #[error("sequence data before any '>' header in {path} at line {line}")]
    MissingHeader { path: PathBuf, line: usize },
}

impl FastaError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Any failure inside job execution.
///
/// Caught by the runner and recorded on the task as a terminal error;
/// never allowed to escape the task's own spawn.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Fasta(#[from] FastaError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("job kind has no external tool configured")]
    MissingToolConfig,

    #[error("failed to launch external tool `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error waiting for external tool: {source}")]
    ToolWait {
        #[source]
        source: std::io::Error,
    },

    #[error("external tool exited with status {code}")]
    ToolFailed { code: i32 },
}

impl JobError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Full diagnostic chain for the task record's `error_detail` field.
    pub fn detail(&self) -> String {
        use std::error::Error as _;
        let mut out = self.to_string();
        let mut source = self.source();
        while let Some(err) = source {
            out.push_str("\ncaused by: ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }
}
