// crates/core/src/config.rs
//! Per-job-kind file policy and on-disk layout.
//!
//! Layout, all under one data root:
//!
//! ```text
//! <root>/uploads/<kind>/<task_id>/<original filename>
//! <root>/processed/<kind>/<task_id>/...      intermediate outputs
//! <root>/processed/<kind>/<task_id>.zip      final artifact
//! <root>/staging/structure/<task_id>/        inputs staged for the container
//! ```
//!
//! Every task gets its own id-named subdirectories, so concurrent
//! tasks never touch the same file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bioflow_types::{JobKind, TaskId};

use crate::archive::ArchivePolicy;

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "BIOFLOW_DATA_DIR";

/// Polling policy for the background output monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between filesystem polls.
    pub interval: Duration,
    /// File extensions counted as results (without the leading dot).
    pub output_extensions: Vec<String>,
}

impl MonitorConfig {
    /// Whether a file name counts as one produced result.
    pub fn matches(&self, name: &str) -> bool {
        self.output_extensions
            .iter()
            .any(|ext| Path::new(name).extension().is_some_and(|e| e.eq_ignore_ascii_case(ext)))
    }
}

/// Command template for a job that delegates to an external tool.
///
/// `args` may contain `{task_id}`, `{input_dir}` and `{output_dir}`
/// placeholders, substituted per task at launch time.
#[derive(Debug, Clone)]
pub struct ExternalToolConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Root under which per-task input staging directories are created.
    pub staging_root: PathBuf,
    /// Grace period for reaping the process handle after its output closes.
    pub reap_grace: Duration,
}

impl ExternalToolConfig {
    /// Substitute per-task values into the argument template.
    pub fn render_args(&self, task_id: TaskId, input_dir: &Path, output_dir: &Path) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{task_id}", &task_id.to_string())
                    .replace("{input_dir}", &input_dir.to_string_lossy())
                    .replace("{output_dir}", &output_dir.to_string_lossy())
            })
            .collect()
    }

    /// Staging directory for one task's inputs.
    pub fn staging_dir(&self, task_id: TaskId) -> PathBuf {
        self.staging_root.join(task_id.to_string())
    }
}

/// Static per-job-kind configuration, immutable after startup.
#[derive(Debug, Clone)]
pub struct JobKindConfig {
    /// Accepted upload extensions (without the leading dot).
    pub allowed_extensions: Vec<String>,
    pub max_size_bytes: u64,
    pub archive: ArchivePolicy,
    /// Present for kinds whose progress is inferred by a background monitor.
    pub monitor: Option<MonitorConfig>,
    /// Present for kinds that delegate to an external process.
    pub external: Option<ExternalToolConfig>,
}

impl JobKindConfig {
    /// Whether an uploaded filename carries an accepted extension.
    pub fn accepts(&self, filename: &str) -> bool {
        Path::new(filename)
            .extension()
            .is_some_and(|ext| {
                self.allowed_extensions
                    .iter()
                    .any(|allowed| ext.eq_ignore_ascii_case(allowed))
            })
    }
}

/// Whole-application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_root: PathBuf,
    text_stats: JobKindConfig,
    rnafold: JobKindConfig,
    structure: JobKindConfig,
}

const MB: u64 = 1024 * 1024;

impl AppConfig {
    /// Build the default configuration rooted at `data_root`.
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        let data_root = data_root.into();
        let staging_root = data_root.join("staging").join("structure");
        Self {
            text_stats: JobKindConfig {
                allowed_extensions: strings(&["txt", "csv", "json", "xlsx", "pdf", "fa"]),
                max_size_bytes: 100 * MB,
                archive: ArchivePolicy::default(),
                monitor: None,
                external: None,
            },
            rnafold: JobKindConfig {
                allowed_extensions: strings(&["fasta", "fa", "txt", "seq"]),
                max_size_bytes: 10 * MB,
                archive: ArchivePolicy::default(),
                monitor: None,
                external: None,
            },
            structure: JobKindConfig {
                allowed_extensions: strings(&["json"]),
                max_size_bytes: 1024 * MB,
                archive: ArchivePolicy::default(),
                monitor: Some(MonitorConfig {
                    interval: Duration::from_secs(600),
                    output_extensions: strings(&["pdb", "json", "cif", "pkl"]),
                }),
                external: Some(default_structure_tool(staging_root)),
            },
            data_root,
        }
    }

    /// Configuration from the environment (`BIOFLOW_DATA_DIR`, default `./data`).
    pub fn from_env() -> Self {
        let root = std::env::var(DATA_DIR_ENV).unwrap_or_else(|_| "data".to_string());
        Self::new(root)
    }

    pub fn job(&self, kind: JobKind) -> &JobKindConfig {
        match kind {
            JobKind::TextStats => &self.text_stats,
            JobKind::Rnafold => &self.rnafold,
            JobKind::Structure => &self.structure,
        }
    }

    pub fn job_mut(&mut self, kind: JobKind) -> &mut JobKindConfig {
        match kind {
            JobKind::TextStats => &mut self.text_stats,
            JobKind::Rnafold => &mut self.rnafold,
            JobKind::Structure => &mut self.structure,
        }
    }

    pub fn upload_dir(&self, kind: JobKind) -> PathBuf {
        self.data_root.join("uploads").join(kind.as_str())
    }

    pub fn processed_dir(&self, kind: JobKind) -> PathBuf {
        self.data_root.join("processed").join(kind.as_str())
    }

    /// Directory holding one task's uploaded inputs.
    pub fn task_upload_dir(&self, kind: JobKind, task_id: TaskId) -> PathBuf {
        self.upload_dir(kind).join(task_id.to_string())
    }

    /// Directory holding one task's intermediate outputs.
    pub fn task_output_dir(&self, kind: JobKind, task_id: TaskId) -> PathBuf {
        self.processed_dir(kind).join(task_id.to_string())
    }

    /// Final artifact path for one task.
    pub fn artifact_path(&self, kind: JobKind, task_id: TaskId) -> PathBuf {
        self.processed_dir(kind).join(format!("{task_id}.zip"))
    }

    /// Create every directory the server writes into.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for kind in JobKind::ALL {
            std::fs::create_dir_all(self.upload_dir(kind))?;
            std::fs::create_dir_all(self.processed_dir(kind))?;
            if let Some(external) = &self.job(kind).external {
                std::fs::create_dir_all(&external.staging_root)?;
            }
        }
        Ok(())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Default container invocation for the structure-prediction tool,
/// matching the fixed mount points and device selector the deployment
/// expects. Every piece is overridable through the config.
fn default_structure_tool(staging_root: PathBuf) -> ExternalToolConfig {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let models = home.join("AF").join("models");
    let databases = home.join("AF").join("db");
    ExternalToolConfig {
        program: "docker".to_string(),
        args: vec![
            "run".to_string(),
            "--rm".to_string(),
            "--volume".to_string(),
            "{input_dir}:/root/af_input".to_string(),
            "--volume".to_string(),
            "{output_dir}:/root/af_output".to_string(),
            "--volume".to_string(),
            format!("{}:/root/models", models.display()),
            "--volume".to_string(),
            format!("{}:/root/public_databases", databases.display()),
            "-e".to_string(),
            "CUDA_VISIBLE_DEVICES=0".to_string(),
            "--gpus".to_string(),
            "all".to_string(),
            "alphafold3".to_string(),
            "python".to_string(),
            "run_alphafold.py".to_string(),
            "--input_dir=/root/af_input".to_string(),
            "--model_dir=/root/models".to_string(),
            "--output_dir=/root/af_output".to_string(),
            "--gpu_device=0".to_string(),
        ],
        staging_root,
        reap_grace: Duration::from_secs(2),
    }
}
