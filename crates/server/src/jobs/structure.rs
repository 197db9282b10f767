// crates/server/src/jobs/structure.rs
//! Structure-prediction job delegating to an external containerized tool.
//!
//! The real work happens in a long-running process (hours for large
//! inputs) that offers no progress channel; this job stages the inputs,
//! launches the configured command, and captures its combined
//! stdout/stderr line-by-line into `run.log` while the background
//! monitor (spawned by the runner) watches result files appear. After
//! the process exits, produced files are counted and a summary report
//! with the log tail is written.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use bioflow_core::{ExternalToolConfig, JobError};

use crate::jobs::monitor::count_output_files;
use crate::jobs::{Job, JobContext, JobOutcome};

/// Execution log captured from the external tool, one line at a time.
pub const RUN_LOG: &str = "run.log";

/// Lines of the log echoed into the summary report.
const LOG_TAIL_LINES: usize = 100;

pub struct StructureJob;

impl Job for StructureJob {
    async fn execute(&self, ctx: &JobContext) -> Result<JobOutcome, JobError> {
        let kind_config = ctx.config.job(ctx.task.kind());
        let tool = kind_config.external.as_ref().ok_or(JobError::MissingToolConfig)?;

        tokio::fs::create_dir_all(&ctx.output_dir)
            .await
            .map_err(|e| JobError::io(&ctx.output_dir, e))?;

        // Stage inputs where the container's input mount expects them.
        let staging = tool.staging_dir(ctx.task.id());
        stage_inputs(ctx, &staging).await?;

        let input_dir = absolute(&staging).await;
        let output_dir = absolute(&ctx.output_dir).await;
        let args = tool.render_args(ctx.task.id(), &input_dir, &output_dir);

        let log_path = ctx.output_dir.join(RUN_LOG);
        let mut log = tokio::fs::File::create(&log_path)
            .await
            .map_err(|e| JobError::io(&log_path, e))?;
        write_log_header(&mut log, ctx, tool, &args)
            .await
            .map_err(|e| JobError::io(&log_path, e))?;

        ctx.task.update_progress(
            ctx.task.progress(),
            "structure prediction running, this may take a while",
        );
        let exit_code = run_tool(tool, &args, &mut log, &log_path).await?;

        let footer = format!(
            "\n{}\nend: {}\nreturn code: {}\n",
            "=".repeat(72),
            chrono::Utc::now().to_rfc3339(),
            exit_code.map_or_else(|| "unknown (reap timed out)".to_string(), |c| c.to_string()),
        );
        log.write_all(footer.as_bytes())
            .await
            .map_err(|e| JobError::io(&log_path, e))?;

        // The tool writes result files as a side effect; count them the
        // same way the monitor does so the final message and the last
        // monitor estimate agree.
        let output_count = match &kind_config.monitor {
            Some(monitor) => {
                let dir = ctx.output_dir.clone();
                let monitor = monitor.clone();
                let count =
                    tokio::task::spawn_blocking(move || count_output_files(&dir, &monitor))
                        .await
                        .unwrap_or(0);
                ctx.task.set_output_count(count);
                count
            }
            None => 0,
        };

        write_summary(ctx, &log_path, output_count).await?;

        Ok(JobOutcome {
            message: format!("structure prediction complete: {output_count} result files"),
        })
    }
}

async fn stage_inputs(ctx: &JobContext, staging: &Path) -> Result<(), JobError> {
    tokio::fs::create_dir_all(staging)
        .await
        .map_err(|e| JobError::io(staging, e))?;
    ctx.task.update_progress(
        ctx.task.progress(),
        format!("staging {} input files", ctx.input_files.len()),
    );
    for input in &ctx.input_files {
        let name = input.file_name().ok_or_else(|| {
            JobError::io(input, std::io::Error::other("input path has no file name"))
        })?;
        tokio::fs::copy(input, staging.join(name))
            .await
            .map_err(|e| JobError::io(input, e))?;
    }
    Ok(())
}

/// Launch the tool and pump its combined output into the log.
/// Returns the exit code, or `None` when reaping timed out (non-fatal).
async fn run_tool(
    tool: &ExternalToolConfig,
    args: &[String],
    log: &mut tokio::fs::File,
    log_path: &Path,
) -> Result<Option<i32>, JobError> {
    let mut child = Command::new(&tool.program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| JobError::Spawn {
            program: tool.program.clone(),
            source: e,
        })?;

    // Merge stdout and stderr into one line stream, in arrival order.
    let (tx, mut rx) = tokio::sync::mpsc::channel::<String>(64);
    if let Some(stdout) = child.stdout.take() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(tx);

    while let Some(line) = rx.recv().await {
        log.write_all(line.as_bytes())
            .await
            .map_err(|e| JobError::io(log_path, e))?;
        log.write_all(b"\n")
            .await
            .map_err(|e| JobError::io(log_path, e))?;
    }

    // Output is closed; the process should be gone. Bounded reap, and a
    // straggler is reported but not fatal.
    match tokio::time::timeout(tool.reap_grace, child.wait()).await {
        Ok(Ok(status)) => {
            if status.success() {
                Ok(status.code())
            } else {
                Err(JobError::ToolFailed {
                    code: status.code().unwrap_or(-1),
                })
            }
        }
        Ok(Err(e)) => Err(JobError::ToolWait { source: e }),
        Err(_) => {
            tracing::warn!(program = %tool.program, "External tool not reaped within grace period");
            Ok(None)
        }
    }
}

async fn write_log_header(
    log: &mut tokio::fs::File,
    ctx: &JobContext,
    tool: &ExternalToolConfig,
    args: &[String],
) -> std::io::Result<()> {
    let header = format!(
        "structure prediction log\ntask: {}\nstart: {}\ninput files: {}\ncommand: {} {}\n{}\n",
        ctx.task.id(),
        chrono::Utc::now().to_rfc3339(),
        ctx.input_files.len(),
        tool.program,
        args.join(" "),
        "-".repeat(72),
    );
    log.write_all(header.as_bytes()).await
}

async fn write_summary(
    ctx: &JobContext,
    log_path: &Path,
    output_count: u64,
) -> Result<(), JobError> {
    let log_tail = match tokio::fs::read_to_string(log_path).await {
        Ok(contents) => {
            let lines: Vec<&str> = contents.lines().collect();
            let start = lines.len().saturating_sub(LOG_TAIL_LINES);
            lines[start..].join("\n")
        }
        Err(_) => "log unavailable".to_string(),
    };

    let summary = format!(
        "=== structure prediction report ===\ntask: {}\ngenerated: {}\ninput files: {}\nresult files: {}\n\n=== log tail ===\n{}\n",
        ctx.task.id(),
        chrono::Utc::now().to_rfc3339(),
        ctx.input_files.len(),
        output_count,
        log_tail,
    );
    let path = ctx.output_dir.join("structure_summary.txt");
    tokio::fs::write(&path, summary)
        .await
        .map_err(|e| JobError::io(&path, e))
}

async fn absolute(path: &Path) -> PathBuf {
    tokio::fs::canonicalize(path)
        .await
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bioflow_core::{AppConfig, TaskState};
    use bioflow_types::JobKind;
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    fn shell_tool(tmp: &Path, script: &str) -> ExternalToolConfig {
        ExternalToolConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            staging_root: tmp.join("staging"),
            reap_grace: Duration::from_secs(2),
        }
    }

    async fn run_with_script(
        script: &str,
        inputs: Vec<std::path::PathBuf>,
    ) -> (tempfile::TempDir, JobContext, Result<JobOutcome, JobError>) {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = AppConfig::new(tmp.path());
        config.job_mut(JobKind::Structure).external = Some(shell_tool(tmp.path(), script));

        let filenames = inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        let task = Arc::new(TaskState::new(Uuid::new_v4(), JobKind::Structure, filenames));
        task.start("go");
        let ctx = JobContext {
            task,
            config: Arc::new(config),
            input_files: inputs,
            output_dir: tmp.path().join("out"),
        };
        let result = StructureJob.execute(&ctx).await;
        (tmp, ctx, result)
    }

    fn one_input(dir: &Path) -> std::path::PathBuf {
        let input = dir.join("model.json");
        std::fs::write(&input, "{\"sequence\":\"AUGC\"}").unwrap();
        input
    }

    #[tokio::test]
    async fn test_tool_output_captured_and_results_counted() {
        let staging = tempfile::TempDir::new().unwrap();
        let input = one_input(staging.path());

        let script =
            "echo starting; mkdir -p {output_dir}/preds; printf ATOM > {output_dir}/preds/model_0.pdb; echo finished 1>&2";
        let (_tmp, ctx, result) = run_with_script(script, vec![input]).await;
        let outcome = result.unwrap();
        assert!(outcome.message.contains("1 result files"));

        let log = std::fs::read_to_string(ctx.output_dir.join(RUN_LOG)).unwrap();
        assert!(log.contains("starting"));
        assert!(log.contains("finished")); // stderr captured too
        assert!(log.contains("return code: 0"));

        let summary =
            std::fs::read_to_string(ctx.output_dir.join("structure_summary.txt")).unwrap();
        assert!(summary.contains("result files: 1"));
        assert!(summary.contains("=== log tail ==="));

        assert_eq!(ctx.task.snapshot().output_file_count, Some(1));
    }

    #[tokio::test]
    async fn test_inputs_staged_before_launch() {
        let staging = tempfile::TempDir::new().unwrap();
        let input = one_input(staging.path());

        // The script sees the staged copy through the rendered {input_dir}.
        let script = "test -f {input_dir}/model.json";
        let (_tmp, _ctx, result) = run_with_script(script, vec![input]).await;
        result.unwrap();
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_a_job_error() {
        let staging = tempfile::TempDir::new().unwrap();
        let input = one_input(staging.path());

        let (_tmp, _ctx, result) = run_with_script("echo boom; exit 3", vec![input]).await;
        assert!(matches!(result, Err(JobError::ToolFailed { code: 3 })));
    }

    #[tokio::test]
    async fn test_unlaunchable_tool_is_a_spawn_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = AppConfig::new(tmp.path());
        config.job_mut(JobKind::Structure).external = Some(ExternalToolConfig {
            program: "/nonexistent/tool".to_string(),
            args: vec![],
            staging_root: tmp.path().join("staging"),
            reap_grace: Duration::from_secs(2),
        });
        let input = one_input(tmp.path());
        let task = Arc::new(TaskState::new(
            Uuid::new_v4(),
            JobKind::Structure,
            vec!["model.json".to_string()],
        ));
        task.start("go");
        let ctx = JobContext {
            task,
            config: Arc::new(config),
            input_files: vec![input],
            output_dir: tmp.path().join("out"),
        };

        let result = StructureJob.execute(&ctx).await;
        assert!(matches!(result, Err(JobError::Spawn { .. })));
    }
}
