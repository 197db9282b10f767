// crates/server/src/jobs/text_stats.rs
//! Per-file text statistics job.
//!
//! The simplest job kind: one stats JSON per input file plus an
//! aggregate report. Exists both as a real endpoint and as the
//! reference implementation of the per-file batch pattern every job
//! follows (transform file, write result, bump estimator).

use std::path::Path;

use serde::Serialize;

use bioflow_core::{progress, JobError};

use crate::jobs::{Job, JobContext, JobOutcome};

/// Subdirectory of the task output dir holding per-file results.
const RESULTS_DIR: &str = "text_results";

#[derive(Debug, Serialize)]
struct FileStats {
    filename: String,
    size: u64,
    lines: usize,
    words: usize,
    chars: usize,
}

pub struct TextStatsJob;

impl Job for TextStatsJob {
    async fn execute(&self, ctx: &JobContext) -> Result<JobOutcome, JobError> {
        let results_dir = ctx.output_dir.join(RESULTS_DIR);
        tokio::fs::create_dir_all(&results_dir)
            .await
            .map_err(|e| JobError::io(&results_dir, e))?;

        let total = ctx.input_files.len() as u64;
        let mut all_stats = Vec::with_capacity(ctx.input_files.len());

        for (index, input) in ctx.input_files.iter().enumerate() {
            let stats = analyze_file(input).await?;

            let stats_path = results_dir.join(format!("{}_stats.json", stats.filename));
            let json = serde_json::to_vec_pretty(&stats)?;
            tokio::fs::write(&stats_path, json)
                .await
                .map_err(|e| JobError::io(&stats_path, e))?;
            all_stats.push(stats);

            ctx.task.update_progress(
                progress::estimate(index as u64 + 1, total, ctx.task.progress()),
                format!("processed {}/{} files", index + 1, total),
            );
        }

        write_summary(&ctx.output_dir, &all_stats).await?;

        Ok(JobOutcome {
            message: format!("text analysis complete for {total} files"),
        })
    }
}

async fn analyze_file(input: &Path) -> Result<FileStats, JobError> {
    let bytes = tokio::fs::read(input)
        .await
        .map_err(|e| JobError::io(input, e))?;
    let content = String::from_utf8_lossy(&bytes);
    Ok(FileStats {
        filename: input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        size: bytes.len() as u64,
        lines: content.lines().count(),
        words: content.split_whitespace().count(),
        chars: content.chars().count(),
    })
}

async fn write_summary(output_dir: &Path, stats: &[FileStats]) -> Result<(), JobError> {
    let mut report = String::new();
    report.push_str("=== text analysis report ===\n");
    report.push_str(&format!("generated: {}\n", chrono::Utc::now().to_rfc3339()));
    report.push_str(&format!("files processed: {}\n", stats.len()));
    report.push_str(&format!(
        "total chars: {}\n",
        stats.iter().map(|s| s.chars).sum::<usize>()
    ));
    report.push_str(&format!(
        "total lines: {}\n",
        stats.iter().map(|s| s.lines).sum::<usize>()
    ));
    report.push_str("\n=== per file ===\n");
    for s in stats {
        report.push_str(&format!(
            "\n{}\n  size: {} bytes\n  lines: {}\n  words: {}\n",
            s.filename, s.size, s.lines, s.words
        ));
    }

    let path = output_dir.join("summary_report.txt");
    tokio::fs::write(&path, report)
        .await
        .map_err(|e| JobError::io(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bioflow_core::{AppConfig, TaskState};
    use bioflow_types::JobKind;
    use std::sync::Arc;
    use uuid::Uuid;

    async fn run_job(inputs: Vec<std::path::PathBuf>) -> (tempfile::TempDir, JobContext, Result<JobOutcome, JobError>) {
        let tmp = tempfile::TempDir::new().unwrap();
        let filenames = inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        let task = Arc::new(TaskState::new(Uuid::new_v4(), JobKind::TextStats, filenames));
        task.start("go");
        let ctx = JobContext {
            task,
            config: Arc::new(AppConfig::new(tmp.path())),
            input_files: inputs,
            output_dir: tmp.path().join("out"),
        };
        let result = TextStatsJob.execute(&ctx).await;
        (tmp, ctx, result)
    }

    #[tokio::test]
    async fn test_stats_written_per_file_with_summary() {
        let staging = tempfile::TempDir::new().unwrap();
        let input = staging.path().join("notes.txt");
        std::fs::write(&input, "alpha beta\ngamma\n").unwrap();

        let (_tmp, ctx, result) = run_job(vec![input]).await;
        result.unwrap();

        let stats_json =
            std::fs::read_to_string(ctx.output_dir.join("text_results/notes.txt_stats.json"))
                .unwrap();
        let stats: serde_json::Value = serde_json::from_str(&stats_json).unwrap();
        assert_eq!(stats["lines"], 2);
        assert_eq!(stats["words"], 3);
        assert_eq!(stats["filename"], "notes.txt");

        let summary =
            std::fs::read_to_string(ctx.output_dir.join("summary_report.txt")).unwrap();
        assert!(summary.contains("files processed: 1"));
    }

    #[tokio::test]
    async fn test_progress_lands_at_ceiling_after_last_file() {
        let staging = tempfile::TempDir::new().unwrap();
        let mut inputs = Vec::new();
        for i in 0..2 {
            let path = staging.path().join(format!("f{i}.txt"));
            std::fs::write(&path, "x\n").unwrap();
            inputs.push(path);
        }

        let (_tmp, ctx, result) = run_job(inputs).await;
        result.unwrap();
        assert_eq!(ctx.task.progress(), 90);
    }

    #[tokio::test]
    async fn test_missing_input_is_reported() {
        let (_tmp, _ctx, result) =
            run_job(vec![std::path::PathBuf::from("/missing/input.txt")]).await;
        assert!(matches!(result, Err(JobError::Io { .. })));
    }
}
