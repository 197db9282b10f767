// crates/server/src/jobs/rnafold.rs
//! RNA secondary-structure folding job.
//!
//! Each input file is parsed as FASTA and every sequence folded; the
//! per-file result is a JSON analysis plus a human-readable rendering.
//! Inputs are processed strictly in submission order so progress maps
//! one-to-one onto the file list a poller saw at submission time.

use std::path::Path;

use serde::Serialize;

use bioflow_core::{fasta, fold, progress, JobError};

use crate::jobs::{Job, JobContext, JobOutcome};

/// Subdirectory of the task output dir holding per-file results.
const RESULTS_DIR: &str = "rnafold_analysis";

#[derive(Debug, Serialize)]
struct SequenceAnalysis {
    id: String,
    sequence: String,
    structure: String,
    energy: f64,
    length: usize,
}

pub struct RnafoldJob;

impl Job for RnafoldJob {
    async fn execute(&self, ctx: &JobContext) -> Result<JobOutcome, JobError> {
        let results_dir = ctx.output_dir.join(RESULTS_DIR);
        tokio::fs::create_dir_all(&results_dir)
            .await
            .map_err(|e| JobError::io(&results_dir, e))?;

        let total = ctx.input_files.len() as u64;
        let mut folded_sequences = 0usize;

        for (index, input) in ctx.input_files.iter().enumerate() {
            let analyses = analyze_file(input).await?;
            folded_sequences += analyses.len();

            let filename = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            write_results(&results_dir, &filename, &analyses).await?;

            ctx.task.update_progress(
                progress::estimate(index as u64 + 1, total, ctx.task.progress()),
                format!("folded {}/{} files", index + 1, total),
            );
        }

        write_summary(&ctx.output_dir, ctx.input_files.len(), folded_sequences).await?;

        Ok(JobOutcome {
            message: format!(
                "RNAfold analysis complete: {folded_sequences} sequences across {total} files"
            ),
        })
    }
}

/// Parse and fold one FASTA file. Parsing and the O(n^3) fold are CPU
/// work, kept off the async executor.
async fn analyze_file(input: &Path) -> Result<Vec<SequenceAnalysis>, JobError> {
    let path = input.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let records = fasta::parse_file(&path)?;
        Ok(records
            .into_iter()
            .map(|record| {
                let folded = fold::fold(&record.sequence);
                SequenceAnalysis {
                    id: record.id,
                    length: record.sequence.len(),
                    sequence: record.sequence,
                    structure: folded.structure,
                    energy: folded.energy,
                }
            })
            .collect())
    })
    .await
    .unwrap_or_else(|join_err| {
        Err(JobError::io(
            input,
            std::io::Error::other(join_err.to_string()),
        ))
    })
}

async fn write_results(
    results_dir: &Path,
    filename: &str,
    analyses: &[SequenceAnalysis],
) -> Result<(), JobError> {
    let json_path = results_dir.join(format!("{filename}_analysis.json"));
    let json = serde_json::to_vec_pretty(analyses)?;
    tokio::fs::write(&json_path, json)
        .await
        .map_err(|e| JobError::io(&json_path, e))?;

    let mut viz = format!("RNAfold analysis for {filename}\n");
    viz.push_str(&"=".repeat(50));
    viz.push('\n');
    for analysis in analyses {
        viz.push_str(&format!(
            "\nsequence: {}\nlength: {}\nenergy: {} kcal/mol\n{}\n{}\n",
            analysis.id, analysis.length, analysis.energy, analysis.sequence, analysis.structure
        ));
        viz.push_str(&"-".repeat(30));
        viz.push('\n');
    }
    let viz_path = results_dir.join(format!("{filename}_viz.txt"));
    tokio::fs::write(&viz_path, viz)
        .await
        .map_err(|e| JobError::io(&viz_path, e))
}

async fn write_summary(
    output_dir: &Path,
    file_count: usize,
    sequence_count: usize,
) -> Result<(), JobError> {
    let summary = format!(
        "=== RNAfold summary ===\ngenerated: {}\nfiles analyzed: {file_count}\nsequences folded: {sequence_count}\n",
        chrono::Utc::now().to_rfc3339()
    );
    let path = output_dir.join("rnafold_summary.txt");
    tokio::fs::write(&path, summary)
        .await
        .map_err(|e| JobError::io(&path, e))
}
