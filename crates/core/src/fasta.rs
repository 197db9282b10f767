// crates/core/src/fasta.rs
//! Minimal FASTA record parser.
//!
//! Handles the subset the fold job needs: `>` header lines with the
//! record id as the first whitespace-delimited token, sequence lines
//! concatenated until the next header, blank lines ignored.

use std::fs;
use std::path::Path;

use crate::error::FastaError;

/// One sequence record from a FASTA file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub id: String,
    pub sequence: String,
}

/// Parse every record in the file at `path`.
///
/// A file with no records at all is an error; the caller submitted it
/// for per-sequence analysis, so an empty parse means bad input.
pub fn parse_file(path: &Path) -> Result<Vec<FastaRecord>, FastaError> {
    let text = fs::read_to_string(path).map_err(|e| FastaError::io(path, e))?;
    parse_str(&text, path)
}

fn parse_str(text: &str, path: &Path) -> Result<Vec<FastaRecord>, FastaError> {
    let mut records: Vec<FastaRecord> = Vec::new();
    let mut current: Option<FastaRecord> = None;

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('>') {
            if let Some(record) = current.take() {
                records.push(record);
            }
            let id = header.split_whitespace().next().unwrap_or("").to_string();
            current = Some(FastaRecord {
                id,
                sequence: String::new(),
            });
        } else {
            match current.as_mut() {
                Some(record) => record.sequence.push_str(line),
                None => {
                    return Err(FastaError::MissingHeader {
                        path: path.to_path_buf(),
                        line: index + 1,
                    })
                }
            }
        }
    }
    if let Some(record) = current.take() {
        records.push(record);
    }

    if records.is_empty() {
        return Err(FastaError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(records)
}
