// crates/core/src/archive.rs
//! Result-archive builder.
//!
//! Walks a task's output directory and packs it into a single zip,
//! skipping transient files (locks, logs, swap, temp) and scratch
//! directories. Entry names are relative to the walked root and sorted,
//! so re-archiving the same tree yields the same archive.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArchiveError;

/// Which files and directories are left out of the archive.
///
/// This is policy, not mechanism: job kinds can extend the defaults
/// (e.g. keep logs for a kind whose log is the product).
#[derive(Debug, Clone)]
pub struct ArchivePolicy {
    /// Directory names skipped entirely, at any depth.
    pub excluded_dirs: Vec<String>,
    /// File-name suffixes skipped wherever they appear.
    pub excluded_suffixes: Vec<String>,
}

impl Default for ArchivePolicy {
    fn default() -> Self {
        Self {
            excluded_dirs: vec!["tmp".into(), "temp".into(), ".cache".into()],
            excluded_suffixes: vec![".tmp".into(), ".log".into(), ".lock".into(), ".swp".into()],
        }
    }
}

impl ArchivePolicy {
    fn skips_dir(&self, name: &str) -> bool {
        self.excluded_dirs.iter().any(|d| d == name)
    }

    fn skips_file(&self, name: &str) -> bool {
        self.excluded_suffixes.iter().any(|s| name.ends_with(s.as_str()))
    }
}

/// Build a zip archive of `root` at `dest`, applying `policy`.
///
/// Overwrites any prior archive at `dest`. Returns the number of
/// entries written.
pub fn build_archive(
    root: &Path,
    dest: &Path,
    policy: &ArchivePolicy,
) -> Result<usize, ArchiveError> {
    let mut files = collect_files(root, policy)?;
    // Walk order is filesystem-dependent; sort for a reproducible archive.
    files.sort();

    let out = File::create(dest).map_err(|e| ArchiveError::io(dest, e))?;
    let mut zip = ZipWriter::new(out);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in &files {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let name = entry_name(relative);
        zip.start_file(&name, options).map_err(|e| ArchiveError::Zip {
            path: path.clone(),
            source: e,
        })?;
        let mut input = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
        io::copy(&mut input, &mut zip).map_err(|e| ArchiveError::io(path, e))?;
    }

    zip.finish().map_err(|e| ArchiveError::Zip {
        path: dest.to_path_buf(),
        source: e,
    })?;
    Ok(files.len())
}

fn collect_files(root: &Path, policy: &ArchivePolicy) -> Result<Vec<PathBuf>, ArchiveError> {
    if !root.is_dir() {
        return Err(ArchiveError::RootNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        !(entry.file_type().is_dir() && policy.skips_dir(&name))
    });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            match e.into_io_error() {
                Some(io_err) => ArchiveError::io(path, io_err),
                None => ArchiveError::RootNotFound { path },
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if policy.skips_file(&name) {
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

/// Zip entry names use forward slashes regardless of platform.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
