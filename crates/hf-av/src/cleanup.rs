//! Best-effort removal of files left behind by a segmenting job.
//!
//! Everything in the output's directory whose name contains the output stem
//! (case-insensitive) goes: the manifest itself and every segment. Nothing
//! here ever fails the caller; problems are logged and reported.

use std::io;
use std::path::{Path, PathBuf};

use hf_media::hls::naming::output_stem;
use serde::Serialize;

/// A file that could not be removed.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of one cleanup pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub deleted: Vec<PathBuf>,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Delete every file belonging to `output_path` from its directory.
pub fn cleanup_partial(output_path: &Path) -> CleanupReport {
    cleanup_partial_with(output_path, |path| std::fs::remove_file(path))
}

/// [`cleanup_partial`] with a caller-supplied delete function.
pub fn cleanup_partial_with<F>(output_path: &Path, mut remove: F) -> CleanupReport
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let mut report = CleanupReport::default();

    let stem = output_stem(output_path).to_lowercase();
    if stem.is_empty() {
        return report;
    }

    let dir = match output_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return report,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to list transcode directory");
            report.failures.push(CleanupFailure {
                path: dir.to_path_buf(),
                message: e.to_string(),
            });
            return report;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Failed to read directory entry");
                continue;
            }
        };

        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_lowercase();
        if !name.contains(&stem) {
            continue;
        }

        let path = entry.path();
        match remove(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Deleted partial transcode file");
                report.deleted.push(path);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to delete partial transcode file");
                report.failures.push(CleanupFailure {
                    path,
                    message: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        output = %output_path.display(),
        deleted = report.deleted.len(),
        failed = report.failures.len(),
        "Partial transcode cleanup finished"
    );

    report
}
