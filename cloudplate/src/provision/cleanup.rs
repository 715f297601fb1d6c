//! Removal of transient local artifacts.
//!
//! Failures here never change the verdict of a run: they are logged and
//! reported as warnings.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// A path that could not be removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupWarning {
    pub path: PathBuf,
    pub reason: String,
}

impl std::fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to remove {}: {}", self.path.display(), self.reason)
    }
}

/// What a cleanup pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub removed: Vec<PathBuf>,
    pub warnings: Vec<CleanupWarning>,
}

/// Remove exactly `paths`. Already-missing files are skipped silently.
pub fn remove_artifacts<'p, I>(paths: I) -> CleanupSummary
where
    I: IntoIterator<Item = &'p Path>,
{
    let mut summary = CleanupSummary::default();

    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed artifact");
                summary.removed.push(path.to_path_buf());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), "Cleanup failed: {}", e);
                summary.warnings.push(CleanupWarning {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }
    }

    summary
}
