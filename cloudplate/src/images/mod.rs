//! Local image cache and artifacts.
//!
//! - `ImageCache` - Fills or reuses the cache slot for a source image
//! - `ImageArtifact` - A path plus size, either as acquired or normalized

mod cache;

pub use cache::ImageCache;

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Which side of normalization an artifact is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// As acquired: arbitrary format and extension.
    Source,
    /// Converted to qcow2, optionally grown.
    Normalized,
}

/// An image file owned by one run.
///
/// Removed at cleanup on success; left in place on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageArtifact {
    pub path: PathBuf,
    pub size: u64,
    pub kind: ArtifactKind,
}

impl ImageArtifact {
    pub fn new(path: impl Into<PathBuf>, size: u64, kind: ArtifactKind) -> Self {
        Self {
            path: path.into(),
            size,
            kind,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Size of a regular, non-empty file at `path`.
///
/// Zero-byte files (left by an aborted transfer) count as absent.
pub(crate) fn non_empty_file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .ok()
        .filter(|m| m.is_file() && m.len() > 0)
        .map(|m| m.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.img");
        let full = dir.path().join("full.img");
        std::fs::write(&empty, b"").unwrap();
        std::fs::write(&full, b"disk").unwrap();

        assert_eq!(non_empty_file_size(&empty), None);
        assert_eq!(non_empty_file_size(&full), Some(4));
        assert_eq!(non_empty_file_size(&dir.path().join("missing.img")), None);
        assert_eq!(non_empty_file_size(dir.path()), None);
    }
}
