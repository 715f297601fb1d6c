use cloudplate_shared::constants::names;
use cloudplate_shared::errors::{CloudplateError, CloudplateResult};
use std::path::{Path, PathBuf};

/// Directory structure constants
pub mod dirs {
    /// Base directory name under the user's home
    pub const CLOUDPLATE_DIR: &str = ".cloudplate";

    /// Subdirectory for the image cache and generated artifacts
    pub const IMAGES_DIR: &str = "images";

    /// Subdirectory for log files
    pub const LOGS_DIR: &str = "logs";

    /// Lock file serializing runs against this host
    pub const LOCK_FILE: &str = ".lock";
}

// ============================================================================
// WORK LAYOUT (home directory)
// ============================================================================

/// Filesystem layout of the work directory.
///
/// ```text
/// {home}/
/// ├── .lock
/// ├── images/
/// │   ├── focal-server-cloudimg-amd64.img   # cache slot (source artifact)
/// │   ├── vm-{id}-disk-0.qcow2              # normalized artifact
/// │   └── cloud-init-{id}.yaml              # guest bootstrap document
/// └── logs/
/// ```
#[derive(Clone, Debug)]
pub struct WorkLayout {
    home_dir: PathBuf,
}

impl WorkLayout {
    pub fn new(home_dir: PathBuf) -> Self {
        Self { home_dir }
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    /// Image cache and generated artifacts: {home}/images
    pub fn images_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::IMAGES_DIR)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::LOGS_DIR)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.home_dir.join(dirs::LOCK_FILE)
    }

    /// Cache slot for a source image, keyed by its file name.
    pub fn source_path(&self, file_name: &str) -> PathBuf {
        self.images_dir().join(file_name)
    }

    /// Normalized image for an instance: {home}/images/vm-{id}-disk-0.qcow2
    pub fn normalized_path(&self, vmid: u32) -> PathBuf {
        self.images_dir().join(names::normalized_image(vmid))
    }

    /// Guest bootstrap document kept in the work directory.
    pub fn guest_config_path(&self, vmid: u32) -> PathBuf {
        self.images_dir().join(names::guest_config(vmid))
    }

    /// Create the directory structure.
    pub fn prepare(&self) -> CloudplateResult<()> {
        std::fs::create_dir_all(&self.home_dir)
            .map_err(|e| CloudplateError::Storage(format!("failed to create home: {e}")))?;

        std::fs::create_dir_all(self.images_dir())
            .map_err(|e| CloudplateError::Storage(format!("failed to create images dir: {e}")))?;

        std::fs::create_dir_all(self.logs_dir())
            .map_err(|e| CloudplateError::Storage(format!("failed to create logs dir: {e}")))?;

        tracing::debug!(home = %self.home_dir.display(), "Work directory ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_deterministic() {
        let layout = WorkLayout::new(PathBuf::from("/srv/cp"));

        assert_eq!(layout.images_dir(), PathBuf::from("/srv/cp/images"));
        assert_eq!(
            layout.normalized_path(1032),
            PathBuf::from("/srv/cp/images/vm-1032-disk-0.qcow2")
        );
        assert_eq!(
            layout.guest_config_path(1032),
            PathBuf::from("/srv/cp/images/cloud-init-1032.yaml")
        );
        assert_eq!(
            layout.source_path("focal.img"),
            PathBuf::from("/srv/cp/images/focal.img")
        );
        assert_eq!(layout.lock_path(), PathBuf::from("/srv/cp/.lock"));
    }

    #[test]
    fn test_prepare_creates_dirs() {
        let temp = tempfile::tempdir().unwrap();
        let layout = WorkLayout::new(temp.path().join("home"));

        layout.prepare().unwrap();

        assert!(layout.images_dir().is_dir());
        assert!(layout.logs_dir().is_dir());
        // Idempotent
        layout.prepare().unwrap();
    }
}
