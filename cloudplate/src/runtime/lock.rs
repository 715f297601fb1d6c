//! Run lock serializing provisioning runs against one host.
//!
//! Identifiers are allocated by inspecting host state, which is only safe if
//! no other run mutates the host in between. Uses `flock` on a file in the
//! work directory so only one runtime can drive the host at a time.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use cloudplate_shared::errors::{CloudplateError, CloudplateResult};

/// A lock guard that holds an exclusive lock on the work directory.
///
/// Released when this guard is dropped, or when the process exits/crashes.
#[derive(Debug)]
pub struct RunLock {
    #[allow(dead_code)] // Held for lifetime, not directly accessed
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Attempt to acquire an exclusive lock on `lock_path`.
    ///
    /// # Returns
    /// * `Ok(RunLock)` - Successfully acquired lock
    /// * `Err(CloudplateError::Locked)` - Another run holds the lock
    pub fn acquire(lock_path: &Path) -> CloudplateResult<Self> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CloudplateError::Storage(format!("failed to create lock dir: {}", e))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|e| CloudplateError::Storage(format!("failed to open lock file: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let fd = file.as_raw_fd();
            let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };

            if result != 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::WouldBlock {
                    return Err(CloudplateError::Locked(format!(
                        "Another provisioning run is using {}\n\
                         Runs against the same host are serialized; wait for it to finish.",
                        lock_path.display()
                    )));
                } else {
                    return Err(CloudplateError::Storage(format!(
                        "failed to acquire lock: {}",
                        err
                    )));
                }
            }
        }

        tracing::debug!(lock_path = %lock_path.display(), "Acquired run lock");

        Ok(RunLock {
            file,
            path: lock_path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            let fd = self.file.as_raw_fd();
            unsafe {
                libc::flock(fd, libc::LOCK_UN);
            }
        }

        tracing::debug!(lock_path = %self.path.display(), "Released run lock");
    }
}
