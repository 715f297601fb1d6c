//! Image acquisition with an idempotent cache slot.

use super::{ArtifactKind, ImageArtifact, non_empty_file_size};
use crate::host::{CommandExecutor, HostCommands};
use crate::provision::ProvisionError;
use crate::source::SourceLocator;
use cloudplate_shared::errors::CloudplateError;
use std::path::Path;

/// Ensures a source image exists locally, skipping redundant transfers.
///
/// Only the file size is checked; content type and checksum are not.
pub struct ImageCache<'a> {
    executor: &'a dyn CommandExecutor,
    commands: &'a HostCommands,
}

impl<'a> ImageCache<'a> {
    pub fn new(executor: &'a dyn CommandExecutor, commands: &'a HostCommands) -> Self {
        Self { executor, commands }
    }

    /// Return the cached image at `dest`, fetching it first if needed.
    ///
    /// A zero-byte or missing file is fetched (and overwritten).
    pub async fn acquire(
        &self,
        source: &SourceLocator,
        dest: &Path,
    ) -> Result<ImageArtifact, ProvisionError> {
        if let Some(size) = non_empty_file_size(dest) {
            tracing::info!(
                image = %source.file_name(),
                path = %dest.display(),
                size,
                "Image already cached, skipping download"
            );
            return Ok(ImageArtifact::new(dest, size, ArtifactKind::Source));
        }

        if dest.exists() {
            tracing::info!(
                path = %dest.display(),
                "Cached image is empty (interrupted transfer?), fetching again"
            );
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CloudplateError::Storage(format!(
                    "Failed to create cache directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        tracing::info!(
            url = %source,
            path = %dest.display(),
            "Downloading {}",
            source.file_name()
        );

        let outcome = self
            .executor
            .execute(&self.commands.fetch(source.as_str(), dest))
            .await;

        if !outcome.ok {
            return Err(ProvisionError::AcquisitionFailed {
                url: source.to_string(),
                diagnostic: outcome.diagnostic,
            });
        }

        let size = non_empty_file_size(dest).ok_or_else(|| ProvisionError::AcquisitionFailed {
            url: source.to_string(),
            diagnostic: format!("transfer left no data at {}", dest.display()),
        })?;

        tracing::info!(path = %dest.display(), size, "Image downloaded");
        Ok(ImageArtifact::new(dest, size, ArtifactKind::Source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::FakeExecutor;
    use crate::host::{CommandOutcome, HostCommand};
    use crate::runtime::options::HostTools;

    fn source() -> SourceLocator {
        SourceLocator::parse("https://example.com/focal-server-cloudimg-amd64.img").unwrap()
    }

    /// Fetch emulation: write bytes at the `-O` destination.
    fn writes_dest(cmd: &HostCommand) -> CommandOutcome {
        if let Some(pos) = cmd.args.iter().position(|a| a == "-O") {
            std::fs::write(&cmd.args[pos + 1], b"downloaded").unwrap();
        }
        CommandOutcome::success("")
    }

    #[tokio::test]
    async fn test_existing_non_empty_image_is_not_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("focal-server-cloudimg-amd64.img");
        std::fs::write(&dest, b"cached-bytes").unwrap();

        let executor = FakeExecutor::new(writes_dest);
        let commands = HostCommands::new(HostTools::default());
        let artifact = ImageCache::new(&executor, &commands)
            .acquire(&source(), &dest)
            .await
            .unwrap();

        assert!(executor.calls().is_empty());
        assert_eq!(artifact.size, 12);
        assert_eq!(artifact.kind, ArtifactKind::Source);
        assert_eq!(std::fs::read(&dest).unwrap(), b"cached-bytes");
    }

    #[tokio::test]
    async fn test_zero_byte_image_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("focal-server-cloudimg-amd64.img");
        std::fs::write(&dest, b"").unwrap();

        let executor = FakeExecutor::new(writes_dest);
        let commands = HostCommands::new(HostTools::default());
        let artifact = ImageCache::new(&executor, &commands)
            .acquire(&source(), &dest)
            .await
            .unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "wget");
        assert_eq!(artifact.size, "downloaded".len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), b"downloaded");
    }

    #[tokio::test]
    async fn test_missing_image_is_fetched_into_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("images/nested/focal.img");

        let executor = FakeExecutor::new(writes_dest);
        let commands = HostCommands::new(HostTools::default());
        ImageCache::new(&executor, &commands)
            .acquire(&source(), &dest)
            .await
            .unwrap();

        assert_eq!(executor.calls().len(), 1);
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn test_fetch_failure_reports_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("focal.img");

        let executor = FakeExecutor::new(|_| CommandOutcome::failure("404 Not Found"));
        let commands = HostCommands::new(HostTools::default());
        let err = ImageCache::new(&executor, &commands)
            .acquire(&source(), &dest)
            .await
            .unwrap_err();

        match err {
            ProvisionError::AcquisitionFailed { url, diagnostic } => {
                assert!(url.ends_with("focal-server-cloudimg-amd64.img"));
                assert_eq!(diagnostic, "404 Not Found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_successful_fetch_without_data_fails() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("focal.img");

        let executor = FakeExecutor::ok();
        let commands = HostCommands::new(HostTools::default());
        let err = ImageCache::new(&executor, &commands)
            .acquire(&source(), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::AcquisitionFailed { .. }));
    }
}
