//! Conversion of acquired images into the importable disk form.

use super::image::{DiskFormat, parse_size};
use super::qcow2::Qcow2Header;
use crate::host::{CommandExecutor, HostCommands};
use crate::images::{ArtifactKind, ImageArtifact, non_empty_file_size};
use crate::provision::ProvisionError;
use std::path::Path;

/// Converts a source image to qcow2 and grows it to the requested capacity.
///
/// The source artifact is only read.
pub struct Normalizer<'a> {
    executor: &'a dyn CommandExecutor,
    commands: &'a HostCommands,
}

impl<'a> Normalizer<'a> {
    pub fn new(executor: &'a dyn CommandExecutor, commands: &'a HostCommands) -> Self {
        Self { executor, commands }
    }

    /// Produce `target` from `source`.
    ///
    /// `disk_size` of `None` skips the resize. A target smaller than the
    /// image's current virtual size is never applied.
    pub async fn normalize(
        &self,
        source: &ImageArtifact,
        target: &Path,
        disk_size: Option<&str>,
    ) -> Result<ImageArtifact, ProvisionError> {
        tracing::info!(
            source = %source.path.display(),
            target = %target.display(),
            guessed_format = ?DiskFormat::from_path(&source.path),
            "Converting image to {}",
            DiskFormat::Qcow2
        );

        let outcome = self
            .executor
            .execute(&self.commands.convert_to_qcow2(&source.path, target))
            .await;
        if !outcome.ok {
            return Err(ProvisionError::ConversionFailed {
                path: source.path.clone(),
                diagnostic: outcome.diagnostic,
            });
        }

        if let Some(size) = disk_size {
            self.grow(target, size).await?;
        }

        let size = non_empty_file_size(target).ok_or_else(|| ProvisionError::ConversionFailed {
            path: source.path.clone(),
            diagnostic: format!("conversion left no image at {}", target.display()),
        })?;

        Ok(ImageArtifact::new(target, size, ArtifactKind::Normalized))
    }

    async fn grow(&self, image: &Path, size: &str) -> Result<(), ProvisionError> {
        let requested = parse_size(size).map_err(|e| ProvisionError::ResizeFailed {
            path: image.to_path_buf(),
            size: size.to_string(),
            diagnostic: e.to_string(),
        })?;

        match Qcow2Header::read(image) {
            Ok(header) if header.size >= requested => {
                tracing::info!(
                    path = %image.display(),
                    virtual_size = header.size,
                    requested,
                    "Image already at or above requested size, skipping resize"
                );
                return Ok(());
            }
            Ok(header) => {
                tracing::info!(
                    path = %image.display(),
                    virtual_size = header.size,
                    requested,
                    "Growing image to {}",
                    size
                );
            }
            Err(e) => {
                // Without --shrink, qemu-img refuses to shrink on its own.
                tracing::warn!(
                    path = %image.display(),
                    "Could not read image header ({}), resizing to {} anyway",
                    e,
                    size
                );
            }
        }

        let outcome = self
            .executor
            .execute(&self.commands.resize(image, &requested.to_string()))
            .await;
        if !outcome.ok {
            return Err(ProvisionError::ResizeFailed {
                path: image.to_path_buf(),
                size: size.to_string(),
                diagnostic: outcome.diagnostic,
            });
        }

        Ok(())
    }
}
