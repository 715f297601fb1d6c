//! Shared state threaded through the provisioning stages.

use super::error::ProvisionError;
use crate::cloudinit::GuestDocument;
use crate::host::{CommandExecutor, HostCommands};
use crate::images::ImageArtifact;
use crate::runtime::layout::WorkLayout;
use crate::runtime::options::CloudplateOptions;
use crate::source::ProvisionRequest;
use cloudplate_shared::errors::CloudplateError;
use tokio_util::sync::CancellationToken;

/// Collaborators and accumulated results of one run.
///
/// Each stage reads what earlier stages produced and fills in its own
/// output. Reading an output before its stage ran is an internal error.
pub struct ProvisionContext<'a> {
    pub executor: &'a dyn CommandExecutor,
    pub commands: &'a HostCommands,
    pub options: &'a CloudplateOptions,
    pub layout: &'a WorkLayout,
    pub cancel: &'a CancellationToken,

    /// Raw locator and storage as given by the caller.
    pub url: String,
    pub storage: String,

    pub request: Option<ProvisionRequest>,
    pub vmid: Option<u32>,
    pub source: Option<ImageArtifact>,
    pub normalized: Option<ImageArtifact>,
    pub guest_document: Option<GuestDocument>,
    /// Volume id confirmed on the storage.
    pub volume: Option<String>,
}

impl<'a> ProvisionContext<'a> {
    pub fn new(
        executor: &'a dyn CommandExecutor,
        commands: &'a HostCommands,
        options: &'a CloudplateOptions,
        layout: &'a WorkLayout,
        cancel: &'a CancellationToken,
        url: impl Into<String>,
        storage: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            commands,
            options,
            layout,
            cancel,
            url: url.into(),
            storage: storage.into(),
            request: None,
            vmid: None,
            source: None,
            normalized: None,
            guest_document: None,
            volume: None,
        }
    }

    pub fn request(&self) -> Result<&ProvisionRequest, ProvisionError> {
        self.request.as_ref().ok_or_else(|| missing("request"))
    }

    pub fn vmid(&self) -> Result<u32, ProvisionError> {
        self.vmid.ok_or_else(|| missing("vmid"))
    }

    pub fn source(&self) -> Result<&ImageArtifact, ProvisionError> {
        self.source.as_ref().ok_or_else(|| missing("source image"))
    }

    pub fn normalized(&self) -> Result<&ImageArtifact, ProvisionError> {
        self.normalized.as_ref().ok_or_else(|| missing("normalized image"))
    }

    pub fn guest_document(&self) -> Result<&GuestDocument, ProvisionError> {
        self.guest_document
            .as_ref()
            .ok_or_else(|| missing("guest document"))
    }

    pub fn volume(&self) -> Result<&str, ProvisionError> {
        self.volume.as_deref().ok_or_else(|| missing("confirmed volume"))
    }
}

fn missing(what: &str) -> ProvisionError {
    ProvisionError::Runtime(CloudplateError::Internal(format!(
        "{} not available: producing stage has not run",
        what
    )))
}
