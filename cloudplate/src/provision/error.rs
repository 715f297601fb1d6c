//! Run-level error taxonomy.
//!
//! Every variant is terminal for the run that raised it. Variants carry the
//! step context and the captured command diagnostic so a failure can be
//! diagnosed without rerunning:
//! ```ignore
//! match cloudplate.provision(url, storage, &cancel).await {
//!     Err(abort) if matches!(abort.error, ProvisionError::ImportTimedOut { .. }) => {
//!         // instance exists on the host in `Created` state
//!     }
//!     _ => {}
//! }
//! ```

use super::state::ProvisionState;
use cloudplate_shared::errors::CloudplateError;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Process exit codes, one per failure class.
pub mod exit_codes {
    pub const RUNTIME: i32 = 1;
    pub const INVALID_SOURCE: i32 = 2;
    pub const ACQUISITION: i32 = 3;
    pub const CONVERSION: i32 = 4;
    pub const INSTANCE_CREATE: i32 = 5;
    pub const IMPORT: i32 = 6;
    pub const IMPORT_TIMEOUT: i32 = 7;
    pub const CONFIGURATION: i32 = 8;
    pub const GUEST_CONFIG: i32 = 9;
    pub const IDENTIFIER: i32 = 10;
    pub const CANCELLED: i32 = 130;
}

// ============================================================================
// Provision Error
// ============================================================================

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Locator rejected by the validator.
    #[error("invalid source locator '{locator}': expected scheme, host and a .img/.qcow2/.raw path")]
    InvalidSource { locator: String },

    /// Transfer command failed.
    #[error("failed to fetch {url}: {diagnostic}")]
    AcquisitionFailed { url: String, diagnostic: String },

    #[error("failed to convert {} to qcow2: {diagnostic}", path.display())]
    ConversionFailed { path: PathBuf, diagnostic: String },

    #[error("failed to resize {} to {size}: {diagnostic}", path.display())]
    ResizeFailed {
        path: PathBuf,
        size: String,
        diagnostic: String,
    },

    /// Guest bootstrap document refused or not writable.
    #[error("guest config: {reason}")]
    GuestConfigFailed { reason: String },

    /// No usable instance identifier.
    #[error("no instance identifier available: {reason}")]
    IdentifierUnavailable { reason: String },

    #[error("failed to create instance {vmid}: {diagnostic}")]
    InstanceCreateFailed { vmid: u32, diagnostic: String },

    /// The import command itself failed.
    #[error("failed to import disk for instance {vmid}: {diagnostic}")]
    ImportFailed { vmid: u32, diagnostic: String },

    /// The import command succeeded but the volume never showed up.
    #[error(
        "volume {volume} did not appear on storage {storage} after {attempts} attempts (instance {vmid})"
    )]
    ImportTimedOut {
        vmid: u32,
        storage: String,
        volume: String,
        attempts: u32,
    },

    /// An attribute-set command failed; later attributes were not attempted.
    #[error("failed to configure instance {vmid} ({step}): {diagnostic}")]
    ConfigurationStepFailed {
        vmid: u32,
        step: &'static str,
        diagnostic: String,
    },

    #[error("cancelled while {state}")]
    Cancelled { state: ProvisionState },

    #[error(transparent)]
    Runtime(#[from] CloudplateError),
}

impl ProvisionError {
    /// Exit code for automation, distinct per failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProvisionError::InvalidSource { .. } => exit_codes::INVALID_SOURCE,
            ProvisionError::AcquisitionFailed { .. } => exit_codes::ACQUISITION,
            ProvisionError::ConversionFailed { .. } | ProvisionError::ResizeFailed { .. } => {
                exit_codes::CONVERSION
            }
            ProvisionError::GuestConfigFailed { .. } => exit_codes::GUEST_CONFIG,
            ProvisionError::IdentifierUnavailable { .. } => exit_codes::IDENTIFIER,
            ProvisionError::InstanceCreateFailed { .. } => exit_codes::INSTANCE_CREATE,
            ProvisionError::ImportFailed { .. } => exit_codes::IMPORT,
            ProvisionError::ImportTimedOut { .. } => exit_codes::IMPORT_TIMEOUT,
            ProvisionError::ConfigurationStepFailed { .. } => exit_codes::CONFIGURATION,
            ProvisionError::Cancelled { .. } => exit_codes::CANCELLED,
            ProvisionError::Runtime(_) => exit_codes::RUNTIME,
        }
    }
}

// ============================================================================
// Abort
// ============================================================================

/// A run that ended in `Aborted`.
///
/// Nothing applied on the host is undone: `reached` tells the operator how far
/// the host-side state got.
#[derive(Debug, Error)]
#[error("provisioning aborted after reaching {reached}: {error}")]
pub struct ProvisionAbort {
    /// Last state entered before the failure.
    pub reached: ProvisionState,
    /// Identifier, if one was allocated before the failure.
    pub vmid: Option<u32>,
    #[source]
    pub error: ProvisionError,
}

impl ProvisionAbort {
    pub fn exit_code(&self) -> i32 {
        self.error.exit_code()
    }
}
