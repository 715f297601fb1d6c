//! Result of a successful run.

use super::cleanup::CleanupWarning;
use super::state::{ProvisionState, StateTransition};
use serde::Serialize;
use std::path::PathBuf;

/// Everything a caller needs to find and trust the new template.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    pub vmid: u32,
    pub name: String,
    pub storage: String,
    pub source: String,
    /// Volume id confirmed on the storage.
    pub volume: String,
    pub template: bool,
    pub state: ProvisionState,
    pub transitions: Vec<StateTransition>,
    /// Persistent guest document referenced by the template, if any.
    pub guest_document: Option<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub cleanup_warnings: Vec<CleanupWarning>,
}

impl ProvisionReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
