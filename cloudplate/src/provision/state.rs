//! Provisioning run state machine.
//!
//! Defines the states of one run and the valid transitions between them.

use cloudplate_shared::errors::{CloudplateError, CloudplateResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a provisioning run.
///
/// ```text
/// Validating → Acquiring → Normalizing → ConfigGenerated → Created
///   → DiskImporting → DiskConfirmed → Configured → CleanedUp
///
/// any non-terminal state → Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionState {
    /// Checking the source locator and allocating the identifier.
    Validating,
    /// Filling or reusing the local cache slot.
    Acquiring,
    /// Converting (and growing) the acquired image.
    Normalizing,
    /// Normalized image and guest document exist locally.
    ConfigGenerated,
    /// Empty instance exists on the host.
    Created,
    /// Import accepted; the host may still be completing it.
    DiskImporting,
    /// Imported volume observed on the storage backend.
    DiskConfirmed,
    /// Every attribute applied; the template is usable.
    Configured,
    /// Transient local artifacts removed. Terminal.
    CleanedUp,
    /// A step failed. Terminal; host-side changes are left in place.
    Aborted,
}

impl ProvisionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProvisionState::CleanedUp | ProvisionState::Aborted)
    }

    /// Host objects exist for this run.
    pub fn has_host_object(&self) -> bool {
        matches!(
            self,
            ProvisionState::Created
                | ProvisionState::DiskImporting
                | ProvisionState::DiskConfirmed
                | ProvisionState::Configured
                | ProvisionState::CleanedUp
        )
    }

    /// The single forward successor, if any.
    pub fn next(&self) -> Option<ProvisionState> {
        use ProvisionState::*;
        match self {
            Validating => Some(Acquiring),
            Acquiring => Some(Normalizing),
            Normalizing => Some(ConfigGenerated),
            ConfigGenerated => Some(Created),
            Created => Some(DiskImporting),
            DiskImporting => Some(DiskConfirmed),
            DiskConfirmed => Some(Configured),
            Configured => Some(CleanedUp),
            CleanedUp | Aborted => None,
        }
    }

    /// Check if transition to target state is valid.
    pub fn can_transition_to(&self, target: ProvisionState) -> bool {
        if self.is_terminal() {
            return false;
        }
        target == ProvisionState::Aborted || self.next() == Some(target)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionState::Validating => "validating",
            ProvisionState::Acquiring => "acquiring",
            ProvisionState::Normalizing => "normalizing",
            ProvisionState::ConfigGenerated => "config_generated",
            ProvisionState::Created => "created",
            ProvisionState::DiskImporting => "disk_importing",
            ProvisionState::DiskConfirmed => "disk_confirmed",
            ProvisionState::Configured => "configured",
            ProvisionState::CleanedUp => "cleaned_up",
            ProvisionState::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: ProvisionState,
    pub to: ProvisionState,
    pub at: DateTime<Utc>,
}

/// State of one run with its transition history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionRun {
    state: ProvisionState,
    transitions: Vec<StateTransition>,
}

impl ProvisionRun {
    pub fn new() -> Self {
        Self {
            state: ProvisionState::Validating,
            transitions: Vec::new(),
        }
    }

    pub fn state(&self) -> ProvisionState {
        self.state
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Last state entered before `Aborted`, or the current state.
    pub fn last_reached(&self) -> ProvisionState {
        if self.state == ProvisionState::Aborted {
            self.transitions
                .last()
                .map(|t| t.from)
                .unwrap_or(ProvisionState::Validating)
        } else {
            self.state
        }
    }

    /// Attempt state transition with validation.
    pub fn transition_to(&mut self, target: ProvisionState) -> CloudplateResult<()> {
        if !self.state.can_transition_to(target) {
            return Err(CloudplateError::InvalidState(format!(
                "Cannot transition from {} to {}",
                self.state, target
            )));
        }

        tracing::debug!(from = %self.state, to = %target, "Provision state transition");

        self.transitions.push(StateTransition {
            from: self.state,
            to: target,
            at: Utc::now(),
        });
        self.state = target;
        Ok(())
    }
}

impl Default for ProvisionRun {
    fn default() -> Self {
        Self::new()
    }
}
