//! VM template provisioning.
//!
//! ## Architecture
//!
//! One run is a fixed sequence of stages executed by `ProvisionPipeline`:
//!
//! ```text
//! 1. Validate ──→ 2. Acquire ──→ 3. Normalize ──→ 4. Create
//!        ──→ 5. Import ──→ 6. Confirm ──→ 7. Configure ──→ Cleanup
//! ```
//!
//! Each successful stage advances the `ProvisionState` of the run. The
//! first failure aborts the run; host-side changes are left in place.

mod cleanup;
mod context;
mod error;
mod pipeline;
mod report;
mod stages;
mod state;

pub use cleanup::{CleanupSummary, CleanupWarning, remove_artifacts};
pub use context::ProvisionContext;
pub use error::{ProvisionAbort, ProvisionError, exit_codes};
pub use pipeline::ProvisionPipeline;
pub use report::ProvisionReport;
pub use stages::{ProvisionStage, default_stages};
pub use state::{ProvisionRun, ProvisionState, StateTransition};
