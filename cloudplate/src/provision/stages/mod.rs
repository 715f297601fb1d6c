//! Provisioning stages.
//!
//! Each stage does one step and records its output on the context. The
//! pipeline runs them strictly in order; the state a stage names in
//! `completes` is entered only once it returns `Ok`.
//!
//! ```text
//! Validate → Acquire → Normalize → Create → Import → Confirm → Configure
//! ```

mod acquire;
mod configure;
mod create;
mod import;
mod normalize;
mod validate;

pub use acquire::AcquireStage;
pub use configure::ConfigureStage;
pub use create::CreateStage;
pub use import::{ConfirmStage, ImportStage};
pub use normalize::NormalizeStage;
pub use validate::ValidateStage;

use super::context::ProvisionContext;
use super::error::ProvisionError;
use super::state::ProvisionState;
use async_trait::async_trait;

#[async_trait]
pub trait ProvisionStage: Send + Sync {
    fn name(&self) -> &'static str;

    /// State the run enters when this stage succeeds.
    fn completes(&self) -> ProvisionState;

    async fn run(&self, ctx: &mut ProvisionContext<'_>) -> Result<(), ProvisionError>;
}

/// The fixed stage sequence up to `Configured`.
pub fn default_stages() -> Vec<Box<dyn ProvisionStage>> {
    vec![
        Box::new(ValidateStage),
        Box::new(AcquireStage),
        Box::new(NormalizeStage),
        Box::new(CreateStage),
        Box::new(ImportStage),
        Box::new(ConfirmStage),
        Box::new(ConfigureStage),
    ]
}
