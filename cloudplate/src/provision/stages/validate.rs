//! Stage 1: Validate the request and allocate the instance identifier.

use super::ProvisionStage;
use crate::provision::context::ProvisionContext;
use crate::provision::error::ProvisionError;
use crate::provision::state::ProvisionState;
use crate::source::ProvisionRequest;
use crate::vmid::VmidAllocator;
use async_trait::async_trait;

pub struct ValidateStage;

#[async_trait]
impl ProvisionStage for ValidateStage {
    fn name(&self) -> &'static str {
        "validate"
    }

    fn completes(&self) -> ProvisionState {
        ProvisionState::Acquiring
    }

    async fn run(&self, ctx: &mut ProvisionContext<'_>) -> Result<(), ProvisionError> {
        let request = ProvisionRequest::new(&ctx.url, ctx.storage.as_str())?;

        let vmid = VmidAllocator::new(ctx.executor, ctx.commands, &ctx.options.vmid)
            .allocate()
            .await?;

        tracing::info!(
            vmid,
            source = %request.source,
            storage = %request.storage,
            "Request validated"
        );

        ctx.request = Some(request);
        ctx.vmid = Some(vmid);
        Ok(())
    }
}
