//! Stage 4: Create the empty instance on the host.

use super::ProvisionStage;
use crate::provision::context::ProvisionContext;
use crate::provision::error::ProvisionError;
use crate::provision::state::ProvisionState;
use async_trait::async_trait;

pub struct CreateStage;

#[async_trait]
impl ProvisionStage for CreateStage {
    fn name(&self) -> &'static str {
        "create"
    }

    fn completes(&self) -> ProvisionState {
        ProvisionState::Created
    }

    async fn run(&self, ctx: &mut ProvisionContext<'_>) -> Result<(), ProvisionError> {
        let vmid = ctx.vmid()?;

        let outcome = ctx
            .executor
            .execute(&ctx.commands.create_vm(vmid, &ctx.options.vm))
            .await;
        if !outcome.ok {
            return Err(ProvisionError::InstanceCreateFailed {
                vmid,
                diagnostic: outcome.diagnostic,
            });
        }

        tracing::info!(vmid, name = %ctx.options.vm.instance_name(vmid), "Instance created");
        Ok(())
    }
}
