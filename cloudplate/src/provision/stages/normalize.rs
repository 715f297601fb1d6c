//! Stage 3: Normalize the image and write the guest document.

use super::ProvisionStage;
use crate::cloudinit::write_guest_config;
use crate::disk::Normalizer;
use crate::provision::context::ProvisionContext;
use crate::provision::error::ProvisionError;
use crate::provision::state::ProvisionState;
use async_trait::async_trait;

pub struct NormalizeStage;

#[async_trait]
impl ProvisionStage for NormalizeStage {
    fn name(&self) -> &'static str {
        "normalize"
    }

    fn completes(&self) -> ProvisionState {
        ProvisionState::ConfigGenerated
    }

    async fn run(&self, ctx: &mut ProvisionContext<'_>) -> Result<(), ProvisionError> {
        let vmid = ctx.vmid()?;
        let target = ctx.layout.normalized_path(vmid);

        let normalized = Normalizer::new(ctx.executor, ctx.commands)
            .normalize(ctx.source()?, &target, ctx.options.vm.disk_size.as_deref())
            .await?;
        ctx.normalized = Some(normalized);

        let document = write_guest_config(&ctx.options.guest, vmid, &ctx.layout.images_dir())?;
        ctx.guest_document = Some(document);
        Ok(())
    }
}
