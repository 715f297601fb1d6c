//! Stages 5 and 6: Import the normalized disk and confirm it landed.

use super::ProvisionStage;
use crate::provision::context::ProvisionContext;
use crate::provision::error::ProvisionError;
use crate::provision::state::ProvisionState;
use crate::storage::ImportPoller;
use async_trait::async_trait;

/// Issues the import. Success only means the host accepted it.
pub struct ImportStage;

#[async_trait]
impl ProvisionStage for ImportStage {
    fn name(&self) -> &'static str {
        "import"
    }

    fn completes(&self) -> ProvisionState {
        ProvisionState::DiskImporting
    }

    async fn run(&self, ctx: &mut ProvisionContext<'_>) -> Result<(), ProvisionError> {
        let vmid = ctx.vmid()?;
        let storage = &ctx.request()?.storage;

        let outcome = ctx
            .executor
            .execute(&ctx.commands.import_disk(vmid, ctx.normalized()?.path(), storage))
            .await;
        if !outcome.ok {
            return Err(ProvisionError::ImportFailed {
                vmid,
                diagnostic: outcome.diagnostic,
            });
        }

        tracing::info!(vmid, storage = %storage, "Disk import accepted");
        Ok(())
    }
}

/// Waits for the imported volume to be listed on the storage.
pub struct ConfirmStage;

#[async_trait]
impl ProvisionStage for ConfirmStage {
    fn name(&self) -> &'static str {
        "confirm_import"
    }

    fn completes(&self) -> ProvisionState {
        ProvisionState::DiskConfirmed
    }

    async fn run(&self, ctx: &mut ProvisionContext<'_>) -> Result<(), ProvisionError> {
        let vmid = ctx.vmid()?;
        let storage = &ctx.request()?.storage;

        let volume = ImportPoller::new(ctx.executor, ctx.commands, &ctx.options.poll)
            .wait_for_volume(vmid, storage, ctx.cancel)
            .await?;

        ctx.volume = Some(volume);
        Ok(())
    }
}
