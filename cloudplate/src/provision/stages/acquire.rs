//! Stage 2: Fill or reuse the cache slot for the source image.

use super::ProvisionStage;
use crate::images::ImageCache;
use crate::provision::context::ProvisionContext;
use crate::provision::error::ProvisionError;
use crate::provision::state::ProvisionState;
use async_trait::async_trait;

pub struct AcquireStage;

#[async_trait]
impl ProvisionStage for AcquireStage {
    fn name(&self) -> &'static str {
        "acquire"
    }

    fn completes(&self) -> ProvisionState {
        ProvisionState::Normalizing
    }

    async fn run(&self, ctx: &mut ProvisionContext<'_>) -> Result<(), ProvisionError> {
        let source = &ctx.request()?.source;
        let dest = ctx.layout.source_path(source.file_name());

        let artifact = ImageCache::new(ctx.executor, ctx.commands)
            .acquire(source, &dest)
            .await?;

        ctx.source = Some(artifact);
        Ok(())
    }
}
