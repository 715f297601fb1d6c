//! Sequential stage runner with state tracking.

use super::cleanup::{CleanupSummary, remove_artifacts};
use super::context::ProvisionContext;
use super::error::{ProvisionAbort, ProvisionError};
use super::report::ProvisionReport;
use super::stages::{ProvisionStage, default_stages};
use super::state::{ProvisionRun, ProvisionState};
use crate::runtime::options::CleanupPolicy;
use std::path::PathBuf;
use std::time::Instant;

/// Runs the stages of one provisioning run in order.
///
/// Fail-fast: the first failing stage moves the run to `Aborted` and nothing
/// applied on the host is undone. Cancellation is observed before each stage
/// and while a stage is in flight; an in-flight host command is killed.
pub struct ProvisionPipeline<'a> {
    ctx: ProvisionContext<'a>,
    run: ProvisionRun,
    stages: Vec<Box<dyn ProvisionStage>>,
}

impl<'a> ProvisionPipeline<'a> {
    pub fn new(ctx: ProvisionContext<'a>) -> Self {
        Self::with_stages(ctx, default_stages())
    }

    pub fn with_stages(ctx: ProvisionContext<'a>, stages: Vec<Box<dyn ProvisionStage>>) -> Self {
        Self {
            ctx,
            run: ProvisionRun::new(),
            stages,
        }
    }

    pub async fn run(mut self) -> Result<ProvisionReport, ProvisionAbort> {
        let started = Instant::now();
        tracing::info!(url = %self.ctx.url, storage = %self.ctx.storage, "Provisioning started");

        let stages = std::mem::take(&mut self.stages);
        for stage in &stages {
            if let Err(error) = self.run_stage(stage.as_ref()).await {
                return Err(self.abort(error));
            }
        }

        match self.finish() {
            Ok(report) => {
                tracing::info!(
                    vmid = report.vmid,
                    volume = %report.volume,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Provisioning completed"
                );
                Ok(report)
            }
            Err(error) => Err(self.abort(error)),
        }
    }

    async fn run_stage(&mut self, stage: &dyn ProvisionStage) -> Result<(), ProvisionError> {
        let cancel = self.ctx.cancel;
        let state = self.run.state();

        if cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled { state });
        }

        let started = Instant::now();
        tracing::debug!(stage = stage.name(), state = %state, "Stage started");

        let result = tokio::select! {
            result = stage.run(&mut self.ctx) => result,
            _ = cancel.cancelled() => Err(ProvisionError::Cancelled { state }),
        };

        if let Err(e) = &result {
            tracing::error!(
                stage = stage.name(),
                vmid = ?self.ctx.vmid,
                "Stage failed: {}",
                e
            );
        }
        result?;

        self.run.transition_to(stage.completes())?;
        tracing::info!(
            stage = stage.name(),
            state = %self.run.state(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Stage completed"
        );
        Ok(())
    }

    /// Cleanup after `Configured` and build the report.
    fn finish(&mut self) -> Result<ProvisionReport, ProvisionError> {
        let vmid = self.ctx.vmid()?;
        let request = self.ctx.request()?;
        let document = self.ctx.guest_document()?;
        let volume = self.ctx.volume()?.to_string();

        let mut paths = vec![
            self.ctx.source()?.path.clone(),
            self.ctx.normalized()?.path.clone(),
        ];
        if !document.persistent {
            paths.push(document.path.clone());
        }

        let CleanupSummary { removed, warnings } =
            remove_artifacts(paths.iter().map(PathBuf::as_path));

        let report = ProvisionReport {
            vmid,
            name: self.ctx.options.vm.instance_name(vmid),
            storage: request.storage.clone(),
            source: request.source.to_string(),
            volume,
            template: self.ctx.options.vm.convert_to_template,
            state: ProvisionState::CleanedUp,
            transitions: Vec::new(),
            guest_document: document.persistent.then(|| document.path.clone()),
            removed,
            cleanup_warnings: warnings,
        };

        self.run.transition_to(ProvisionState::CleanedUp)?;
        Ok(ProvisionReport {
            transitions: self.run.transitions().to_vec(),
            ..report
        })
    }

    fn abort(mut self, error: ProvisionError) -> ProvisionAbort {
        if let Err(e) = self.run.transition_to(ProvisionState::Aborted) {
            tracing::warn!("Could not record abort: {}", e);
        }
        let reached = self.run.last_reached();

        tracing::error!(
            reached = %reached,
            vmid = ?self.ctx.vmid,
            exit_code = error.exit_code(),
            "Provisioning aborted: {}",
            error
        );

        if self.ctx.options.cleanup == CleanupPolicy::Always {
            self.cleanup_after_abort();
        }

        ProvisionAbort {
            reached,
            vmid: self.ctx.vmid,
            error,
        }
    }

    /// Remove generated artifacts only: the source cache slot is kept for the
    /// retry and host objects are never touched.
    fn cleanup_after_abort(&self) {
        let Some(vmid) = self.ctx.vmid else {
            return;
        };

        let mut paths = vec![self.ctx.layout.normalized_path(vmid)];
        match &self.ctx.guest_document {
            Some(document) if !document.persistent => paths.push(document.path.clone()),
            Some(_) => {}
            None => paths.push(self.ctx.layout.guest_config_path(vmid)),
        }

        let summary = remove_artifacts(paths.iter().map(PathBuf::as_path));
        tracing::info!(
            vmid,
            removed = summary.removed.len(),
            warnings = summary.warnings.len(),
            "Removed generated artifacts after abort"
        );
    }
}
