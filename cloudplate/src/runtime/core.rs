//! Provisioning runtime.

use std::sync::Arc;

use crate::host::{CommandExecutor, HostCommands, ProcessExecutor};
use crate::provision::{ProvisionAbort, ProvisionContext, ProvisionPipeline, ProvisionReport};
use crate::runtime::layout::WorkLayout;
use crate::runtime::lock::RunLock;
use crate::runtime::options::CloudplateOptions;
use crate::storage::{StorageInfo, parse_storage_status};
use cloudplate_shared::errors::{CloudplateError, CloudplateResult};
use tokio_util::sync::CancellationToken;

/// Entry point for provisioning templates on one host.
///
/// **Lock Behavior**: Only one `Cloudplate` can use a given home directory at
/// a time, so identifier allocation and host mutations of two runs never
/// interleave. The lock is released when dropped.
///
/// Runs through one runtime are sequential: `provision` takes `&self` but
/// callers are expected to await one run before starting the next.
pub struct Cloudplate {
    options: CloudplateOptions,
    layout: WorkLayout,
    commands: HostCommands,
    executor: Arc<dyn CommandExecutor>,
    _run_lock: RunLock,
}

impl Cloudplate {
    /// Create a runtime driving the local host.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The options are inconsistent
    /// - Another runtime is already using the same home directory
    /// - The work directory cannot be created
    pub fn new(options: CloudplateOptions) -> CloudplateResult<Self> {
        Self::with_executor(options, Arc::new(ProcessExecutor::new()))
    }

    /// Create a runtime issuing host commands through `executor`.
    pub fn with_executor(
        options: CloudplateOptions,
        executor: Arc<dyn CommandExecutor>,
    ) -> CloudplateResult<Self> {
        options.validate()?;

        if !options.home_dir.is_absolute() {
            return Err(CloudplateError::Config(format!(
                "home_dir must be absolute path, got: {}",
                options.home_dir.display()
            )));
        }

        let layout = WorkLayout::new(options.home_dir.clone());
        layout.prepare().map_err(|e| {
            CloudplateError::Storage(format!(
                "Failed to initialize work directory at {}: {}",
                layout.home_dir().display(),
                e
            ))
        })?;

        let run_lock = RunLock::acquire(&layout.lock_path())?;

        tracing::debug!(home = %layout.home_dir().display(), "Runtime ready");

        Ok(Self {
            commands: HostCommands::new(options.tools.clone()),
            options,
            layout,
            executor,
            _run_lock: run_lock,
        })
    }

    pub fn options(&self) -> &CloudplateOptions {
        &self.options
    }

    pub fn layout(&self) -> &WorkLayout {
        &self.layout
    }

    /// Turn the image at `url` into a template whose disk lives on `storage`.
    ///
    /// Cancelling `cancel` aborts the run at the next stage boundary, or
    /// immediately while waiting on the host.
    pub async fn provision(
        &self,
        url: &str,
        storage: &str,
        cancel: &CancellationToken,
    ) -> Result<ProvisionReport, ProvisionAbort> {
        let ctx = ProvisionContext::new(
            self.executor.as_ref(),
            &self.commands,
            &self.options,
            &self.layout,
            cancel,
            url,
            storage,
        );
        ProvisionPipeline::new(ctx).run().await
    }

    /// Storage backends known to the host.
    pub async fn storages(&self) -> CloudplateResult<Vec<StorageInfo>> {
        let outcome = self
            .executor
            .execute(&self.commands.storage_status())
            .await;
        if !outcome.ok {
            return Err(CloudplateError::Execution(format!(
                "failed to list storages: {}",
                outcome.diagnostic
            )));
        }
        Ok(parse_storage_status(&outcome.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CommandOutcome;
    use crate::host::testing::FakeExecutor;

    fn options(home: &std::path::Path) -> CloudplateOptions {
        CloudplateOptions {
            home_dir: home.to_path_buf(),
            ..CloudplateOptions::default()
        }
    }

    #[test]
    fn test_second_runtime_on_same_home_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let _first = Cloudplate::with_executor(options(dir.path()), Arc::new(FakeExecutor::ok()))
            .unwrap();

        let second =
            Cloudplate::with_executor(options(dir.path()), Arc::new(FakeExecutor::ok()));
        assert!(matches!(second, Err(CloudplateError::Locked(_))));
    }

    #[test]
    fn test_relative_home_rejected() {
        let result = Cloudplate::with_executor(
            options(std::path::Path::new("relative/home")),
            Arc::new(FakeExecutor::ok()),
        );
        assert!(matches!(result, Err(CloudplateError::Config(_))));
    }

    #[tokio::test]
    async fn test_storages() {
        let dir = tempfile::tempdir().unwrap();
        let executor = FakeExecutor::new(|_| {
            CommandOutcome::success(
                "Name Type Status Total Used Available %\n\
                 local dir active 100 10 90 10.00%\n",
            )
        });
        let runtime = Cloudplate::with_executor(options(dir.path()), Arc::new(executor)).unwrap();

        let storages = runtime.storages().await.unwrap();
        assert_eq!(storages.len(), 1);
        assert_eq!(storages[0].name, "local");
    }

    #[tokio::test]
    async fn test_storages_failure() {
        let dir = tempfile::tempdir().unwrap();
        let executor = FakeExecutor::new(|_| CommandOutcome::failure("pvesm: not found"));
        let runtime = Cloudplate::with_executor(options(dir.path()), Arc::new(executor)).unwrap();

        let err = runtime.storages().await.unwrap_err();
        assert!(matches!(err, CloudplateError::Execution(_)));
    }
}
