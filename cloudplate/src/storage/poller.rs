//! Import completion polling.

use super::inventory::{parse_volume_list, volume_matches};
use crate::host::{CommandExecutor, HostCommands};
use crate::provision::{ProvisionError, ProvisionState};
use crate::runtime::options::PollOptions;
use cloudplate_shared::constants::names;
use tokio_util::sync::CancellationToken;

/// Bounded wait for an imported disk to be listed on its storage.
///
/// Import registration can lag behind the import command's exit, so the
/// volume is confirmed by listing the storage until it shows up.
pub struct ImportPoller<'a> {
    executor: &'a dyn CommandExecutor,
    commands: &'a HostCommands,
    options: &'a PollOptions,
}

impl<'a> ImportPoller<'a> {
    pub fn new(
        executor: &'a dyn CommandExecutor,
        commands: &'a HostCommands,
        options: &'a PollOptions,
    ) -> Self {
        Self {
            executor,
            commands,
            options,
        }
    }

    /// Poll until the disk of `vmid` is listed on `storage`.
    ///
    /// Returns the matching volume id. Issues at most `max_attempts`
    /// listings; a failed listing counts as an attempt.
    pub async fn wait_for_volume(
        &self,
        vmid: u32,
        storage: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ProvisionError> {
        let volume = names::disk_volume(vmid);
        let max_attempts = self.options.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(ProvisionError::Cancelled {
                    state: ProvisionState::DiskImporting,
                });
            }

            let outcome = self
                .executor
                .execute(&self.commands.list_volumes(storage))
                .await;

            if outcome.ok {
                if let Some(volid) = parse_volume_list(&outcome.stdout)
                    .into_iter()
                    .find(|volid| volume_matches(volid, vmid))
                {
                    tracing::info!(vmid, volid, attempt, "Imported volume confirmed");
                    return Ok(volid.to_string());
                }
                tracing::debug!(vmid, storage, attempt, max_attempts, "Volume not listed yet");
            } else {
                tracing::warn!(
                    vmid,
                    storage,
                    attempt,
                    "Storage listing failed: {}",
                    outcome.diagnostic
                );
            }

            if attempt < max_attempts {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(ProvisionError::Cancelled {
                            state: ProvisionState::DiskImporting,
                        });
                    }
                    _ = tokio::time::sleep(self.options.interval()) => {}
                }
            }
        }

        Err(ProvisionError::ImportTimedOut {
            vmid,
            storage: storage.to_string(),
            volume,
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CommandOutcome;
    use crate::host::testing::FakeExecutor;
    use crate::runtime::options::HostTools;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    const HEADER: &str = "Volid                         Format  Type            Size VMID\n";

    fn fast(max_attempts: u32) -> PollOptions {
        PollOptions {
            max_attempts,
            interval_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_confirms_after_lag() {
        let seen = Arc::new(AtomicU32::new(0));
        let counter = seen.clone();
        let executor = FakeExecutor::new(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                CommandOutcome::success(HEADER)
            } else {
                CommandOutcome::success(format!(
                    "{HEADER}local-lvm:vm-1030-disk-0      raw     images   34359738368 1030\n"
                ))
            }
        });
        let commands = HostCommands::new(HostTools::default());
        let options = fast(30);

        let volid = ImportPoller::new(&executor, &commands, &options)
            .wait_for_volume(1030, "local-lvm", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(volid, "local-lvm:vm-1030-disk-0");
        assert_eq!(executor.calls().len(), 3);
        assert_eq!(executor.calls()[0].argv(), vec!["pvesm", "list", "local-lvm"]);
    }

    #[tokio::test]
    async fn test_times_out_after_max_attempts() {
        let executor = FakeExecutor::new(|_| {
            CommandOutcome::success(format!(
                "{HEADER}local-lvm:vm-1031-disk-0      raw     images   34359738368 1031\n"
            ))
        });
        let commands = HostCommands::new(HostTools::default());
        let options = fast(5);

        let err = ImportPoller::new(&executor, &commands, &options)
            .wait_for_volume(1030, "local-lvm", &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            ProvisionError::ImportTimedOut {
                vmid,
                volume,
                attempts,
                ..
            } => {
                assert_eq!(vmid, 1030);
                assert_eq!(volume, "vm-1030-disk-0");
                assert_eq!(attempts, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(executor.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_failed_listing_counts_as_attempt() {
        let executor = FakeExecutor::new(|_| CommandOutcome::failure("storage 'nope' does not exist"));
        let commands = HostCommands::new(HostTools::default());
        let options = fast(3);

        let err = ImportPoller::new(&executor, &commands, &options)
            .wait_for_volume(1030, "nope", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::ImportTimedOut { attempts: 3, .. }));
        assert_eq!(executor.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_while_waiting() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let executor = FakeExecutor::new(move |_| {
            trigger.cancel();
            CommandOutcome::success(HEADER)
        });
        let commands = HostCommands::new(HostTools::default());
        let options = PollOptions {
            max_attempts: 30,
            interval_ms: 60_000,
        };

        let err = ImportPoller::new(&executor, &commands, &options)
            .wait_for_volume(1030, "local-lvm", &cancel)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Cancelled {
                state: ProvisionState::DiskImporting
            }
        ));
        assert_eq!(executor.calls().len(), 1);
    }
}
