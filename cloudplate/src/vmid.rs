//! Instance identifier allocation.
//!
//! Identifiers are drawn from a configured range after listing what the host
//! already uses. The check-then-create window is only safe while the caller
//! holds the [`RunLock`](crate::runtime::lock::RunLock).

use crate::host::{CommandExecutor, HostCommands};
use crate::provision::ProvisionError;
use crate::runtime::options::VmidOptions;
use rand::seq::IndexedRandom;
use std::collections::BTreeSet;

pub struct VmidAllocator<'a> {
    executor: &'a dyn CommandExecutor,
    commands: &'a HostCommands,
    options: &'a VmidOptions,
}

impl<'a> VmidAllocator<'a> {
    pub fn new(
        executor: &'a dyn CommandExecutor,
        commands: &'a HostCommands,
        options: &'a VmidOptions,
    ) -> Self {
        Self {
            executor,
            commands,
            options,
        }
    }

    /// Pick an identifier unused on the host.
    ///
    /// A fixed `vmid` is used as-is when free. Otherwise a random free
    /// identifier from the range is returned.
    pub async fn allocate(&self) -> Result<u32, ProvisionError> {
        let outcome = self.executor.execute(&self.commands.list_vms()).await;
        if !outcome.ok {
            return Err(ProvisionError::IdentifierUnavailable {
                reason: format!("failed to list instances: {}", outcome.diagnostic),
            });
        }
        let used = parse_vm_list(&outcome.stdout);

        if let Some(vmid) = self.options.vmid {
            if used.contains(&vmid) {
                return Err(ProvisionError::IdentifierUnavailable {
                    reason: format!("instance {} already exists", vmid),
                });
            }
            return Ok(vmid);
        }

        let free: Vec<u32> = (self.options.range_start..=self.options.range_end)
            .filter(|id| !used.contains(id))
            .collect();

        let vmid = free.choose(&mut rand::rng()).copied().ok_or_else(|| {
            ProvisionError::IdentifierUnavailable {
                reason: format!(
                    "every identifier in {}..={} is in use",
                    self.options.range_start, self.options.range_end
                ),
            }
        })?;

        tracing::debug!(vmid, free = free.len(), "Allocated instance identifier");
        Ok(vmid)
    }
}

/// Identifiers from `qm list` output. The header and unparsable lines are skipped.
pub fn parse_vm_list(output: &str) -> BTreeSet<u32> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next()?.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CommandOutcome;
    use crate::host::testing::FakeExecutor;
    use crate::runtime::options::HostTools;

    const QM_LIST: &str = "\
      VMID NAME                 STATUS     MEM(MB)    BOOTDISK(GB) PID
       100 debian               running    2048              32.00 1234
      1030 cloud-init-1030      stopped    2048              32.00 0
      1031 cloud-init-1031      stopped    2048              32.00 0
";

    fn listing(stdout: &'static str) -> FakeExecutor {
        FakeExecutor::new(move |_| CommandOutcome::success(stdout))
    }

    #[test]
    fn test_parse_vm_list() {
        let used = parse_vm_list(QM_LIST);
        assert_eq!(used.into_iter().collect::<Vec<_>>(), vec![100, 1030, 1031]);
        assert!(parse_vm_list("").is_empty());
    }

    #[tokio::test]
    async fn test_allocates_free_id_in_range() {
        let executor = listing(QM_LIST);
        let commands = HostCommands::new(HostTools::default());
        let options = VmidOptions::default();

        for _ in 0..20 {
            let vmid = VmidAllocator::new(&executor, &commands, &options)
                .allocate()
                .await
                .unwrap();
            assert!((1032..=1040).contains(&vmid));
        }
    }

    #[tokio::test]
    async fn test_exhausted_range() {
        let executor = listing(QM_LIST);
        let commands = HostCommands::new(HostTools::default());
        let options = VmidOptions {
            range_start: 1030,
            range_end: 1031,
            vmid: None,
        };

        let err = VmidAllocator::new(&executor, &commands, &options)
            .allocate()
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::IdentifierUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_fixed_vmid() {
        let executor = listing(QM_LIST);
        let commands = HostCommands::new(HostTools::default());

        let free = VmidOptions {
            vmid: Some(9000),
            ..VmidOptions::default()
        };
        let vmid = VmidAllocator::new(&executor, &commands, &free)
            .allocate()
            .await
            .unwrap();
        assert_eq!(vmid, 9000);

        let taken = VmidOptions {
            vmid: Some(100),
            ..VmidOptions::default()
        };
        let err = VmidAllocator::new(&executor, &commands, &taken)
            .allocate()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_listing_failure() {
        let executor = FakeExecutor::new(|_| CommandOutcome::failure("ipcc_send_rec failed"));
        let commands = HostCommands::new(HostTools::default());
        let options = VmidOptions::default();

        let err = VmidAllocator::new(&executor, &commands, &options)
            .allocate()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ipcc_send_rec failed"));
    }
}
