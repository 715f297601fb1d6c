//! Stage 7: Apply the instance attributes, in order.

use super::ProvisionStage;
use crate::provision::context::ProvisionContext;
use crate::provision::error::ProvisionError;
use crate::provision::state::ProvisionState;
use async_trait::async_trait;

/// One `qm set` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeStep {
    pub name: &'static str,
    pub options: Vec<String>,
}

impl AttributeStep {
    fn new<const N: usize>(name: &'static str, options: [String; N]) -> Self {
        Self {
            name,
            options: options.into(),
        }
    }
}

/// Attribute batch for a run, in application order.
///
/// The boot disk is the volume id the storage listed, which carries a
/// directory part and extension on file-backed storages.
///
/// Boot disk, cloud-init drive, optional custom user data, boot order,
/// serial console, guest agent.
pub fn attribute_steps(ctx: &ProvisionContext<'_>) -> Result<Vec<AttributeStep>, ProvisionError> {
    let storage = &ctx.request()?.storage;
    let volume = ctx.volume()?;
    let vm = &ctx.options.vm;

    let mut steps = vec![
        AttributeStep::new(
            "boot_disk",
            [
                "--scsihw".into(),
                vm.scsi_controller.clone(),
                "--scsi0".into(),
                volume.to_string(),
            ],
        ),
        AttributeStep::new(
            "cloudinit_drive",
            ["--ide2".into(), format!("{}:cloudinit", storage)],
        ),
    ];

    if let Some(cicustom) = &ctx.guest_document()?.cicustom {
        steps.push(AttributeStep::new(
            "custom_user_data",
            ["--cicustom".into(), cicustom.clone()],
        ));
    }

    steps.extend([
        AttributeStep::new(
            "boot_order",
            [
                "--boot".into(),
                "c".into(),
                "--bootdisk".into(),
                "scsi0".into(),
            ],
        ),
        AttributeStep::new(
            "serial_console",
            [
                "--serial0".into(),
                "socket".into(),
                "--vga".into(),
                "serial0".into(),
            ],
        ),
        AttributeStep::new("guest_agent", ["--agent".into(), "enabled=1".into()]),
    ]);

    Ok(steps)
}

pub struct ConfigureStage;

#[async_trait]
impl ProvisionStage for ConfigureStage {
    fn name(&self) -> &'static str {
        "configure"
    }

    fn completes(&self) -> ProvisionState {
        ProvisionState::Configured
    }

    async fn run(&self, ctx: &mut ProvisionContext<'_>) -> Result<(), ProvisionError> {
        let vmid = ctx.vmid()?;

        if ctx.guest_document()?.cicustom.is_none() {
            tracing::warn!(
                vmid,
                "No snippets_storage configured, generated guest config is not attached to the instance"
            );
        }

        for step in attribute_steps(ctx)? {
            let outcome = ctx
                .executor
                .execute(&ctx.commands.set_vm(vmid, step.options))
                .await;
            if !outcome.ok {
                return Err(ProvisionError::ConfigurationStepFailed {
                    vmid,
                    step: step.name,
                    diagnostic: outcome.diagnostic,
                });
            }
            tracing::debug!(vmid, step = step.name, "Attribute applied");
        }

        if ctx.options.vm.convert_to_template {
            let outcome = ctx.executor.execute(&ctx.commands.template(vmid)).await;
            if !outcome.ok {
                return Err(ProvisionError::ConfigurationStepFailed {
                    vmid,
                    step: "template",
                    diagnostic: outcome.diagnostic,
                });
            }
        }

        tracing::info!(vmid, template = ctx.options.vm.convert_to_template, "Instance configured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloudinit::GuestDocument;
    use crate::host::HostCommands;
    use crate::host::testing::FakeExecutor;
    use crate::runtime::layout::WorkLayout;
    use crate::runtime::options::CloudplateOptions;
    use crate::source::ProvisionRequest;
    use tokio_util::sync::CancellationToken;

    const URL: &str = "https://example.com/images/disk.qcow2";

    fn with_context<R>(volume: Option<&str>, f: impl FnOnce(&ProvisionContext<'_>) -> R) -> R {
        let options = CloudplateOptions::default();
        let executor = FakeExecutor::ok();
        let commands = HostCommands::new(options.tools.clone());
        let layout = WorkLayout::new(options.home_dir.clone());
        let cancel = CancellationToken::new();

        let mut ctx =
            ProvisionContext::new(&executor, &commands, &options, &layout, &cancel, URL, "local");
        ctx.request = Some(ProvisionRequest::new(URL, "local").unwrap());
        ctx.vmid = Some(1033);
        ctx.guest_document = Some(GuestDocument {
            path: "/tmp/cloud-init-1033.yaml".into(),
            persistent: false,
            cicustom: None,
        });
        ctx.volume = volume.map(str::to_string);
        f(&ctx)
    }

    #[test]
    fn test_boot_disk_uses_listed_volume() {
        let steps = with_context(Some("local:1033/vm-1033-disk-0.qcow2"), |ctx| {
            attribute_steps(ctx).unwrap()
        });

        assert_eq!(steps[0].name, "boot_disk");
        assert_eq!(steps[0].options[2], "--scsi0");
        assert_eq!(steps[0].options[3], "local:1033/vm-1033-disk-0.qcow2");
    }

    #[test]
    fn test_steps_require_confirmed_volume() {
        let result = with_context(None, |ctx| attribute_steps(ctx));
        assert!(matches!(result, Err(ProvisionError::Runtime(_))));
    }

    #[test]
    fn test_transient_document_is_not_attached() {
        let steps = with_context(Some("local:1033/vm-1033-disk-0.qcow2"), |ctx| {
            attribute_steps(ctx).unwrap()
        });

        let names: Vec<_> = steps.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            [
                "boot_disk",
                "cloudinit_drive",
                "boot_order",
                "serial_console",
                "guest_agent"
            ]
        );
    }
}
