//! Builders for the fixed host command set.

use super::HostCommand;
use crate::runtime::options::{HostTools, VmOptions};
use std::path::Path;

/// Builds every command the pipeline issues against the host.
#[derive(Debug, Clone)]
pub struct HostCommands {
    tools: HostTools,
}

impl HostCommands {
    pub fn new(tools: HostTools) -> Self {
        Self { tools }
    }

    /// `wget -q <url> -O <dest>`
    pub fn fetch(&self, url: &str, dest: &Path) -> HostCommand {
        HostCommand::new(&self.tools.fetch)
            .arg("-q")
            .arg(url)
            .arg("-O")
            .arg(path_arg(dest))
    }

    /// `qemu-img convert -O qcow2 <src> <dst>`
    pub fn convert_to_qcow2(&self, src: &Path, dst: &Path) -> HostCommand {
        HostCommand::new(&self.tools.qemu_img)
            .args(["convert", "-O", "qcow2"])
            .arg(path_arg(src))
            .arg(path_arg(dst))
    }

    /// `qemu-img resize <path> <size>`. Never passes `--shrink`.
    pub fn resize(&self, path: &Path, size: &str) -> HostCommand {
        HostCommand::new(&self.tools.qemu_img)
            .arg("resize")
            .arg(path_arg(path))
            .arg(size)
    }

    /// `qm create <id> --memory <m> --cores <c> --name <name> --net0 virtio,bridge=<br>`
    pub fn create_vm(&self, vmid: u32, vm: &VmOptions) -> HostCommand {
        HostCommand::new(&self.tools.qm)
            .arg("create")
            .arg(vmid.to_string())
            .arg("--memory")
            .arg(vm.memory_mib.to_string())
            .arg("--cores")
            .arg(vm.cores.to_string())
            .arg("--name")
            .arg(vm.instance_name(vmid))
            .arg("--net0")
            .arg(format!("virtio,bridge={}", vm.bridge))
    }

    /// `qm importdisk <id> <image> <storage>`
    pub fn import_disk(&self, vmid: u32, image: &Path, storage: &str) -> HostCommand {
        HostCommand::new(&self.tools.qm)
            .arg("importdisk")
            .arg(vmid.to_string())
            .arg(path_arg(image))
            .arg(storage)
    }

    /// `qm set <id> <options...>`
    pub fn set_vm<I, S>(&self, vmid: u32, options: I) -> HostCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        HostCommand::new(&self.tools.qm)
            .arg("set")
            .arg(vmid.to_string())
            .args(options)
    }

    /// `qm template <id>`
    pub fn template(&self, vmid: u32) -> HostCommand {
        HostCommand::new(&self.tools.qm)
            .arg("template")
            .arg(vmid.to_string())
    }

    /// `qm list`
    pub fn list_vms(&self) -> HostCommand {
        HostCommand::new(&self.tools.qm).arg("list")
    }

    /// `pvesm list <storage>`
    pub fn list_volumes(&self, storage: &str) -> HostCommand {
        HostCommand::new(&self.tools.pvesm).arg("list").arg(storage)
    }

    /// `pvesm status`
    pub fn storage_status(&self) -> HostCommand {
        HostCommand::new(&self.tools.pvesm).arg("status")
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn commands() -> HostCommands {
        HostCommands::new(HostTools::default())
    }

    #[test]
    fn test_create_vm_command() {
        let cmd = commands().create_vm(1030, &VmOptions::default());
        assert_eq!(
            cmd.argv(),
            vec![
                "qm",
                "create",
                "1030",
                "--memory",
                "2048",
                "--cores",
                "2",
                "--name",
                "cloud-init-1030",
                "--net0",
                "virtio,bridge=vmbr0"
            ]
        );
    }

    #[test]
    fn test_import_and_list_commands() {
        let image = PathBuf::from("/w/images/vm-1030-disk-0.qcow2");
        assert_eq!(
            commands().import_disk(1030, &image, "local-lvm").argv(),
            vec!["qm", "importdisk", "1030", "/w/images/vm-1030-disk-0.qcow2", "local-lvm"]
        );
        assert_eq!(
            commands().list_volumes("local-lvm").argv(),
            vec!["pvesm", "list", "local-lvm"]
        );
    }

    #[test]
    fn test_image_commands() {
        let src = PathBuf::from("/w/images/focal.img");
        let dst = PathBuf::from("/w/images/vm-1030-disk-0.qcow2");

        assert_eq!(
            commands().fetch("https://example.com/focal.img", &src).argv(),
            vec!["wget", "-q", "https://example.com/focal.img", "-O", "/w/images/focal.img"]
        );
        assert_eq!(
            commands().convert_to_qcow2(&src, &dst).argv(),
            vec![
                "qemu-img",
                "convert",
                "-O",
                "qcow2",
                "/w/images/focal.img",
                "/w/images/vm-1030-disk-0.qcow2"
            ]
        );
        assert_eq!(
            commands().resize(&dst, "32G").argv(),
            vec!["qemu-img", "resize", "/w/images/vm-1030-disk-0.qcow2", "32G"]
        );
    }

    #[test]
    fn test_custom_tool_names() {
        let tools = HostTools {
            qm: "/usr/sbin/qm".into(),
            ..HostTools::default()
        };
        let cmd = HostCommands::new(tools).set_vm(1031, ["--agent", "enabled=1"]);
        assert_eq!(
            cmd.argv(),
            vec!["/usr/sbin/qm", "set", "1031", "--agent", "enabled=1"]
        );
    }
}
