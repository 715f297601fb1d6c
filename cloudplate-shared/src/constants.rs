//! Host-side constants.
//!
//! Naming patterns here must match what the hypervisor produces, e.g. the
//! volume name `importdisk` registers for a given instance.

/// External tools invoked by the pipeline.
pub mod tools {
    /// VM management CLI.
    pub const QM: &str = "qm";

    /// Storage management CLI.
    pub const PVESM: &str = "pvesm";

    /// Disk image conversion tool.
    pub const QEMU_IMG: &str = "qemu-img";

    /// File transfer tool.
    pub const WGET: &str = "wget";
}

/// Guest agent package installed and enabled by the bootstrap document.
pub mod guest_agent {
    pub const PACKAGE: &str = "qemu-guest-agent";

    pub const SERVICE: &str = "qemu-guest-agent";
}

/// Instance resource defaults.
pub mod vm_defaults {
    /// Memory in MiB for a new template.
    pub const MEMORY_MIB: u32 = 2048;

    /// vCPU cores for a new template.
    pub const CORES: u8 = 2;

    /// Bridge for the first NIC.
    pub const BRIDGE: &str = "vmbr0";

    /// Prefix for the host object name, followed by the identifier.
    pub const NAME_PREFIX: &str = "cloud-init-";

    /// SCSI controller model for the boot disk.
    pub const SCSI_CONTROLLER: &str = "virtio-scsi-pci";

    /// Capacity the normalized image is grown to.
    pub const DISK_SIZE: &str = "32G";

    /// Range reserved for templates (inclusive).
    pub const VMID_RANGE_START: u32 = 1030;
    pub const VMID_RANGE_END: u32 = 1040;
}

/// Import confirmation polling defaults.
pub mod poll {
    pub const MAX_ATTEMPTS: u32 = 30;

    pub const INTERVAL_MS: u64 = 1000;
}

/// Artifact naming.
pub mod names {
    /// Volume name registered by disk import, and the normalized image stem.
    pub fn disk_volume(vmid: u32) -> String {
        format!("vm-{}-disk-0", vmid)
    }

    /// File name of the normalized image.
    pub fn normalized_image(vmid: u32) -> String {
        format!("{}.qcow2", disk_volume(vmid))
    }

    /// File name of the guest bootstrap document.
    pub fn guest_config(vmid: u32) -> String {
        format!("cloud-init-{}.yaml", vmid)
    }
}

pub mod envs {
    pub const CLOUDPLATE_HOME: &str = "CLOUDPLATE_HOME";
}

#[cfg(test)]
mod tests {
    use super::names;

    #[test]
    fn test_artifact_names() {
        assert_eq!(names::disk_volume(1031), "vm-1031-disk-0");
        assert_eq!(names::normalized_image(1031), "vm-1031-disk-0.qcow2");
        assert_eq!(names::guest_config(1031), "cloud-init-1031.yaml");
    }
}
