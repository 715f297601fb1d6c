//! Parsing of storage listings.

use cloudplate_shared::constants::names;
use serde::Serialize;

/// A storage backend as reported by `pvesm status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    /// KiB; `None` when the backend is inactive.
    pub total: Option<u64>,
    pub used: Option<u64>,
    pub available: Option<u64>,
}

impl StorageInfo {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Parse `pvesm status` output, skipping the header row.
pub fn parse_storage_status(output: &str) -> Vec<StorageInfo> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("Name"))
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?.to_string();
            let kind = fields.next()?.to_string();
            let status = fields.next()?.to_string();
            let mut number = || fields.next().and_then(|f| f.parse().ok());
            Some(StorageInfo {
                name,
                kind,
                status,
                total: number(),
                used: number(),
                available: number(),
            })
        })
        .collect()
}

/// Volume identifiers from `pvesm list <storage>`, skipping the header row.
pub fn parse_volume_list(output: &str) -> Vec<&str> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|volid| !volid.eq_ignore_ascii_case("volid"))
        .collect()
}

/// Whether `volid` is the disk imported for `vmid`.
///
/// Handles both block (`local-lvm:vm-100-disk-0`) and directory
/// (`local:100/vm-100-disk-0.qcow2`) storages.
pub fn volume_matches(volid: &str, vmid: u32) -> bool {
    let volume = volid.split_once(':').map_or(volid, |(_, v)| v);
    let file = volume.rsplit('/').next().unwrap_or(volume);
    let stem = file.split_once('.').map_or(file, |(stem, _)| stem);
    stem == names::disk_volume(vmid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_matches() {
        assert!(volume_matches("local-lvm:vm-1030-disk-0", 1030));
        assert!(volume_matches("local:1030/vm-1030-disk-0.qcow2", 1030));
        assert!(volume_matches("vm-1030-disk-0", 1030));

        assert!(!volume_matches("local-lvm:vm-10300-disk-0", 1030));
        assert!(!volume_matches("local-lvm:vm-1030-disk-1", 1030));
        assert!(!volume_matches("local-lvm:base-1030-disk-0", 1030));
        assert!(!volume_matches("local-lvm:vm-1031-disk-0", 1030));
    }

    #[test]
    fn test_parse_volume_list() {
        let output = "\
Volid                         Format  Type            Size VMID
local-lvm:vm-100-disk-0       raw     images   34359738368 100
local-lvm:vm-1030-disk-0      raw     images   34359738368 1030
";
        assert_eq!(
            parse_volume_list(output),
            vec!["local-lvm:vm-100-disk-0", "local-lvm:vm-1030-disk-0"]
        );
        assert!(parse_volume_list("").is_empty());
    }

    #[test]
    fn test_parse_storage_status() {
        let output = "\
Name             Type     Status           Total            Used       Available        %
local             dir     active        98559220        10725864        82783808   10.88%
local-lvm     lvmthin     active       832888832        41644441       791244390    5.00%
nfs-backup        nfs   inactive               0               0               0    0.00%
";
        let storages = parse_storage_status(output);

        assert_eq!(storages.len(), 3);
        assert_eq!(storages[1].name, "local-lvm");
        assert_eq!(storages[1].kind, "lvmthin");
        assert_eq!(storages[1].total, Some(832888832));
        assert!(storages[1].is_active());
        assert!(!storages[2].is_active());
    }

    #[test]
    fn test_parse_storage_status_without_header() {
        assert!(parse_storage_status("garbage\n").is_empty());
    }
}
