//! Disk formats and sizes.

use cloudplate_shared::errors::{CloudplateError, CloudplateResult};
use std::path::Path;

/// Disk image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskFormat {
    /// Raw disk image.
    Raw,
    /// QCOW2 (QEMU Copy-On-Write v2).
    Qcow2,
}

impl DiskFormat {
    /// Get string representation for qemu-img.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiskFormat::Raw => "raw",
            DiskFormat::Qcow2 => "qcow2",
        }
    }

    /// Guess the format from a file extension.
    ///
    /// Cloud `.img` files are frequently qcow2 in disguise; conversion
    /// probes the content anyway, so this is only used for logging.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "qcow2" => Some(DiskFormat::Qcow2),
            "img" | "raw" => Some(DiskFormat::Raw),
            _ => None,
        }
    }
}

impl std::fmt::Display for DiskFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parse a human size ("32G", "5120M", "1T", plain bytes) into bytes.
///
/// Units are binary (G = 1024^3).
pub fn parse_size(size_str: &str) -> CloudplateResult<u64> {
    let size_str = size_str.trim().to_uppercase();

    if size_str.is_empty() {
        return Err(CloudplateError::InvalidArgument("Empty size string".into()));
    }

    let (number_str, multiplier) = if let Some(num) = size_str.strip_suffix("TB") {
        (num, 1024_u64.pow(4))
    } else if let Some(num) = size_str.strip_suffix("GB") {
        (num, 1024_u64.pow(3))
    } else if let Some(num) = size_str.strip_suffix("MB") {
        (num, 1024_u64.pow(2))
    } else if let Some(num) = size_str.strip_suffix("KB") {
        (num, 1024)
    } else if let Some(num) = size_str.strip_suffix('T') {
        (num, 1024_u64.pow(4))
    } else if let Some(num) = size_str.strip_suffix('G') {
        (num, 1024_u64.pow(3))
    } else if let Some(num) = size_str.strip_suffix('M') {
        (num, 1024_u64.pow(2))
    } else if let Some(num) = size_str.strip_suffix('K') {
        (num, 1024)
    } else if let Some(num) = size_str.strip_suffix('B') {
        (num, 1)
    } else {
        (&*size_str, 1)
    };

    let number: u64 = number_str.trim().parse().map_err(|_| {
        CloudplateError::InvalidArgument(format!("Invalid number in size: {}", number_str))
    })?;

    number.checked_mul(multiplier).ok_or_else(|| {
        CloudplateError::InvalidArgument(format!("Size out of range: {}", size_str))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("32G").unwrap(), 32 * 1024 * 1024 * 1024);
        assert_eq!(parse_size("32gb").unwrap(), 32 * 1024 * 1024 * 1024);
        assert_eq!(parse_size("5120M").unwrap(), 5120 * 1024 * 1024);
        assert_eq!(parse_size("1T").unwrap(), 1024_u64.pow(4));
        assert_eq!(parse_size("4K").unwrap(), 4096);
        assert_eq!(parse_size("512B").unwrap(), 512);
        assert_eq!(parse_size(" 1000 ").unwrap(), 1000);
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("lots").is_err());
        assert!(parse_size("G").is_err());
        assert!(parse_size("-1G").is_err());
        assert!(parse_size("99999999999T").is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            DiskFormat::from_path(Path::new("/a/focal.img")),
            Some(DiskFormat::Raw)
        );
        assert_eq!(
            DiskFormat::from_path(Path::new("/a/debian.QCOW2")),
            Some(DiskFormat::Qcow2)
        );
        assert_eq!(DiskFormat::from_path(Path::new("/a/noext")), None);
    }
}
