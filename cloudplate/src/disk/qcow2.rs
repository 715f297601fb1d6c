//! Qcow2 header inspection.
//!
//! Only the fixed part of the header is parsed: enough to know the virtual
//! size of a converted image before deciding whether to grow it.

use std::io::Read;
use std::path::Path;

use cloudplate_shared::errors::{CloudplateError, CloudplateResult};

/// "QFI\xfb"
const QCOW2_MAGIC: u32 = 0x514649fb;

/// Fixed header fields shared by v2 and v3.
const HEADER_LEN: usize = 32;

/// Parsed qcow2 header information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Qcow2Header {
    pub version: u32,
    pub cluster_bits: u32,
    /// Virtual disk size in bytes.
    pub size: u64,
}

impl Qcow2Header {
    /// Read qcow2 header from disk file.
    pub fn read(path: &Path) -> CloudplateResult<Self> {
        let mut file = std::fs::File::open(path).map_err(|e| {
            CloudplateError::Storage(format!("Failed to open {}: {}", path.display(), e))
        })?;

        let mut header = [0u8; HEADER_LEN];
        file.read_exact(&mut header).map_err(|e| {
            CloudplateError::Storage(format!(
                "Failed to read header from {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::parse(&header).ok_or_else(|| {
            CloudplateError::Storage(format!(
                "Invalid qcow2 magic in {}: 0x{:08x}",
                path.display(),
                u32::from_be_bytes([header[0], header[1], header[2], header[3]])
            ))
        })
    }

    /// Parse the fixed header (big-endian). `None` if the magic is wrong.
    pub fn parse(header: &[u8; HEADER_LEN]) -> Option<Self> {
        let be32 = |at: usize| u32::from_be_bytes([header[at], header[at + 1], header[at + 2], header[at + 3]]);

        if be32(0) != QCOW2_MAGIC {
            return None;
        }

        let mut size = [0u8; 8];
        size.copy_from_slice(&header[24..32]);

        Some(Self {
            version: be32(4),
            cluster_bits: be32(20),
            size: u64::from_be_bytes(size),
        })
    }

    /// Serialize the fixed header. Used to stand in for converted images.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        header[0..4].copy_from_slice(&QCOW2_MAGIC.to_be_bytes());
        header[4..8].copy_from_slice(&self.version.to_be_bytes());
        header[20..24].copy_from_slice(&self.cluster_bits.to_be_bytes());
        header[24..32].copy_from_slice(&self.size.to_be_bytes());
        header
    }
}
