//! Disk image operations.
//!
//! This module provides disk image normalization:
//! - `DiskFormat` - Disk format types (Raw, Qcow2)
//! - `Qcow2Header` - Minimal qcow2 header inspection
//! - `Normalizer` - Convert an acquired image to qcow2 and grow it

mod image;
mod normalize;
mod qcow2;

pub use image::{DiskFormat, parse_size};
pub use normalize::Normalizer;
pub use qcow2::Qcow2Header;
