//! cloudplate shared - Code shared by the provisioning library and its CLI
//!
//! This crate contains the common error type and the host-side constants
//! (naming patterns, default tool names) used across the workspace.

pub mod constants;
pub mod errors;

pub use errors::{CloudplateError, CloudplateResult};
