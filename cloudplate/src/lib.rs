//! cloudplate: turn remote cloud disk images into ready-to-clone
//! hypervisor templates.
//!
//! ```ignore
//! let runtime = Cloudplate::new(CloudplateOptions::default())?;
//! let report = runtime
//!     .provision(
//!         "https://cloud-images.ubuntu.com/focal/current/focal-server-cloudimg-amd64.img",
//!         "local-lvm",
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! println!("template {} ready", report.vmid);
//! ```

pub mod cloudinit;
pub mod disk;
pub mod host;
pub mod images;
pub mod provision;
pub mod runtime;
pub mod source;
pub mod storage;
pub mod util;
pub mod vmid;

pub use cloudplate_shared::errors::{CloudplateError, CloudplateResult};
pub use host::{CommandExecutor, CommandOutcome, HostCommand, HostCommands, ProcessExecutor};
pub use provision::{
    ProvisionAbort, ProvisionError, ProvisionReport, ProvisionState, exit_codes,
};
pub use runtime::Cloudplate;
pub use runtime::options::{CleanupPolicy, CloudplateOptions};
pub use source::{ProvisionRequest, SourceLocator, validate_source};
pub use storage::StorageInfo;
pub use tokio_util::sync::CancellationToken;
