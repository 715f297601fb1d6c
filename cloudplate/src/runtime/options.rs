//! Configuration for cloudplate.

use crate::runtime::layout::dirs as const_dirs;
use cloudplate_shared::constants::{envs as const_envs, guest_agent, poll, tools, vm_defaults};
use cloudplate_shared::errors::{CloudplateError, CloudplateResult};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Host Tools
// ============================================================================

/// Binaries of the host command set.
///
/// Flags are fixed by `HostCommands`; only the program names are
/// configurable so wrappers (e.g. `ssh host qm`) can be dropped in.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HostTools {
    #[serde(default = "default_qm")]
    pub qm: String,

    #[serde(default = "default_pvesm")]
    pub pvesm: String,

    #[serde(default = "default_qemu_img")]
    pub qemu_img: String,

    /// Transfer tool. Invoked as `<fetch> -q <url> -O <dest>`.
    #[serde(default = "default_fetch")]
    pub fetch: String,
}

fn default_qm() -> String {
    tools::QM.to_string()
}

fn default_pvesm() -> String {
    tools::PVESM.to_string()
}

fn default_qemu_img() -> String {
    tools::QEMU_IMG.to_string()
}

fn default_fetch() -> String {
    tools::WGET.to_string()
}

impl Default for HostTools {
    fn default() -> Self {
        Self {
            qm: default_qm(),
            pvesm: default_pvesm(),
            qemu_img: default_qemu_img(),
            fetch: default_fetch(),
        }
    }
}

// ============================================================================
// VM Options
// ============================================================================

/// Sizing and attachment of the instance created on the host.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VmOptions {
    /// Memory in MiB.
    #[serde(default = "default_memory_mib")]
    pub memory_mib: u32,

    #[serde(default = "default_cores")]
    pub cores: u8,

    /// Bridge the first NIC is attached to.
    #[serde(default = "default_bridge")]
    pub bridge: String,

    /// Host object name prefix; the identifier is appended.
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    #[serde(default = "default_scsi_controller")]
    pub scsi_controller: String,

    /// Capacity the normalized image is grown to (e.g. "32G").
    ///
    /// `None` skips the resize step. The image is never shrunk.
    #[serde(default = "default_disk_size")]
    pub disk_size: Option<String>,

    /// Mark the instance as a template once configured.
    #[serde(default = "default_convert_to_template")]
    pub convert_to_template: bool,
}

fn default_memory_mib() -> u32 {
    vm_defaults::MEMORY_MIB
}

fn default_cores() -> u8 {
    vm_defaults::CORES
}

fn default_bridge() -> String {
    vm_defaults::BRIDGE.to_string()
}

fn default_name_prefix() -> String {
    vm_defaults::NAME_PREFIX.to_string()
}

fn default_scsi_controller() -> String {
    vm_defaults::SCSI_CONTROLLER.to_string()
}

fn default_disk_size() -> Option<String> {
    Some(vm_defaults::DISK_SIZE.to_string())
}

fn default_convert_to_template() -> bool {
    true
}

impl VmOptions {
    pub fn instance_name(&self, vmid: u32) -> String {
        format!("{}{}", self.name_prefix, vmid)
    }
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            memory_mib: default_memory_mib(),
            cores: default_cores(),
            bridge: default_bridge(),
            name_prefix: default_name_prefix(),
            scsi_controller: default_scsi_controller(),
            disk_size: default_disk_size(),
            convert_to_template: default_convert_to_template(),
        }
    }
}

// ============================================================================
// Guest Config Options
// ============================================================================

/// Every field of the guest bootstrap document, plus where it goes.
///
/// Defaults are locked down: no password, password authentication off and
/// root login disabled. Turning on password authentication together with
/// root login requires `allow_insecure_login`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GuestConfigOptions {
    /// Principal account.
    #[serde(default = "default_guest_user")]
    pub user: String,

    #[serde(default)]
    pub password: Option<String>,

    /// Force a password change on first login.
    #[serde(default = "default_password_expire")]
    pub password_expire: bool,

    #[serde(default)]
    pub ssh_pwauth: bool,

    #[serde(default = "default_disable_root")]
    pub disable_root: bool,

    #[serde(default)]
    pub ssh_authorized_keys: Vec<String>,

    #[serde(default = "default_package_upgrade")]
    pub package_upgrade: bool,

    /// Must contain the guest agent package.
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,

    #[serde(default = "default_runcmd")]
    pub runcmd: Vec<String>,

    /// Explicit opt-in for password authentication with root login enabled.
    #[serde(default)]
    pub allow_insecure_login: bool,

    /// Host storage with the `snippets` content type.
    ///
    /// When set, the document is written to `snippets_dir`, referenced via
    /// `--cicustom` and kept after the run (the template needs it).
    ///
    /// When unset, the document is only a transient work file: the instance
    /// boots from the host's generated cloud-init drive and the packages and
    /// commands above never reach the guest.
    #[serde(default)]
    pub snippets_storage: Option<String>,

    /// Directory backing `snippets_storage`.
    #[serde(default = "default_snippets_dir")]
    pub snippets_dir: PathBuf,
}

fn default_guest_user() -> String {
    "root".to_string()
}

fn default_password_expire() -> bool {
    true
}

fn default_disable_root() -> bool {
    true
}

fn default_package_upgrade() -> bool {
    true
}

fn default_packages() -> Vec<String> {
    vec![guest_agent::PACKAGE.to_string()]
}

fn default_runcmd() -> Vec<String> {
    vec![
        format!("systemctl enable {}", guest_agent::SERVICE),
        format!("systemctl start {}", guest_agent::SERVICE),
    ]
}

fn default_snippets_dir() -> PathBuf {
    PathBuf::from("/var/lib/vz/snippets")
}

impl Default for GuestConfigOptions {
    fn default() -> Self {
        Self {
            user: default_guest_user(),
            password: None,
            password_expire: default_password_expire(),
            ssh_pwauth: false,
            disable_root: default_disable_root(),
            ssh_authorized_keys: Vec::new(),
            package_upgrade: default_package_upgrade(),
            packages: default_packages(),
            runcmd: default_runcmd(),
            allow_insecure_login: false,
            snippets_storage: None,
            snippets_dir: default_snippets_dir(),
        }
    }
}

// ============================================================================
// Poll Options
// ============================================================================

/// Bounds of the import confirmation wait.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollOptions {
    /// Inventory queries before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between two queries, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_max_attempts() -> u32 {
    poll::MAX_ATTEMPTS
}

fn default_interval_ms() -> u64 {
    poll::INTERVAL_MS
}

impl PollOptions {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_ms: default_interval_ms(),
        }
    }
}

// ============================================================================
// Identifier Options
// ============================================================================

/// Where instance identifiers come from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VmidOptions {
    /// First identifier of the template range (inclusive).
    #[serde(default = "default_range_start")]
    pub range_start: u32,

    /// Last identifier of the template range (inclusive).
    #[serde(default = "default_range_end")]
    pub range_end: u32,

    /// Use this identifier instead of drawing one. Must be unused on the host.
    #[serde(default)]
    pub vmid: Option<u32>,
}

fn default_range_start() -> u32 {
    vm_defaults::VMID_RANGE_START
}

fn default_range_end() -> u32 {
    vm_defaults::VMID_RANGE_END
}

impl Default for VmidOptions {
    fn default() -> Self {
        Self {
            range_start: default_range_start(),
            range_end: default_range_end(),
            vmid: None,
        }
    }
}

// ============================================================================
// Cleanup Policy
// ============================================================================

/// When transient local artifacts are removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    /// Only after the run reached `Configured`. Failed runs keep everything
    /// for diagnosis and retry.
    #[default]
    OnSuccess,

    /// Also after an abort, removing the normalized image and the guest
    /// document. The cached source image and host objects are kept.
    Always,
}

// ============================================================================
// Top-level Options
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CloudplateOptions {
    /// Work directory: image cache, generated artifacts, lock, logs.
    #[serde(default = "default_home_dir")]
    pub home_dir: PathBuf,

    #[serde(default)]
    pub tools: HostTools,

    #[serde(default)]
    pub vm: VmOptions,

    #[serde(default)]
    pub guest: GuestConfigOptions,

    #[serde(default)]
    pub poll: PollOptions,

    #[serde(default)]
    pub vmid: VmidOptions,

    #[serde(default)]
    pub cleanup: CleanupPolicy,
}

fn default_home_dir() -> PathBuf {
    std::env::var(const_envs::CLOUDPLATE_HOME)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let mut path = home_dir().unwrap_or_else(|| PathBuf::from("/var/lib"));
            path.push(const_dirs::CLOUDPLATE_DIR);
            path
        })
}

impl Default for CloudplateOptions {
    fn default() -> Self {
        Self {
            home_dir: default_home_dir(),
            tools: HostTools::default(),
            vm: VmOptions::default(),
            guest: GuestConfigOptions::default(),
            poll: PollOptions::default(),
            vmid: VmidOptions::default(),
            cleanup: CleanupPolicy::default(),
        }
    }
}

impl CloudplateOptions {
    /// Load options from a YAML file. Missing fields take their defaults.
    pub fn from_yaml_file(path: &Path) -> CloudplateResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CloudplateError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let options: Self = serde_yaml::from_str(&content).map_err(|e| {
            CloudplateError::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        options.validate()?;
        Ok(options)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> CloudplateResult<()> {
        if self.vmid.range_start > self.vmid.range_end {
            return Err(CloudplateError::Config(format!(
                "Identifier range is empty: {}..={}",
                self.vmid.range_start, self.vmid.range_end
            )));
        }

        if self.poll.max_attempts == 0 {
            return Err(CloudplateError::Config(
                "poll.max_attempts must be at least 1".into(),
            ));
        }

        if let Some(size) = &self.vm.disk_size {
            crate::disk::parse_size(size)?;
        }

        Ok(())
    }
}
