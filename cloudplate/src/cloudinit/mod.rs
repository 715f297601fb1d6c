//! Guest bootstrap (cloud-init) document generation.
//!
//! The document is produced from [`GuestConfigOptions`] and written as
//! `#cloud-config` YAML, one file per instance identifier.

use crate::provision::ProvisionError;
use crate::runtime::options::GuestConfigOptions;
use cloudplate_shared::constants::{guest_agent, names};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

const CLOUD_CONFIG_HEADER: &str = "#cloud-config\n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chpasswd {
    pub expire: bool,
}

/// The serialized guest bootstrap document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestConfig {
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub chpasswd: Chpasswd,
    pub ssh_pwauth: bool,
    pub disable_root: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_authorized_keys: Vec<String>,
    pub package_upgrade: bool,
    pub packages: Vec<String>,
    pub runcmd: Vec<String>,
}

impl GuestConfig {
    /// Build the document, refusing unsafe or agent-less combinations.
    pub fn from_options(options: &GuestConfigOptions) -> Result<Self, ProvisionError> {
        if options.ssh_pwauth && !options.disable_root && !options.allow_insecure_login {
            return Err(ProvisionError::GuestConfigFailed {
                reason: "password authentication with root login enabled requires \
                         allow_insecure_login"
                    .into(),
            });
        }

        if !options.packages.iter().any(|p| p == guest_agent::PACKAGE) {
            return Err(ProvisionError::GuestConfigFailed {
                reason: format!("package list must include {}", guest_agent::PACKAGE),
            });
        }

        if options.user.trim().is_empty() {
            return Err(ProvisionError::GuestConfigFailed {
                reason: "user must not be empty".into(),
            });
        }

        Ok(Self {
            user: options.user.clone(),
            password: options.password.clone(),
            chpasswd: Chpasswd {
                expire: options.password_expire,
            },
            ssh_pwauth: options.ssh_pwauth,
            disable_root: options.disable_root,
            ssh_authorized_keys: options.ssh_authorized_keys.clone(),
            package_upgrade: options.package_upgrade,
            packages: options.packages.clone(),
            runcmd: options.runcmd.clone(),
        })
    }

    /// Render as a `#cloud-config` document.
    pub fn render(&self) -> Result<String, ProvisionError> {
        let body = serde_yaml::to_string(self).map_err(|e| ProvisionError::GuestConfigFailed {
            reason: format!("failed to serialize document: {}", e),
        })?;
        Ok(format!("{}{}", CLOUD_CONFIG_HEADER, body))
    }
}

/// Where a written guest document lives and how the instance references it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuestDocument {
    pub path: PathBuf,
    /// Kept after the run because the template references it.
    pub persistent: bool,
    /// `--cicustom` value, when the document is attached as a snippet.
    pub cicustom: Option<String>,
}

/// Generate and write the guest document for `vmid`.
///
/// With `snippets_storage` set the file goes to `snippets_dir` and is
/// persistent; otherwise it is written into `work_dir` and is transient.
pub fn write_guest_config(
    options: &GuestConfigOptions,
    vmid: u32,
    work_dir: &Path,
) -> Result<GuestDocument, ProvisionError> {
    let config = GuestConfig::from_options(options)?;
    let file_name = names::guest_config(vmid);

    let document = match &options.snippets_storage {
        Some(storage) => GuestDocument {
            path: options.snippets_dir.join(&file_name),
            persistent: true,
            cicustom: Some(format!("user={}:snippets/{}", storage, file_name)),
        },
        None => GuestDocument {
            path: work_dir.join(&file_name),
            persistent: false,
            cicustom: None,
        },
    };

    write_document(&document.path, &config.render()?)?;

    tracing::info!(
        vmid,
        path = %document.path.display(),
        persistent = document.persistent,
        "Guest config written"
    );
    Ok(document)
}

fn write_document(path: &Path, content: &str) -> Result<(), ProvisionError> {
    let failed = |e: std::io::Error| ProvisionError::GuestConfigFailed {
        reason: format!("failed to write {}: {}", path.display(), e),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(failed)?;
    }

    // May carry a password hash.
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(failed)?;
    file.write_all(content.as_bytes()).map_err(failed)?;
    file.sync_all().map_err(failed)
}
