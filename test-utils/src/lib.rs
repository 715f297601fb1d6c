//! Test helpers: a scripted host.
//!
//! [`ScriptedExecutor`] stands in for the hypervisor host. Out of the box it
//! behaves like a healthy host (transfers write the destination file,
//! conversions write a qcow2 image, imports show up in the storage listing)
//! and records every command. Individual commands can be overridden by argv
//! prefix.

use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use cloudplate::disk::Qcow2Header;
use cloudplate::{
    CancellationToken, CloudplateOptions, CommandExecutor, CommandOutcome, HostCommand,
};
use parking_lot::Mutex;

/// Virtual size of images produced by the emulated conversion.
pub const CONVERTED_VIRTUAL_SIZE: u64 = 2 * 1024 * 1024 * 1024;

pub const QM_LIST_HEADER: &str =
    "      VMID NAME                 STATUS     MEM(MB)    BOOTDISK(GB) PID\n";

pub const PVESM_LIST_HEADER: &str =
    "Volid                         Format  Type            Size VMID\n";

pub const PVESM_STATUS: &str = "\
Name             Type     Status           Total            Used       Available        %
local             dir     active        98559220        10725864        82783808   10.88%
local-lvm     lvmthin     active       832888832        41644441       791244390    5.00%
";

struct Rule {
    prefix: Vec<String>,
    /// Answered in order; the last one repeats.
    responses: VecDeque<CommandOutcome>,
}

impl Rule {
    fn matches(&self, command: &HostCommand) -> bool {
        let argv = command.argv();
        argv.len() >= self.prefix.len() && self.prefix.iter().zip(&argv).all(|(p, a)| p == a)
    }

    fn next(&mut self) -> CommandOutcome {
        if self.responses.len() > 1 {
            self.responses.pop_front().unwrap_or_default()
        } else {
            self.responses.front().cloned().unwrap_or_default()
        }
    }
}

#[derive(Default)]
struct HostState {
    vms: BTreeSet<u32>,
    imported: Vec<(String, u32)>,
}

#[derive(Default)]
pub struct ScriptedExecutor {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<HostCommand>>,
    host: Mutex<HostState>,
    hide_imports: Mutex<bool>,
    in_flight_cancels: Mutex<Vec<(Vec<String>, CancellationToken)>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Answer commands starting with `prefix` with `outcome` from now on.
    pub fn on(&self, prefix: &[&str], outcome: CommandOutcome) -> &Self {
        self.on_sequence(prefix, vec![outcome])
    }

    /// Answer commands starting with `prefix` with `outcomes` in order; the
    /// last one repeats.
    pub fn on_sequence(&self, prefix: &[&str], outcomes: Vec<CommandOutcome>) -> &Self {
        self.rules.lock().insert(
            0,
            Rule {
                prefix: prefix.iter().map(|s| s.to_string()).collect(),
                responses: outcomes.into(),
            },
        );
        self
    }

    /// Fail commands starting with `prefix` with `diagnostic`.
    pub fn fail(&self, prefix: &[&str], diagnostic: &str) -> &Self {
        self.on(prefix, CommandOutcome::failure(diagnostic))
    }

    /// Imports are accepted but never show up in the storage listing.
    pub fn never_confirm_imports(&self) -> &Self {
        *self.hide_imports.lock() = true;
        self
    }

    /// Cancel `token` while a command starting with `prefix` is running.
    /// That command never completes on its own, like a stalled transfer.
    pub fn cancel_during(&self, prefix: &[&str], token: &CancellationToken) -> &Self {
        self.in_flight_cancels.lock().push((
            prefix.iter().map(|s| s.to_string()).collect(),
            token.clone(),
        ));
        self
    }

    /// Pretend instances already exist on the host.
    pub fn with_existing_vms(&self, vmids: impl IntoIterator<Item = u32>) -> &Self {
        self.host.lock().vms.extend(vmids);
        self
    }

    pub fn calls(&self) -> Vec<HostCommand> {
        self.calls.lock().clone()
    }

    /// Recorded commands starting with `prefix`.
    pub fn calls_matching(&self, prefix: &[&str]) -> Vec<HostCommand> {
        self.calls
            .lock()
            .iter()
            .filter(|c| {
                let argv = c.argv();
                argv.len() >= prefix.len() && prefix.iter().zip(&argv).all(|(p, a)| p == a)
            })
            .cloned()
            .collect()
    }

    pub fn count(&self, prefix: &[&str]) -> usize {
        self.calls_matching(prefix).len()
    }

    fn healthy_host(&self, command: &HostCommand) -> CommandOutcome {
        let argv = command.argv();
        match argv.as_slice() {
            [_, "-q", _, "-O", dest] => {
                write_file(Path::new(dest), b"cloud-image-bytes");
                CommandOutcome::success("")
            }
            [_, "convert", "-O", "qcow2", _, dest] => {
                let header = Qcow2Header {
                    version: 3,
                    cluster_bits: 16,
                    size: CONVERTED_VIRTUAL_SIZE,
                };
                write_file(Path::new(dest), &header.to_bytes());
                CommandOutcome::success("")
            }
            ["qm", "list"] => {
                let mut out = QM_LIST_HEADER.to_string();
                for vmid in &self.host.lock().vms {
                    out.push_str(&format!(
                        "{:>10} vm-{:<18} stopped    2048              32.00 0\n",
                        vmid, vmid
                    ));
                }
                CommandOutcome::success(out)
            }
            ["qm", "create", vmid, ..] => match vmid.parse::<u32>() {
                Ok(vmid) if self.host.lock().vms.insert(vmid) => CommandOutcome::success(""),
                _ => CommandOutcome::failure(format!("VM {} already exists", vmid)),
            },
            ["qm", "importdisk", vmid, _, storage] => {
                if let Ok(vmid) = vmid.parse::<u32>() {
                    self.host.lock().imported.push((storage.to_string(), vmid));
                }
                CommandOutcome::success(format!(
                    "Successfully imported disk as 'unused0:{}:vm-{}-disk-0'",
                    storage, vmid
                ))
            }
            ["pvesm", "list", storage] => {
                let mut out = PVESM_LIST_HEADER.to_string();
                if !*self.hide_imports.lock() {
                    for (s, vmid) in &self.host.lock().imported {
                        if s == storage {
                            out.push_str(&format!(
                                "{}:vm-{}-disk-0      raw     images   34359738368 {}\n",
                                s, vmid, vmid
                            ));
                        }
                    }
                }
                CommandOutcome::success(out)
            }
            ["pvesm", "status"] => CommandOutcome::success(PVESM_STATUS),
            _ => CommandOutcome::success(""),
        }
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(&self, command: &HostCommand) -> CommandOutcome {
        self.calls.lock().push(command.clone());

        let stalled = {
            let argv = command.argv();
            self.in_flight_cancels
                .lock()
                .iter()
                .find(|(prefix, _)| {
                    argv.len() >= prefix.len() && prefix.iter().zip(&argv).all(|(p, a)| p == a)
                })
                .map(|(_, token)| token.clone())
        };
        if let Some(token) = stalled {
            token.cancel();
            return std::future::pending().await;
        }

        let scripted = self
            .rules
            .lock()
            .iter_mut()
            .find(|rule| rule.matches(command))
            .map(Rule::next);

        scripted.unwrap_or_else(|| self.healthy_host(command))
    }
}

fn write_file(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(path, content);
}

/// Options rooted in a fresh temporary home with a fast poll.
pub struct TestHome {
    pub dir: tempfile::TempDir,
    pub options: CloudplateOptions,
}

impl TestHome {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let mut options = CloudplateOptions {
            home_dir: dir.path().join("home"),
            ..CloudplateOptions::default()
        };
        options.poll.interval_ms = 1;
        options.poll.max_attempts = 5;
        options.guest.snippets_dir = dir.path().join("snippets");
        Self { dir, options }
    }

    pub fn images_dir(&self) -> PathBuf {
        self.options.home_dir.join("images")
    }
}

impl Default for TestHome {
    fn default() -> Self {
        Self::new()
    }
}
