#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use std::time::Duration;

pub struct TestContext {
    pub cmd: Command,
    pub home: PathBuf,
    // Removed when the test is done
    pub _dir: tempfile::TempDir,
}

impl TestContext {
    /// Another command on the same home directory.
    pub fn new_cmd(&self) -> Command {
        command(&self.home)
    }
}

fn command(home: &PathBuf) -> Command {
    let bin_path = env!("CARGO_BIN_EXE_cloudplate");
    let mut cmd = Command::new(bin_path);
    // You can override this with .timeout(Duration::from_secs(N))
    cmd.timeout(Duration::from_secs(30));
    cmd.env_remove("RUST_LOG");
    cmd.env_remove("CLOUDPLATE_HOME");
    cmd.arg("--home").arg(home);
    cmd
}

/// A command on a fresh, private home directory.
pub fn cloudplate() -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("home");
    TestContext {
        cmd: command(&home),
        home,
        _dir: dir,
    }
}
