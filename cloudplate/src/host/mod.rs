//! Host command execution.
//!
//! Every interaction with the hypervisor goes through [`CommandExecutor`]:
//! one external program, run to completion, reported as a
//! [`CommandOutcome`]. Commands are argument vectors, never shell strings,
//! so identifiers and paths cannot be reinterpreted by a shell.
//!
//! The executor does not retry and does not interpret output; policy lives
//! in the callers.

mod commands;

pub use commands::HostCommands;

use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;

/// Only the trailing bytes of stderr are kept, to avoid pathological
/// diagnostics from chatty tools.
const MAX_DIAGNOSTIC_BYTES: usize = 1024;

/// An external program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl HostCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Program name followed by arguments, for matching in tests and logs.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

/// Shell-quoted preview, for logs only. Never executed.
impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,@+%".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Result of one command: success flag plus captured output.
///
/// Consumed immediately by the caller; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// True only when the process exited with status zero.
    pub ok: bool,
    pub stdout: String,
    /// Trailing stderr, or the reason the process could not be run.
    pub diagnostic: String,
}

impl CommandOutcome {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            ok: true,
            stdout: stdout.into(),
            diagnostic: String::new(),
        }
    }

    pub fn failure(diagnostic: impl Into<String>) -> Self {
        Self {
            ok: false,
            stdout: String::new(),
            diagnostic: diagnostic.into(),
        }
    }
}

/// Runs host commands.
///
/// Implementations must be synchronous from the caller's point of view:
/// `execute` returns only once the command has terminated.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &HostCommand) -> CommandOutcome;
}

/// Executes commands as local child processes.
///
/// Children are killed if the future is dropped, so a cancelled run does not
/// leave a transfer or conversion running behind it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(&self, command: &HostCommand) -> CommandOutcome {
        tracing::info!(command = %command, "Executing host command");

        let output = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(program = %command.program, "Failed to execute command: {}", e);
                return CommandOutcome::failure(format!(
                    "failed to execute {}: {}",
                    command.program, e
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = trailing_utf8(&output.stderr);

        if output.status.success() {
            tracing::trace!(program = %command.program, "Command succeeded");
            return CommandOutcome {
                ok: true,
                stdout,
                diagnostic: stderr,
            };
        }

        let diagnostic = if stderr.is_empty() {
            format!("{} exited with {}", command.program, output.status)
        } else {
            stderr
        };
        tracing::error!(command = %command, "Command failed: {}", diagnostic);

        CommandOutcome {
            ok: false,
            stdout,
            diagnostic,
        }
    }
}


/// Last `MAX_DIAGNOSTIC_BYTES` of `bytes` as lossy UTF-8, trimmed.
fn trailing_utf8(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(MAX_DIAGNOSTIC_BYTES);
    String::from_utf8_lossy(&bytes[start..]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_only_when_needed() {
        let cmd = HostCommand::new("qm")
            .args(["set", "1030", "--net0", "virtio,bridge=vmbr0"])
            .arg("two words")
            .arg("it's");

        assert_eq!(
            cmd.to_string(),
            r"qm set 1030 --net0 virtio,bridge=vmbr0 'two words' 'it'\''s'"
        );
    }

    #[test]
    fn test_argv() {
        let cmd = HostCommand::new("qemu-img").args(["resize", "/x.qcow2", "32G"]);
        assert_eq!(cmd.argv(), vec!["qemu-img", "resize", "/x.qcow2", "32G"]);
    }

    #[test]
    fn test_trailing_utf8_truncates() {
        let long = vec![b'a'; MAX_DIAGNOSTIC_BYTES + 100];
        assert_eq!(trailing_utf8(&long).len(), MAX_DIAGNOSTIC_BYTES);
        assert_eq!(trailing_utf8(b"  oops\n"), "oops");
    }

    #[tokio::test]
    async fn test_process_executor_success_captures_stdout() {
        let outcome = ProcessExecutor::new()
            .execute(&HostCommand::new("sh").args(["-c", "echo hello"]))
            .await;

        assert!(outcome.ok);
        assert_eq!(outcome.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_process_executor_failure_captures_stderr() {
        let outcome = ProcessExecutor::new()
            .execute(&HostCommand::new("sh").args(["-c", "echo broken >&2; exit 3"]))
            .await;

        assert!(!outcome.ok);
        assert_eq!(outcome.diagnostic, "broken");
    }

    #[tokio::test]
    async fn test_process_executor_silent_failure_reports_status() {
        let outcome = ProcessExecutor::new()
            .execute(&HostCommand::new("sh").args(["-c", "exit 4"]))
            .await;

        assert!(!outcome.ok);
        assert!(outcome.diagnostic.contains("exited with"));
    }

    #[tokio::test]
    async fn test_process_executor_missing_binary() {
        let outcome = ProcessExecutor::new()
            .execute(&HostCommand::new("/nonexistent/cloudplate-no-such-tool"))
            .await;

        assert!(!outcome.ok);
        assert!(outcome.diagnostic.starts_with("failed to execute"));
    }

    #[tokio::test]
    async fn test_arguments_are_not_shell_interpreted() {
        let outcome = ProcessExecutor::new()
            .execute(&HostCommand::new("echo").arg("$(id); rm -rf /tmp/never"))
            .await;

        assert!(outcome.ok);
        assert_eq!(outcome.stdout.trim(), "$(id); rm -rf /tmp/never");
    }
}
