use std::sync::{Arc, Mutex};

use clap::Args;
use cloudplate::CancellationToken;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;

use super::create::{ProvisionFlags, print_report};

#[derive(Args, Debug)]
pub struct InteractiveArgs {
    #[command(flatten)]
    pub provision: ProvisionFlags,
}

/// Routes Ctrl-C for the whole session: it cancels the run in flight, or
/// ends the session when pressed at the prompt.
struct Interrupts {
    session: CancellationToken,
    current: Arc<Mutex<Option<CancellationToken>>>,
    listener: JoinHandle<()>,
}

impl Interrupts {
    fn install() -> Self {
        let session = CancellationToken::new();
        let current: Arc<Mutex<Option<CancellationToken>>> = Arc::default();

        let listener = {
            let session = session.clone();
            let current = current.clone();
            tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    let run = current.lock().ok().and_then(|slot| slot.as_ref().cloned());
                    match run {
                        Some(run) => {
                            tracing::warn!("Interrupted, cancelling current run");
                            run.cancel();
                        }
                        None => {
                            session.cancel();
                            break;
                        }
                    }
                }
            })
        };

        Self {
            session,
            current,
            listener,
        }
    }

    /// Token for the next run. Cancelling it leaves the session alive.
    fn begin_run(&self) -> CancellationToken {
        let token = self.session.child_token();
        if let Ok(mut slot) = self.current.lock() {
            *slot = Some(token.clone());
        }
        token
    }

    fn end_run(&self) {
        if let Ok(mut slot) = self.current.lock() {
            *slot = None;
        }
    }
}

impl Drop for Interrupts {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

pub async fn execute(args: InteractiveArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let mut options = global.load_options()?;
    args.provision.apply(&mut options);
    options.validate()?;

    let runtime = global.create_runtime(options)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    let storage = match &args.provision.storage {
        Some(storage) => storage.clone(),
        None => {
            let storages = runtime.storages().await?;
            println!("Available storages:");
            for storage in storages.iter().filter(|s| s.is_active()) {
                println!("  {} ({})", storage.name, storage.kind);
            }
            stdout.write_all(b"Storage: ").await?;
            stdout.flush().await?;
            match lines.next_line().await? {
                Some(line) if !line.trim().is_empty() => line.trim().to_string(),
                _ => anyhow::bail!("no storage given"),
            }
        }
    };

    let interrupts = Interrupts::install();
    let mut failures = 0usize;
    loop {
        stdout
            .write_all(b"\nImage URL (or 'q' to quit): ")
            .await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = interrupts.session.cancelled() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let url = line.trim();
        if url.eq_ignore_ascii_case("q") {
            break;
        }
        if url.is_empty() {
            continue;
        }

        let cancel = interrupts.begin_run();
        let timer = global.arm_timeout(&cancel);
        let result = runtime.provision(url, &storage, &cancel).await;
        interrupts.end_run();
        if let Some(timer) = timer {
            timer.abort();
        }

        match result {
            Ok(report) => {
                print_report(&report, false)?;
                println!("Template ready: {} on {}", report.name, report.storage);
            }
            Err(abort) => {
                failures += 1;
                eprintln!("Error: {}", abort);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} run(s) failed", failures);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::GlobalFlags;
    use std::time::Duration;

    fn flags(timeout: Option<u64>) -> GlobalFlags {
        GlobalFlags {
            home: None,
            config: None,
            timeout,
            log_level: "info".into(),
        }
    }

    #[tokio::test]
    async fn test_cancelled_run_leaves_session_alive() {
        let interrupts = Interrupts::install();

        let first = interrupts.begin_run();
        first.cancel();
        interrupts.end_run();

        let second = interrupts.begin_run();
        assert!(!second.is_cancelled());
        assert!(!interrupts.session.is_cancelled());
        assert!(interrupts.current.lock().unwrap().is_some());

        interrupts.end_run();
        assert!(interrupts.current.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_end_cancels_run_in_flight() {
        let interrupts = Interrupts::install();
        let run = interrupts.begin_run();

        interrupts.session.cancel();
        assert!(run.is_cancelled());
    }

    #[tokio::test]
    async fn test_timer_is_only_armed_with_timeout() {
        let token = CancellationToken::new();
        assert!(flags(None).arm_timeout(&token).is_none());
    }

    #[tokio::test]
    async fn test_timeout_cancels_run() {
        let token = CancellationToken::new();
        let _timer = flags(Some(0)).arm_timeout(&token);

        tokio::time::timeout(Duration::from_secs(5), token.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_aborted_timer_never_fires() {
        let token = CancellationToken::new();
        let timer = flags(Some(3600)).arm_timeout(&token).unwrap();
        timer.abort();

        assert!(timer.await.unwrap_err().is_cancelled());
        assert!(!token.is_cancelled());
    }
}
