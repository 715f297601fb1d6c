use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio::task::JoinHandle;
use cloudplate::{CancellationToken, Cloudplate, CloudplateOptions};

use crate::commands;

#[derive(Parser, Debug)]
#[command(
    name = "cloudplate",
    version,
    about = "Turn remote cloud disk images into ready-to-clone VM templates"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision one template from an image URL
    Create(commands::create::CreateArgs),
    /// Provision one template per URL listed in a file
    Batch(commands::batch::BatchArgs),
    /// Prompt for image URLs until 'q'
    Interactive(commands::interactive::InteractiveArgs),
    /// Check an image URL without touching the host
    Validate(commands::validate::ValidateArgs),
    /// List the host's storage backends
    Storages(commands::storages::StoragesArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GlobalFlags {
    /// Work directory (image cache, generated files, logs)
    #[arg(long, global = true, env = "CLOUDPLATE_HOME")]
    pub home: Option<PathBuf>,

    /// YAML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Cancel a run still going after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

impl GlobalFlags {
    /// Options from `--config` (or defaults) with `--home` applied.
    pub fn load_options(&self) -> anyhow::Result<CloudplateOptions> {
        let mut options = match &self.config {
            Some(path) => CloudplateOptions::from_yaml_file(path)?,
            None => CloudplateOptions::default(),
        };
        if let Some(home) = &self.home {
            options.home_dir = std::path::absolute(home)?;
        }
        Ok(options)
    }

    /// Start logging and open a runtime on `options`.
    pub fn create_runtime(&self, options: CloudplateOptions) -> anyhow::Result<Cloudplate> {
        let logs_dir = options
            .home_dir
            .join(cloudplate::runtime::layout::dirs::LOGS_DIR);
        cloudplate::util::init_logging(&logs_dir, &self.log_level)?;
        Ok(Cloudplate::new(options)?)
    }

    /// Token cancelled on Ctrl-C or when `--timeout` elapses.
    pub fn cancellation(&self) -> CancellationToken {
        let token = CancellationToken::new();

        let on_signal = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling current run");
                on_signal.cancel();
            }
        });
        let _ = self.arm_timeout(&token);

        token
    }

    /// Cancel `token` once `--timeout` elapses. Abort the returned handle
    /// when the run finishes first.
    pub fn arm_timeout(&self, token: &CancellationToken) -> Option<JoinHandle<()>> {
        let secs = self.timeout?;
        let on_timeout = token.clone();
        Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            tracing::warn!(timeout_secs = secs, "Timeout elapsed, cancelling current run");
            on_timeout.cancel();
        }))
    }
}
