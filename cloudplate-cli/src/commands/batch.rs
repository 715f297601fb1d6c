use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use super::create::ProvisionFlags;

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// File with one image URL per line ('#' starts a comment)
    pub file: PathBuf,

    #[command(flatten)]
    pub provision: ProvisionFlags,

    /// Print per-URL results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct BatchEntry {
    url: String,
    vmid: Option<u32>,
    error: Option<String>,
    exit_code: i32,
}

/// URLs from a batch file, without blanks and comments.
pub fn read_urls(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

pub async fn execute(args: BatchArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let storage = args.provision.require_storage()?;
    let content = std::fs::read_to_string(&args.file)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", args.file.display(), e))?;
    let urls = read_urls(&content);

    let mut options = global.load_options()?;
    args.provision.apply(&mut options);
    options.validate()?;

    let runtime = global.create_runtime(options)?;
    let cancel = global.cancellation();

    let mut entries = Vec::with_capacity(urls.len());
    for url in &urls {
        if cancel.is_cancelled() {
            break;
        }

        let entry = match runtime.provision(url, storage, &cancel).await {
            Ok(report) => {
                if !args.json {
                    println!("{}\t{}", report.vmid, url);
                }
                BatchEntry {
                    url: url.to_string(),
                    vmid: Some(report.vmid),
                    error: None,
                    exit_code: 0,
                }
            }
            Err(abort) => {
                eprintln!("Error provisioning '{}': {}", url, abort);
                BatchEntry {
                    url: url.to_string(),
                    vmid: abort.vmid,
                    error: Some(abort.to_string()),
                    exit_code: abort.exit_code(),
                }
            }
        };
        entries.push(entry);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    }

    let failed = entries.iter().filter(|e| e.error.is_some()).count();
    let skipped = urls.len() - entries.len();
    if failed > 0 || skipped > 0 {
        anyhow::bail!(
            "{} of {} image(s) failed, {} not attempted",
            failed,
            urls.len(),
            skipped
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_urls_skips_comments_and_blanks() {
        let content = "\
# ubuntu
https://cloud-images.ubuntu.com/focal/current/focal-server-cloudimg-amd64.img

  https://cloud.centos.org/centos/8/x86_64/images/CentOS-8-GenericCloud.qcow2  
#https://example.com/disabled.img
";
        assert_eq!(
            read_urls(content),
            vec![
                "https://cloud-images.ubuntu.com/focal/current/focal-server-cloudimg-amd64.img",
                "https://cloud.centos.org/centos/8/x86_64/images/CentOS-8-GenericCloud.qcow2",
            ]
        );
    }
}
