use clap::Args;
use cloudplate::{CloudplateOptions, ProvisionReport};

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Image URL (.img, .qcow2 or .raw)
    pub url: String,

    #[command(flatten)]
    pub provision: ProvisionFlags,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Per-run overrides shared by `create`, `batch` and `interactive`.
#[derive(Args, Debug, Clone)]
pub struct ProvisionFlags {
    /// Storage backend receiving the disk
    #[arg(short, long)]
    pub storage: Option<String>,

    /// Use this instance id instead of drawing one
    #[arg(long)]
    pub vmid: Option<u32>,

    /// Grow the disk to this size (e.g. 32G)
    #[arg(long, conflicts_with = "no_resize")]
    pub disk_size: Option<String>,

    /// Keep the image's own disk size
    #[arg(long)]
    pub no_resize: bool,

    /// Memory in MiB
    #[arg(long)]
    pub memory: Option<u32>,

    #[arg(long)]
    pub cores: Option<u8>,

    /// Bridge for the first NIC
    #[arg(long)]
    pub bridge: Option<String>,

    /// Leave the result as a regular instance
    #[arg(long)]
    pub no_template: bool,
}

impl ProvisionFlags {
    pub fn apply(&self, options: &mut CloudplateOptions) {
        if let Some(vmid) = self.vmid {
            options.vmid.vmid = Some(vmid);
        }
        if self.no_resize {
            options.vm.disk_size = None;
        } else if let Some(size) = &self.disk_size {
            options.vm.disk_size = Some(size.clone());
        }
        if let Some(memory) = self.memory {
            options.vm.memory_mib = memory;
        }
        if let Some(cores) = self.cores {
            options.vm.cores = cores;
        }
        if let Some(bridge) = &self.bridge {
            options.vm.bridge = bridge.clone();
        }
        if self.no_template {
            options.vm.convert_to_template = false;
        }
    }

    pub fn require_storage(&self) -> anyhow::Result<&str> {
        self.storage
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("--storage is required"))
    }
}

pub async fn execute(args: CreateArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let storage = args.provision.require_storage()?;

    let mut options = global.load_options()?;
    args.provision.apply(&mut options);
    options.validate()?;

    let runtime = global.create_runtime(options)?;
    let cancel = global.cancellation();

    let report = runtime.provision(&args.url, storage, &cancel).await?;
    print_report(&report, args.json)?;
    Ok(())
}

pub fn print_report(report: &ProvisionReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    println!("{}", report.vmid);
    for warning in &report.cleanup_warnings {
        eprintln!("Warning: {}", warning);
    }
    Ok(())
}
