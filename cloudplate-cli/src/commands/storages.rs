use clap::Args;
use comfy_table::{Table, presets::NOTHING};

#[derive(Args, Debug)]
pub struct StoragesArgs {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: StoragesArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let runtime = global.create_runtime(global.load_options()?)?;
    let storages = runtime.storages().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&storages)?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_header(vec!["NAME", "TYPE", "STATUS", "AVAILABLE (KiB)"]);
    for storage in &storages {
        table.add_row(vec![
            storage.name.clone(),
            storage.kind.clone(),
            storage.status.clone(),
            storage
                .available
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".into()),
        ]);
    }
    println!("{table}");
    Ok(())
}
