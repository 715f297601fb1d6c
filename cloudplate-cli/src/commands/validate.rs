use clap::Args;
use cloudplate::SourceLocator;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Image URL to check
    pub url: String,
}

pub async fn execute(args: ValidateArgs, _global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let locator = SourceLocator::parse(&args.url)?;
    println!("{}", locator.file_name());
    Ok(())
}
