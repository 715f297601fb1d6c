mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use cloudplate::{ProvisionAbort, ProvisionError, exit_codes};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Create(args) => commands::create::execute(args, &cli.global).await,
        Commands::Batch(args) => commands::batch::execute(args, &cli.global).await,
        Commands::Interactive(args) => commands::interactive::execute(args, &cli.global).await,
        Commands::Validate(args) => commands::validate::execute(args, &cli.global).await,
        Commands::Storages(args) => commands::storages::execute(args, &cli.global).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code(&e));
    }
}

/// Distinct exit code per failure class, 1 for anything else.
fn exit_code(error: &anyhow::Error) -> i32 {
    if let Some(abort) = error.downcast_ref::<ProvisionAbort>() {
        return abort.exit_code();
    }
    if let Some(error) = error.downcast_ref::<ProvisionError>() {
        return error.exit_code();
    }
    exit_codes::RUNTIME
}
