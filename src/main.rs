//! cargo-groom - Cargo cache grooming for CI
//!
//! CLI entry point that dispatches to subcommands.

use cargo_groom::cli::{Cli, Commands};
use cargo_groom::config::Settings;
use cargo_groom::error::GroomResult;
use cargo_groom::state::GroomState;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> GroomResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("cargo_groom=warn"),
        1 => EnvFilter::new("cargo_groom=info"),
        _ => EnvFilter::new("cargo_groom=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let settings = Settings::load(cli.config.as_deref()).await?;
    let state_path = cli.state_file.unwrap_or_else(GroomState::default_path);

    match cli.command {
        Commands::Restore(args) => {
            cargo_groom::cli::commands::restore(args, &settings, &state_path).await
        }
        Commands::Groom(args) => {
            cargo_groom::cli::commands::groom(args, &settings, &state_path).await
        }
        Commands::Key => cargo_groom::cli::commands::key(&settings).await,
        Commands::Snapshot(args) => cargo_groom::cli::commands::snapshot(args, &settings).await,
        Commands::Stamp(args) => cargo_groom::cli::commands::stamp(args).await,
    }
}
