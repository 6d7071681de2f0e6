//! vaultsync CLI - replay sync notifications and credential prompts
//!
//! Drives the background runtime from recorded event logs so reconciliation
//! decisions can be inspected without a browser.

mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_db_path;
use crate::commands::config::run_config;
use crate::commands::last_sync::run_last_sync;
use crate::commands::replay::{run_replay, ReplayArgs};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "vaultsync=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            vault,
            remote,
            events,
            user,
            start,
            persist,
            json,
        } => {
            let db_path = if persist {
                Some(resolve_db_path(cli.db_path)?)
            } else {
                cli.db_path
            };
            let args = ReplayArgs {
                vault,
                remote,
                events,
                user,
                start,
                db_path,
            };
            run_replay(&args, json).await?;
        }
        Commands::LastSync { user, json } => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_last_sync(&user, json, &db_path).await?;
        }
        Commands::Config { json } => run_config(json)?,
    }

    Ok(())
}
