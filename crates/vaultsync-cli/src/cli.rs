use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vaultsync")]
#[command(about = "Replay vault sync notifications and credential prompts against local state")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local state database
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a JSON-lines event log through the background runtime
    Replay {
        /// Local vault snapshot (JSON)
        #[arg(long, value_name = "FILE")]
        vault: PathBuf,
        /// Authoritative remote snapshot (JSON)
        #[arg(long, value_name = "FILE")]
        remote: PathBuf,
        /// Runtime messages, one JSON object per line
        #[arg(long, value_name = "FILE")]
        events: PathBuf,
        /// Signed-in user id
        #[arg(long, default_value = "user-1")]
        user: String,
        /// Replay start time (RFC 3339); defaults to now
        #[arg(long, value_name = "TIMESTAMP")]
        start: Option<String>,
        /// Persist sync state in the database instead of memory
        #[arg(long)]
        persist: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the persisted last sync time of a user
    LastSync {
        /// User id
        #[arg(long)]
        user: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the effective engine configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
