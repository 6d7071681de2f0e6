use std::io;

use thiserror::Error;
use vaultsync_core::config::ConfigError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] vaultsync_core::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to read {path}: {source}")]
    ReadFile { path: String, source: io::Error },
    #[error("Invalid event on line {line}: {message}")]
    InvalidEvent { line: usize, message: String },
    #[error("Invalid start time: {0}")]
    InvalidStart(String),
    #[error("No state database at {0}")]
    DatabaseNotFound(String),
    #[error("Failed to resolve data directory; pass --db-path or set VAULTSYNC_DB_PATH")]
    MissingDataDir,
}
