use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::error::CliError;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("VAULTSYNC_DB_PATH").map(PathBuf::from))
    {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("vaultsync").join("state.db"))
        .ok_or(CliError::MissingDataDir)
}

pub fn read_to_string(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::ReadFile {
        path: path.display().to_string(),
        source,
    })
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    Ok(serde_json::from_str(&read_to_string(path)?)?)
}

pub fn parse_start(raw: Option<&str>) -> Result<DateTime<Utc>, CliError> {
    match raw {
        Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .map(|date| date.with_timezone(&Utc))
            .map_err(|error| CliError::InvalidStart(format!("{raw}: {error}"))),
        None => Ok(Utc::now()),
    }
}
