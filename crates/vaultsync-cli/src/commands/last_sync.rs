use std::path::Path;

use serde::Serialize;
use vaultsync_core::db::SqliteKeyValueStore;
use vaultsync_core::services::KeyValueStore;
use vaultsync_core::sync::{format_timestamp, last_sync_key, parse_timestamp};

use crate::error::CliError;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct LastSyncItem {
    pub user_id: String,
    pub last_sync: Option<String>,
}

pub async fn read_last_sync(user_id: &str, db_path: &Path) -> Result<LastSyncItem, CliError> {
    if !db_path.is_file() {
        return Err(CliError::DatabaseNotFound(db_path.display().to_string()));
    }
    let storage = SqliteKeyValueStore::open(db_path)?;
    let last_sync = match storage.get(&last_sync_key(user_id)).await? {
        Some(raw) => Some(format_timestamp(parse_timestamp(&raw)?)),
        None => None,
    };
    Ok(LastSyncItem {
        user_id: user_id.to_string(),
        last_sync,
    })
}

pub async fn run_last_sync(user_id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let item = read_last_sync(user_id, db_path).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        match item.last_sync {
            Some(last_sync) => println!("{last_sync}"),
            None => println!("Never synced"),
        }
    }
    Ok(())
}
