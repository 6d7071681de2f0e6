use vaultsync_core::config::EngineConfig;

use crate::error::CliError;

pub fn run_config(as_json: bool) -> Result<(), CliError> {
    let config = EngineConfig::from_env()?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        for line in format_config_lines(&config) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_config_lines(config: &EngineConfig) -> Vec<String> {
    vec![
        format!("notification_ttl: {}s", config.notification_ttl.as_secs()),
        format!("purge_interval: {}s", config.purge_interval.as_secs()),
        format!(
            "sync_check_interval: {}s",
            config.sync_check_interval.as_secs()
        ),
        format!("full_sync_interval: {}s", config.full_sync_interval.as_secs()),
    ]
}
