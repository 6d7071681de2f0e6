//! Engine configuration.
//!
//! Timer and TTL settings shared by the sync coordinator, the notification
//! queue, and their background schedulers. Values come from the environment
//! with validated ranges and fall back to the defaults below.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

const DEFAULT_NOTIFICATION_TTL_SECS: u64 = 30 * 60;
const DEFAULT_PURGE_INTERVAL_SECS: u64 = 2 * 60;
const DEFAULT_SYNC_CHECK_INTERVAL_SECS: u64 = 5 * 60;
const DEFAULT_FULL_SYNC_INTERVAL_SECS: u64 = 6 * 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineConfig {
    /// How long a staged credential prompt stays eligible for display.
    #[serde(serialize_with = "serialize_secs")]
    pub notification_ttl: Duration,
    /// Period of the background sweep removing expired prompts.
    #[serde(serialize_with = "serialize_secs")]
    pub purge_interval: Duration,
    /// Period of the scheduler deciding whether a full sync is due.
    #[serde(serialize_with = "serialize_secs")]
    pub sync_check_interval: Duration,
    /// Minimum age of the last sync before an unforced full sync runs.
    #[serde(serialize_with = "serialize_secs")]
    pub full_sync_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            notification_ttl: Duration::from_secs(DEFAULT_NOTIFICATION_TTL_SECS),
            purge_interval: Duration::from_secs(DEFAULT_PURGE_INTERVAL_SECS),
            sync_check_interval: Duration::from_secs(DEFAULT_SYNC_CHECK_INTERVAL_SECS),
            full_sync_interval: Duration::from_secs(DEFAULT_FULL_SYNC_INTERVAL_SECS),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let notification_ttl = parse_secs(
            &lookup,
            "VAULTSYNC_NOTIFICATION_TTL_SECS",
            DEFAULT_NOTIFICATION_TTL_SECS,
            60..=86_400,
        )?;
        let purge_interval = parse_secs(
            &lookup,
            "VAULTSYNC_PURGE_INTERVAL_SECS",
            DEFAULT_PURGE_INTERVAL_SECS,
            1..=3_600,
        )?;
        let sync_check_interval = parse_secs(
            &lookup,
            "VAULTSYNC_SYNC_CHECK_INTERVAL_SECS",
            DEFAULT_SYNC_CHECK_INTERVAL_SECS,
            10..=86_400,
        )?;
        let full_sync_interval = parse_secs(
            &lookup,
            "VAULTSYNC_FULL_SYNC_INTERVAL_SECS",
            DEFAULT_FULL_SYNC_INTERVAL_SECS,
            60..=604_800,
        )?;

        Ok(Self {
            notification_ttl,
            purge_interval,
            sync_check_interval,
            full_sync_interval,
        })
    }
}

fn parse_secs(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    range: std::ops::RangeInclusive<u64>,
) -> Result<Duration, ConfigError> {
    let Some(raw) = lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    else {
        return Ok(Duration::from_secs(default));
    };

    let secs = raw.parse::<u64>().map_err(|_| {
        ConfigError::Invalid(format!(
            "{name} must be an integer in [{}, {}]",
            range.start(),
            range.end()
        ))
    })?;
    if !range.contains(&secs) {
        return Err(ConfigError::Invalid(format!(
            "{name} must be in [{}, {}]",
            range.start(),
            range.end()
        )));
    }
    Ok(Duration::from_secs(secs))
}

fn serialize_secs<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn defaults_match_background_timers() {
        let config = EngineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.notification_ttl, Duration::from_secs(1800));
        assert_eq!(config.purge_interval, Duration::from_secs(120));
        assert_eq!(config.sync_check_interval, Duration::from_secs(300));
        assert_eq!(config.full_sync_interval, Duration::from_secs(21_600));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("VAULTSYNC_NOTIFICATION_TTL_SECS", "600"),
            ("VAULTSYNC_PURGE_INTERVAL_SECS", " 30 "),
        ]))
        .unwrap();
        assert_eq!(config.notification_ttl, Duration::from_secs(600));
        assert_eq!(config.purge_interval, Duration::from_secs(30));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let error = EngineConfig::from_lookup(lookup_from(&[(
            "VAULTSYNC_NOTIFICATION_TTL_SECS",
            "5",
        )]))
        .unwrap_err();
        assert!(error.to_string().contains("VAULTSYNC_NOTIFICATION_TTL_SECS"));
    }

    #[test]
    fn non_numeric_values_are_rejected() {
        let result = EngineConfig::from_lookup(lookup_from(&[(
            "VAULTSYNC_FULL_SYNC_INTERVAL_SECS",
            "six hours",
        )]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn serializes_durations_as_seconds() {
        let json = serde_json::to_value(EngineConfig::default()).unwrap();
        assert_eq!(json["notification_ttl"], 1800);
        assert_eq!(json["full_sync_interval"], 21_600);
    }
}
