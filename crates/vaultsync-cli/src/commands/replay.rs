use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vaultsync_core::config::EngineConfig;
use vaultsync_core::db::SqliteKeyValueStore;
use vaultsync_core::memory::{MemoryAuth, MemoryKeyValueStore, MemoryVault, MemoryVaultApi};
use vaultsync_core::models::SyncSnapshot;
use vaultsync_core::services::{KeyValueStore, ManualClock};
use vaultsync_core::sync::format_timestamp;
use vaultsync_core::{Runtime, RuntimeMessage, Signal, SignalBus};

use crate::commands::common::{parse_start, read_json, read_to_string};
use crate::error::CliError;

pub struct ReplayArgs {
    pub vault: PathBuf,
    pub remote: PathBuf,
    pub events: PathBuf,
    pub user: String,
    pub start: Option<String>,
    pub db_path: Option<PathBuf>,
}

/// Replay-only commands that steer the harness rather than the runtime
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum ControlEvent {
    AdvanceClock { seconds: u64 },
    Purge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayEvent {
    Control(ControlEvent),
    Message(RuntimeMessage),
}

#[derive(Debug, Serialize)]
pub struct ReplayStep {
    pub line: usize,
    pub command: String,
    pub applied: bool,
    pub signals: Vec<Signal>,
}

#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub steps: Vec<ReplayStep>,
    pub queue_length: usize,
    pub folders: usize,
    pub ciphers: usize,
    pub last_sync: Option<String>,
}

pub fn parse_events(source: &str) -> Result<Vec<(usize, ReplayEvent)>, CliError> {
    let mut events = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('#') {
            continue;
        }

        let invalid = |error: serde_json::Error| CliError::InvalidEvent {
            line,
            message: error.to_string(),
        };
        let value: Value = serde_json::from_str(raw).map_err(invalid)?;
        let is_control = matches!(
            value.get("command").and_then(Value::as_str),
            Some("advanceClock" | "purge")
        );
        let event = if is_control {
            ReplayEvent::Control(serde_json::from_value(value).map_err(invalid)?)
        } else {
            ReplayEvent::Message(serde_json::from_value(value).map_err(invalid)?)
        };
        events.push((line, event));
    }
    Ok(events)
}

pub async fn replay(args: &ReplayArgs) -> Result<ReplayReport, CliError> {
    let local: SyncSnapshot = read_json(&args.vault)?;
    let remote: SyncSnapshot = read_json(&args.remote)?;
    let events = parse_events(&read_to_string(&args.events)?)?;

    match args.db_path.as_deref() {
        Some(db_path) => {
            tracing::info!("Persisting sync state to {}", db_path.display());
            let storage = SqliteKeyValueStore::open(db_path)?;
            replay_with(storage, local, remote, &events, args).await
        }
        None => replay_with(MemoryKeyValueStore::new(), local, remote, &events, args).await,
    }
}

async fn replay_with<K>(
    storage: K,
    local: SyncSnapshot,
    remote: SyncSnapshot,
    events: &[(usize, ReplayEvent)],
    args: &ReplayArgs,
) -> Result<ReplayReport, CliError>
where
    K: KeyValueStore + Clone,
{
    let vault = MemoryVault::from_snapshot(local).await;
    let auth = MemoryAuth::signed_in(args.user.clone()).await;
    let clock = ManualClock::new(parse_start(args.start.as_deref())?);
    let bus = SignalBus::default();
    let mut signals = bus.subscribe();
    let runtime = Runtime::new(
        vault.clone(),
        MemoryVaultApi::new(remote),
        auth,
        storage,
        clock.clone(),
        bus,
        EngineConfig::from_env()?,
    );

    let mut steps = Vec::with_capacity(events.len());
    for (line, event) in events {
        let (command, applied) = match event {
            ReplayEvent::Control(ControlEvent::AdvanceClock { seconds }) => {
                clock.advance(Duration::from_secs(*seconds));
                ("advanceClock", true)
            }
            ReplayEvent::Control(ControlEvent::Purge) => {
                ("purge", runtime.purge_expired().await > 0)
            }
            ReplayEvent::Message(message) => {
                (message.command(), runtime.process(message.clone()).await)
            }
        };
        steps.push(ReplayStep {
            line: *line,
            command: command.to_string(),
            applied,
            signals: runtime.settle(&mut signals).await,
        });
    }

    let last_sync = runtime.sync().last_sync().await?.map(format_timestamp);
    Ok(ReplayReport {
        steps,
        queue_length: runtime.queue().len().await,
        folders: vault.folders().await.len(),
        ciphers: vault.ciphers().await.len(),
        last_sync,
    })
}

pub async fn run_replay(args: &ReplayArgs, as_json: bool) -> Result<(), CliError> {
    let report = replay(args).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_report_lines(&report) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_report_lines(report: &ReplayReport) -> Vec<String> {
    let mut lines = Vec::new();
    for step in &report.steps {
        let outcome = if step.applied { "applied" } else { "skipped" };
        lines.push(format!("{:>4}  {:<26} {outcome}", step.line, step.command));
        for signal in &step.signals {
            lines.push(format!("      -> {}", describe_signal(signal)));
        }
    }
    lines.push(String::new());
    lines.push(format!(
        "queue: {}  folders: {}  ciphers: {}",
        report.queue_length, report.folders, report.ciphers
    ));
    lines.push(format!(
        "last sync: {}",
        report.last_sync.as_deref().unwrap_or("never")
    ));
    lines
}

fn describe_signal(signal: &Signal) -> String {
    match serde_json::to_value(signal) {
        Ok(Value::Object(mut fields)) => {
            fields.remove("command");
            if fields.is_empty() {
                signal.name().to_string()
            } else {
                format!("{} {}", signal.name(), Value::Object(fields))
            }
        }
        _ => signal.name().to_string(),
    }
}
