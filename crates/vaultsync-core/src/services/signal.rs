//! Fire-and-forget signal bus consumed by UI badges and the session manager

use serde::Serialize;
use tokio::sync::broadcast;

const DEFAULT_BUS_CAPACITY: usize = 256;

/// Messages published by the engine.
///
/// Serialized with the command names the extension UI listens for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Signal {
    SyncStarted,
    SyncCompleted {
        successfully: bool,
    },
    #[serde(rename_all = "camelCase")]
    SyncedUpsertedFolder {
        folder_id: String,
        is_edit: bool,
    },
    #[serde(rename_all = "camelCase")]
    SyncedDeletedFolder {
        folder_id: String,
    },
    #[serde(rename_all = "camelCase")]
    SyncedUpsertedCipher {
        cipher_id: String,
        is_edit: bool,
    },
    #[serde(rename_all = "camelCase")]
    SyncedDeletedCipher {
        cipher_id: String,
    },
    /// The account's session is no longer valid and must be logged out
    AuthenticationInvalidated {
        expired: bool,
    },
    DoneLoggingOut {
        expired: bool,
    },
    #[serde(rename_all = "camelCase")]
    OpenNotificationBar {
        tab_id: i64,
        #[serde(rename = "type")]
        banner_type: String,
    },
    #[serde(rename_all = "camelCase")]
    CloseNotificationBar {
        tab_id: i64,
    },
    Analytics {
        action: String,
    },
}

impl Signal {
    /// Command name of this signal
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SyncStarted => "syncStarted",
            Self::SyncCompleted { .. } => "syncCompleted",
            Self::SyncedUpsertedFolder { .. } => "syncedUpsertedFolder",
            Self::SyncedDeletedFolder { .. } => "syncedDeletedFolder",
            Self::SyncedUpsertedCipher { .. } => "syncedUpsertedCipher",
            Self::SyncedDeletedCipher { .. } => "syncedDeletedCipher",
            Self::AuthenticationInvalidated { .. } => "authenticationInvalidated",
            Self::DoneLoggingOut { .. } => "doneLoggingOut",
            Self::OpenNotificationBar { .. } => "openNotificationBar",
            Self::CloseNotificationBar { .. } => "closeNotificationBar",
            Self::Analytics { .. } => "analytics",
        }
    }
}

/// Broadcast bus; clones publish to the same subscribers.
///
/// Delivery is best effort: signals sent with no subscriber are dropped and
/// slow subscribers may observe `Lagged`.
#[derive(Debug, Clone)]
pub struct SignalBus {
    sender: broadcast::Sender<Signal>,
}

impl SignalBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn send(&self, signal: Signal) {
        tracing::trace!(signal = signal.name(), "Publishing signal");
        if self.sender.send(signal).is_err() {
            tracing::trace!("No signal subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.sender.subscribe()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

/// Drain every signal currently buffered for `receiver`.
pub fn drain(receiver: &mut broadcast::Receiver<Signal>) -> Vec<Signal> {
    let mut signals = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(signal) => signals.push(signal),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Signal receiver lagged");
            }
            Err(_) => break,
        }
    }
    signals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_without_subscribers_is_dropped() {
        let bus = SignalBus::default();
        bus.send(Signal::SyncStarted);
        let mut receiver = bus.subscribe();
        assert!(drain(&mut receiver).is_empty());
    }

    #[test]
    fn subscribers_receive_in_order() {
        let bus = SignalBus::default();
        let mut receiver = bus.subscribe();
        bus.clone().send(Signal::SyncStarted);
        bus.send(Signal::SyncCompleted { successfully: true });
        assert_eq!(
            drain(&mut receiver),
            vec![
                Signal::SyncStarted,
                Signal::SyncCompleted { successfully: true }
            ]
        );
    }

    #[test]
    fn serializes_with_command_names() {
        let json = serde_json::to_value(Signal::SyncedDeletedCipher {
            cipher_id: "c1".to_string(),
        })
        .unwrap();
        assert_eq!(json["command"], "syncedDeletedCipher");
        assert_eq!(json["cipherId"], "c1");

        let json = serde_json::to_value(Signal::OpenNotificationBar {
            tab_id: 5,
            banner_type: "add".to_string(),
        })
        .unwrap();
        assert_eq!(json["command"], "openNotificationBar");
        assert_eq!(json["tabId"], 5);
        assert_eq!(json["type"], "add");
    }
}
