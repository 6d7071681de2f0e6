//! Inbound background messages

use serde::{Deserialize, Serialize};

use crate::models::{LoginInfo, PasswordChange, SyncNotification, Tab};

/// A command delivered to the background runtime by a content script, the
/// popup, or the push notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum RuntimeMessage {
    #[serde(rename = "bgAddLogin")]
    AddLogin { login: LoginInfo, tab: Tab },
    #[serde(rename = "bgChangedPassword")]
    ChangedPassword { data: PasswordChange, tab: Tab },
    #[serde(rename = "bgAddClose")]
    AddClose { tab: Tab },
    #[serde(rename = "bgChangeClose")]
    ChangeClose { tab: Tab },
    #[serde(rename = "bgAddSave")]
    AddSave { tab: Tab },
    #[serde(rename = "bgChangeSave")]
    ChangeSave { tab: Tab },
    #[serde(rename = "bgNeverSave")]
    NeverSave { tab: Tab },
    #[serde(rename = "bgCheckNotificationQueue")]
    CheckNotificationQueue { tab: Tab },
    #[serde(rename = "logout")]
    Logout {
        #[serde(default)]
        expired: bool,
    },
    #[serde(rename = "syncUpsertFolder")]
    SyncUpsertFolder(SyncNotification),
    #[serde(rename = "syncUpdateFolder")]
    SyncUpdateFolder(SyncNotification),
    #[serde(rename = "syncDeleteFolder")]
    SyncDeleteFolder(SyncNotification),
    #[serde(rename = "syncUpsertCipher")]
    SyncUpsertCipher(SyncNotification),
    #[serde(rename = "syncUpdateCipher")]
    SyncUpdateCipher(SyncNotification),
    #[serde(rename = "syncDeleteCipher")]
    SyncDeleteCipher(SyncNotification),
    #[serde(rename = "fullSync")]
    FullSync {
        #[serde(default)]
        force: bool,
    },
}

impl RuntimeMessage {
    /// Command name as it appears on the wire
    pub const fn command(&self) -> &'static str {
        match self {
            Self::AddLogin { .. } => "bgAddLogin",
            Self::ChangedPassword { .. } => "bgChangedPassword",
            Self::AddClose { .. } => "bgAddClose",
            Self::ChangeClose { .. } => "bgChangeClose",
            Self::AddSave { .. } => "bgAddSave",
            Self::ChangeSave { .. } => "bgChangeSave",
            Self::NeverSave { .. } => "bgNeverSave",
            Self::CheckNotificationQueue { .. } => "bgCheckNotificationQueue",
            Self::Logout { .. } => "logout",
            Self::SyncUpsertFolder(_) => "syncUpsertFolder",
            Self::SyncUpdateFolder(_) => "syncUpdateFolder",
            Self::SyncDeleteFolder(_) => "syncDeleteFolder",
            Self::SyncUpsertCipher(_) => "syncUpsertCipher",
            Self::SyncUpdateCipher(_) => "syncUpdateCipher",
            Self::SyncDeleteCipher(_) => "syncDeleteCipher",
            Self::FullSync { .. } => "fullSync",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_login_observation() {
        let message: RuntimeMessage = serde_json::from_str(
            r#"{"command":"bgAddLogin","login":{"username":"alice","password":"pw","url":"https://example.com"},"tab":{"id":5,"url":"https://example.com"}}"#,
        )
        .unwrap();
        assert_eq!(message.command(), "bgAddLogin");
        let RuntimeMessage::AddLogin { login, tab } = message else {
            panic!("expected bgAddLogin");
        };
        assert_eq!(login.username.as_deref(), Some("alice"));
        assert_eq!(tab.id, 5);
    }

    #[test]
    fn parses_sync_notification_inline() {
        let message: RuntimeMessage = serde_json::from_str(
            r#"{"command":"syncUpdateCipher","id":"c1","organizationId":"org","collectionIds":["col"],"revisionDate":"2024-03-01T10:00:00.000Z"}"#,
        )
        .unwrap();
        assert_eq!(
            message,
            RuntimeMessage::SyncUpdateCipher(SyncNotification::shared(
                "c1",
                "org",
                vec!["col".to_string()],
                Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            ))
        );
    }

    #[test]
    fn optional_flags_default_to_false() {
        let message: RuntimeMessage = serde_json::from_str(r#"{"command":"fullSync"}"#).unwrap();
        assert_eq!(message, RuntimeMessage::FullSync { force: false });
        let message: RuntimeMessage = serde_json::from_str(r#"{"command":"logout"}"#).unwrap();
        assert_eq!(message, RuntimeMessage::Logout { expired: false });
    }

    #[test]
    fn unknown_commands_are_rejected() {
        assert!(serde_json::from_str::<RuntimeMessage>(r#"{"command":"bgReseedStorage"}"#).is_err());
    }
}
