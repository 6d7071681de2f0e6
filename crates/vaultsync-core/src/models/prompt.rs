//! Staged credential prompt models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A browser tab as reported by the extension host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: i64,
    pub url: String,
}

impl Tab {
    #[must_use]
    pub fn new(id: i64, url: impl Into<String>) -> Self {
        Self { id, url: url.into() }
    }
}

/// Credentials a content script observed being submitted on a page
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginInfo {
    #[serde(default)]
    pub username: Option<String>,
    pub password: String,
    pub url: String,
}

impl std::fmt::Debug for LoginInfo {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("LoginInfo")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("url", &self.url)
            .finish()
    }
}

/// A password change form submission observed on a page
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    #[serde(default)]
    pub current_password: Option<String>,
    pub new_password: String,
    pub url: String,
}

impl std::fmt::Debug for PasswordChange {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PasswordChange")
            .field(
                "current_password",
                &self.current_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("new_password", &"[REDACTED]")
            .field("url", &self.url)
            .finish()
    }
}

/// Prompt type shown in the notification bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    AddLogin,
    ChangePassword,
}

impl NotificationKind {
    /// Banner variant name sent to the content script
    pub const fn banner_type(self) -> &'static str {
        match self {
            Self::AddLogin => "add",
            Self::ChangePassword => "change",
        }
    }
}

/// Data needed to commit a prompt once the user confirms it
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NotificationPayload {
    #[serde(rename_all = "camelCase")]
    AddLogin {
        username: Option<String>,
        password: String,
        uri: String,
    },
    #[serde(rename_all = "camelCase")]
    ChangePassword {
        cipher_id: String,
        new_password: String,
    },
}

impl std::fmt::Debug for NotificationPayload {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddLogin { username, uri, .. } => formatter
                .debug_struct("AddLogin")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .field("uri", uri)
                .finish(),
            Self::ChangePassword { cipher_id, .. } => formatter
                .debug_struct("ChangePassword")
                .field("cipher_id", cipher_id)
                .field("new_password", &"[REDACTED]")
                .finish(),
        }
    }
}

/// A tab-scoped, time-limited prompt awaiting user confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedNotification {
    pub tab_id: i64,
    pub domain: String,
    pub expires_at: DateTime<Utc>,
    pub payload: NotificationPayload,
}

impl QueuedNotification {
    #[must_use]
    pub const fn kind(&self) -> NotificationKind {
        match self.payload {
            NotificationPayload::AddLogin { .. } => NotificationKind::AddLogin,
            NotificationPayload::ChangePassword { .. } => NotificationKind::ChangePassword,
        }
    }

    /// Whether the entry is past its expiry at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Whether the entry belongs to `tab_id` on the given tab domain.
    ///
    /// An unresolvable tab domain never excludes the entry.
    #[must_use]
    pub fn matches_tab(&self, tab_id: i64, tab_domain: Option<&str>) -> bool {
        self.tab_id == tab_id && tab_domain.map_or(true, |domain| domain == self.domain)
    }
}
