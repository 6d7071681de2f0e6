//! Locally cached vault records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A locally held record whose revision decides reconciliation.
pub trait Revisioned {
    /// Record identifier
    fn id(&self) -> &str;

    /// Server-assigned last-modified time
    fn revision_date(&self) -> DateTime<Utc>;

    /// Whether this local copy is strictly older than `incoming`.
    fn is_older_than(&self, incoming: DateTime<Utc>) -> bool {
        self.revision_date() < incoming
    }
}

/// A folder grouping ciphers in a personal vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub revision_date: DateTime<Utc>,
}

impl Revisioned for Folder {
    fn id(&self) -> &str {
        &self.id
    }

    fn revision_date(&self) -> DateTime<Utc> {
        self.revision_date
    }
}

/// An organization collection visible to the current user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub organization_id: String,
    #[serde(default)]
    pub name: String,
}

/// Cipher type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum CipherKind {
    #[default]
    Login,
    SecureNote,
    Card,
    Identity,
}

/// Login fields of a cipher, as a decrypted view
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Login {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub uris: Vec<String>,
}

impl std::fmt::Debug for Login {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Login")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("uris", &self.uris)
            .finish()
    }
}

/// A single stored secret record, as a decrypted view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cipher {
    pub id: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub collection_ids: Vec<String>,
    pub name: String,
    #[serde(default)]
    pub kind: CipherKind,
    #[serde(default)]
    pub login: Option<Login>,
    pub revision_date: DateTime<Utc>,
}

impl Cipher {
    /// Build a new personal login cipher that has not been saved yet.
    #[must_use]
    pub fn new_login(name: impl Into<String>, login: Login) -> Self {
        Self {
            id: String::new(),
            organization_id: None,
            folder_id: None,
            collection_ids: Vec::new(),
            name: name.into(),
            kind: CipherKind::Login,
            login: Some(login),
            revision_date: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Username of a login cipher
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.login.as_ref()?.username.as_deref()
    }

    /// Password of a login cipher
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.login.as_ref()?.password.as_deref()
    }

    /// Whether this cipher is a login
    #[must_use]
    pub const fn is_login(&self) -> bool {
        matches!(self.kind, CipherKind::Login)
    }
}

impl Revisioned for Cipher {
    fn id(&self) -> &str {
        &self.id
    }

    fn revision_date(&self) -> DateTime<Utc> {
        self.revision_date
    }
}
