//! Full vault snapshot served by the authoritative source

use serde::{Deserialize, Serialize};

use super::{Cipher, Collection, Folder};

/// Everything a full sync replaces in the local cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    /// Account security stamp; a change means every session must end
    #[serde(default)]
    pub security_stamp: Option<String>,
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default)]
    pub collections: Vec<Collection>,
    #[serde(default)]
    pub ciphers: Vec<Cipher>,
    /// Groups of domains treated as the same site for login matching
    #[serde(default)]
    pub equivalent_domains: Vec<Vec<String>>,
}
