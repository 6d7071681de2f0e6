//! In-memory collaborator implementations.
//!
//! Used by the CLI replay and by tests. Every type is cheap to clone and
//! clones share state, so a test can keep a handle to inspect what the
//! engine wrote.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::get_domain;
use crate::error::{Error, Result};
use crate::models::{Cipher, Collection, Folder, SyncSnapshot};
use crate::services::{AuthState, CipherStore, CollectionStore, FolderStore, KeyValueStore, VaultApi};

#[derive(Debug, Default)]
struct VaultState {
    folders: BTreeMap<String, Folder>,
    ciphers: BTreeMap<String, Cipher>,
    collections: Vec<Collection>,
    collections_missing: bool,
    delete_calls: usize,
    server_saves: Vec<Cipher>,
}

/// Local vault cache implementing the folder, cipher, and collection stores
#[derive(Debug, Clone, Default)]
pub struct MemoryVault {
    state: Arc<Mutex<VaultState>>,
}

impl MemoryVault {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cache from a snapshot
    pub async fn from_snapshot(snapshot: SyncSnapshot) -> Self {
        let vault = Self::new();
        {
            let mut state = vault.state.lock().await;
            state.folders = snapshot
                .folders
                .into_iter()
                .map(|folder| (folder.id.clone(), folder))
                .collect();
            state.ciphers = snapshot
                .ciphers
                .into_iter()
                .map(|cipher| (cipher.id.clone(), cipher))
                .collect();
            state.collections = snapshot.collections;
        }
        vault
    }

    pub async fn folders(&self) -> Vec<Folder> {
        self.state.lock().await.folders.values().cloned().collect()
    }

    pub async fn ciphers(&self) -> Vec<Cipher> {
        self.state.lock().await.ciphers.values().cloned().collect()
    }

    /// Make `all_collections` report the collection list as not found
    pub async fn make_collections_missing(&self) {
        self.state.lock().await.collections_missing = true;
    }

    /// Number of folder/cipher delete calls received
    pub async fn delete_calls(&self) -> usize {
        self.state.lock().await.delete_calls
    }

    /// Ciphers passed to `save_with_server`, in call order
    pub async fn server_saves(&self) -> Vec<Cipher> {
        self.state.lock().await.server_saves.clone()
    }
}

impl FolderStore for MemoryVault {
    async fn get_folder(&self, id: &str) -> Result<Option<Folder>> {
        Ok(self.state.lock().await.folders.get(id).cloned())
    }

    async fn upsert_folder(&self, folder: Folder) -> Result<()> {
        self.state
            .lock()
            .await
            .folders
            .insert(folder.id.clone(), folder);
        Ok(())
    }

    async fn delete_folder(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.delete_calls += 1;
        state.folders.remove(id);
        for cipher in state.ciphers.values_mut() {
            if cipher.folder_id.as_deref() == Some(id) {
                cipher.folder_id = None;
            }
        }
        Ok(())
    }

    async fn replace_folders(&self, folders: Vec<Folder>) -> Result<()> {
        self.state.lock().await.folders = folders
            .into_iter()
            .map(|folder| (folder.id.clone(), folder))
            .collect();
        Ok(())
    }

    async fn clear_folders(&self) -> Result<()> {
        self.state.lock().await.folders.clear();
        Ok(())
    }
}

impl CipherStore for MemoryVault {
    async fn get_cipher(&self, id: &str) -> Result<Option<Cipher>> {
        Ok(self.state.lock().await.ciphers.get(id).cloned())
    }

    async fn upsert_cipher(&self, cipher: Cipher) -> Result<()> {
        self.state
            .lock()
            .await
            .ciphers
            .insert(cipher.id.clone(), cipher);
        Ok(())
    }

    async fn delete_cipher(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.delete_calls += 1;
        state.ciphers.remove(id);
        Ok(())
    }

    async fn replace_ciphers(&self, ciphers: Vec<Cipher>) -> Result<()> {
        self.state.lock().await.ciphers = ciphers
            .into_iter()
            .map(|cipher| (cipher.id.clone(), cipher))
            .collect();
        Ok(())
    }

    async fn clear_ciphers(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.ciphers.clear();
        Ok(())
    }

    async fn all_decrypted_for_url(&self, url: &str) -> Result<Vec<Cipher>> {
        let Some(domain) = get_domain(url) else {
            return Ok(Vec::new());
        };

        let state = self.state.lock().await;
        Ok(state
            .ciphers
            .values()
            .filter(|cipher| cipher.is_login())
            .filter(|cipher| {
                cipher.login.as_ref().is_some_and(|login| {
                    login
                        .uris
                        .iter()
                        .any(|uri| get_domain(uri).as_deref() == Some(domain.as_str()))
                })
            })
            .cloned()
            .collect())
    }

    async fn save_with_server(&self, mut cipher: Cipher) -> Result<Cipher> {
        if cipher.name.trim().is_empty() {
            return Err(Error::InvalidInput("Cipher name must not be empty".into()));
        }
        if cipher.id.is_empty() {
            cipher.id = Uuid::now_v7().to_string();
        }

        let mut state = self.state.lock().await;
        state.server_saves.push(cipher.clone());
        state.ciphers.insert(cipher.id.clone(), cipher.clone());
        Ok(cipher)
    }
}

impl CollectionStore for MemoryVault {
    async fn all_collections(&self) -> Result<Vec<Collection>> {
        let state = self.state.lock().await;
        if state.collections_missing {
            return Err(Error::NotFound("collections".to_string()));
        }
        Ok(state.collections.clone())
    }

    async fn replace_collections(&self, collections: Vec<Collection>) -> Result<()> {
        self.state.lock().await.collections = collections;
        Ok(())
    }

    async fn clear_collections(&self) -> Result<()> {
        self.state.lock().await.collections.clear();
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ApiState {
    snapshot: SyncSnapshot,
    unavailable: HashSet<String>,
    fetches: usize,
}

/// Authoritative vault source backed by a snapshot
#[derive(Debug, Clone, Default)]
pub struct MemoryVaultApi {
    state: Arc<Mutex<ApiState>>,
}

impl MemoryVaultApi {
    #[must_use]
    pub fn new(snapshot: SyncSnapshot) -> Self {
        Self {
            state: Arc::new(Mutex::new(ApiState {
                snapshot,
                ..ApiState::default()
            })),
        }
    }

    pub async fn put_folder(&self, folder: Folder) {
        let mut state = self.state.lock().await;
        state.snapshot.folders.retain(|existing| existing.id != folder.id);
        state.snapshot.folders.push(folder);
    }

    pub async fn put_cipher(&self, cipher: Cipher) {
        let mut state = self.state.lock().await;
        state.snapshot.ciphers.retain(|existing| existing.id != cipher.id);
        state.snapshot.ciphers.push(cipher);
    }

    pub async fn remove_cipher(&self, id: &str) {
        self.state
            .lock()
            .await
            .snapshot
            .ciphers
            .retain(|existing| existing.id != id);
    }

    pub async fn set_security_stamp(&self, stamp: Option<String>) {
        self.state.lock().await.snapshot.security_stamp = stamp;
    }

    /// Make every fetch of `id` fail with a transient error
    pub async fn make_unavailable(&self, id: impl Into<String>) {
        self.state.lock().await.unavailable.insert(id.into());
    }

    /// Number of fetch calls served
    pub async fn fetches(&self) -> usize {
        self.state.lock().await.fetches
    }
}

impl VaultApi for MemoryVaultApi {
    async fn fetch_folder(&self, id: &str) -> Result<Folder> {
        let mut state = self.state.lock().await;
        state.fetches += 1;
        if state.unavailable.contains(id) {
            return Err(Error::Transient(format!("folder {id} unavailable")));
        }
        state
            .snapshot
            .folders
            .iter()
            .find(|folder| folder.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn fetch_cipher(&self, id: &str) -> Result<Cipher> {
        let mut state = self.state.lock().await;
        state.fetches += 1;
        if state.unavailable.contains(id) {
            return Err(Error::Transient(format!("cipher {id} unavailable")));
        }
        state
            .snapshot
            .ciphers
            .iter()
            .find(|cipher| cipher.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn fetch_sync(&self) -> Result<SyncSnapshot> {
        let mut state = self.state.lock().await;
        state.fetches += 1;
        Ok(state.snapshot.clone())
    }
}

#[derive(Debug, Default)]
struct AuthSnapshot {
    user_id: Option<String>,
    locked: bool,
}

/// Session state toggled explicitly
#[derive(Debug, Clone, Default)]
pub struct MemoryAuth {
    state: Arc<Mutex<AuthSnapshot>>,
}

impl MemoryAuth {
    /// A signed-in, unlocked session for `user_id`
    pub async fn signed_in(user_id: impl Into<String>) -> Self {
        let auth = Self::default();
        auth.sign_in(user_id).await;
        auth
    }

    pub async fn sign_in(&self, user_id: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.user_id = Some(user_id.into());
        state.locked = false;
    }

    pub async fn sign_out(&self) {
        let mut state = self.state.lock().await;
        state.user_id = None;
        state.locked = false;
    }

    pub async fn lock(&self) {
        self.state.lock().await.locked = true;
    }

    pub async fn unlock(&self) {
        self.state.lock().await.locked = false;
    }
}

impl AuthState for MemoryAuth {
    async fn is_authenticated(&self) -> bool {
        self.state.lock().await.user_id.is_some()
    }

    async fn is_locked(&self) -> bool {
        self.state.lock().await.locked
    }

    async fn user_id(&self) -> Option<String> {
        self.state.lock().await.user_id.clone()
    }

    async fn clear_session(&self) {
        self.sign_out().await;
    }
}

/// Key-value persistence held in a map
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Login;
    use chrono::Utc;

    fn login_cipher(id: &str, username: &str, uri: &str) -> Cipher {
        let mut cipher = Cipher::new_login(
            id,
            Login {
                username: Some(username.to_string()),
                password: Some("pw".to_string()),
                uris: vec![uri.to_string()],
            },
        );
        cipher.id = id.to_string();
        cipher.revision_date = Utc::now();
        cipher
    }

    #[tokio::test]
    async fn url_lookup_matches_registrable_domain() {
        let vault = MemoryVault::new();
        vault
            .upsert_cipher(login_cipher("a", "alice", "https://login.example.com"))
            .await
            .unwrap();
        vault
            .upsert_cipher(login_cipher("b", "bob", "https://other.org"))
            .await
            .unwrap();

        let matches = vault
            .all_decrypted_for_url("https://www.example.com/signin")
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "a");

        assert!(vault.all_decrypted_for_url("about:blank").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_with_server_assigns_id() {
        let vault = MemoryVault::new();
        let saved = vault
            .save_with_server(Cipher::new_login("example.com", Login::default()))
            .await
            .unwrap();
        assert!(!saved.id.is_empty());
        assert_eq!(vault.get_cipher(&saved.id).await.unwrap(), Some(saved));
        assert_eq!(vault.server_saves().await.len(), 1);
    }

    #[tokio::test]
    async fn save_with_server_rejects_unnamed_cipher() {
        let vault = MemoryVault::new();
        let error = vault
            .save_with_server(Cipher::new_login("  ", Login::default()))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn deleting_folder_unfiles_its_ciphers() {
        let vault = MemoryVault::new();
        let mut cipher = login_cipher("a", "alice", "https://example.com");
        cipher.folder_id = Some("f1".to_string());
        vault.upsert_cipher(cipher).await.unwrap();

        vault.delete_folder("f1").await.unwrap();
        let cipher = vault.get_cipher("a").await.unwrap().unwrap();
        assert_eq!(cipher.folder_id, None);
        assert_eq!(vault.delete_calls().await, 1);
    }

    #[tokio::test]
    async fn api_reports_missing_and_unavailable_records() {
        let api = MemoryVaultApi::default();
        api.put_cipher(login_cipher("a", "alice", "https://example.com"))
            .await;
        api.make_unavailable("b").await;

        assert!(api.fetch_cipher("a").await.is_ok());
        assert!(api.fetch_cipher("missing").await.unwrap_err().is_not_found());
        assert!(matches!(
            api.fetch_cipher("b").await.unwrap_err(),
            Error::Transient(_)
        ));
        assert_eq!(api.fetches().await, 3);
    }

    #[tokio::test]
    async fn auth_tracks_session_and_lock() {
        let auth = MemoryAuth::signed_in("user-1").await;
        assert!(auth.is_authenticated().await);
        assert_eq!(auth.user_id().await.as_deref(), Some("user-1"));

        auth.lock().await;
        assert!(auth.is_locked().await);

        auth.sign_out().await;
        assert!(!auth.is_authenticated().await);
        assert!(!auth.is_locked().await);
    }
}
