//! Collaborator seams the engine is written against.
//!
//! Stores, the authoritative vault API, session state, and key-value
//! persistence are supplied by the host. In-memory and `SQLite` versions live in
//! [`crate::memory`] and [`crate::db`].

mod clock;
mod signal;

pub use clock::{Clock, ManualClock, SystemClock};
pub use signal::{drain, Signal, SignalBus};

use crate::error::Result;
use crate::models::{Cipher, Collection, Folder, SyncSnapshot};

/// Local folder cache
#[allow(async_fn_in_trait)]
pub trait FolderStore {
    /// Get a folder by id, `None` when absent
    async fn get_folder(&self, id: &str) -> Result<Option<Folder>>;

    /// Insert or overwrite a folder
    async fn upsert_folder(&self, folder: Folder) -> Result<()>;

    /// Remove a folder; absent ids are not an error
    async fn delete_folder(&self, id: &str) -> Result<()>;

    /// Replace every folder with the given set
    async fn replace_folders(&self, folders: Vec<Folder>) -> Result<()>;

    async fn clear_folders(&self) -> Result<()>;
}

/// Local cipher cache
#[allow(async_fn_in_trait)]
pub trait CipherStore {
    /// Get a cipher by id, `None` when absent
    async fn get_cipher(&self, id: &str) -> Result<Option<Cipher>>;

    /// Insert or overwrite a cipher
    async fn upsert_cipher(&self, cipher: Cipher) -> Result<()>;

    /// Remove a cipher; absent ids are not an error
    async fn delete_cipher(&self, id: &str) -> Result<()>;

    /// Replace every cipher with the given set
    async fn replace_ciphers(&self, ciphers: Vec<Cipher>) -> Result<()>;

    async fn clear_ciphers(&self) -> Result<()>;

    /// Decrypted login ciphers matching the page's domain
    async fn all_decrypted_for_url(&self, url: &str) -> Result<Vec<Cipher>>;

    /// Persist a cipher upstream and locally, returning the saved record
    async fn save_with_server(&self, cipher: Cipher) -> Result<Cipher>;
}

/// Collections visible to the current user
#[allow(async_fn_in_trait)]
pub trait CollectionStore {
    async fn all_collections(&self) -> Result<Vec<Collection>>;

    async fn replace_collections(&self, collections: Vec<Collection>) -> Result<()>;

    async fn clear_collections(&self) -> Result<()>;
}

/// Authoritative source of full vault records.
///
/// Missing records must be reported as [`crate::Error::NotFound`].
#[allow(async_fn_in_trait)]
pub trait VaultApi {
    async fn fetch_folder(&self, id: &str) -> Result<Folder>;

    async fn fetch_cipher(&self, id: &str) -> Result<Cipher>;

    async fn fetch_sync(&self) -> Result<SyncSnapshot>;
}

/// Session state of the current user
#[allow(async_fn_in_trait)]
pub trait AuthState {
    async fn is_authenticated(&self) -> bool;

    async fn is_locked(&self) -> bool;

    /// Current user id, `None` when signed out
    async fn user_id(&self) -> Option<String>;

    /// End the session; afterwards the user is unauthenticated
    async fn clear_session(&self);
}

/// String key-value persistence
#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn save(&self, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}
