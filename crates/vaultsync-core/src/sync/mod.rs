//! Reconciliation of remote change notifications against the local cache.
//!
//! Every public operation is bracketed by `syncStarted` and
//! `syncCompleted { successfully }` on the signal bus, whatever the outcome,
//! so a UI spinner driven by those signals always resolves. Failures never
//! escape: an operation that cannot complete reports `false` and the next
//! full sync corrects the cache.

mod decision;

pub use decision::{
    decide_cipher_upsert, folder_upsert_accepted, shares_visible_collection, UpsertDecision,
};

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::models::{SyncNotification, SyncSnapshot};
use crate::services::{
    AuthState, CipherStore, Clock, CollectionStore, FolderStore, KeyValueStore, Signal, SignalBus,
    VaultApi,
};
use crate::state::SyncState;

const LAST_SYNC_PREFIX: &str = "lastSync_";
const SECURITY_STAMP_PREFIX: &str = "securityStamp_";
const EQUIVALENT_DOMAINS_PREFIX: &str = "equivalentDomains_";

const OUTCOME_NONE: u8 = 0;
const OUTCOME_SUCCESS: u8 = 1;
const OUTCOME_FAILURE: u8 = 2;

/// Storage key holding the last sync time of `user_id`.
pub fn last_sync_key(user_id: &str) -> String {
    format!("{LAST_SYNC_PREFIX}{user_id}")
}

fn security_stamp_key(user_id: &str) -> String {
    format!("{SECURITY_STAMP_PREFIX}{user_id}")
}

fn equivalent_domains_key(user_id: &str) -> String {
    format!("{EQUIVALENT_DOMAINS_PREFIX}{user_id}")
}

/// Format a timestamp the way it is persisted (`2024-03-01T10:00:00.000Z`).
pub fn format_timestamp(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a persisted timestamp.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|date| date.with_timezone(&Utc))
        .map_err(|error| Error::InvalidInput(format!("invalid timestamp '{raw}': {error}")))
}

enum CipherUpsert {
    Applied,
    Rejected,
    /// The edited cipher no longer exists
    Gone,
}

/// `Ok(None)` when a lookup made for an edit reports the record missing.
fn found_for_edit<T>(lookup: Result<T>, is_edit: bool) -> Result<Option<T>> {
    match lookup {
        Ok(found) => Ok(Some(found)),
        Err(error) if is_edit && error.is_not_found() => Ok(None),
        Err(error) => Err(error),
    }
}

/// Applies remote folder/cipher notifications with last-writer-wins semantics.
pub struct SyncCoordinator<V, R, A, K, C> {
    vault: V,
    api: R,
    auth: A,
    storage: K,
    clock: C,
    bus: SignalBus,
    full_sync_interval: Duration,
    in_progress: AtomicBool,
    last_outcome: AtomicU8,
}

impl<V, R, A, K, C> SyncCoordinator<V, R, A, K, C>
where
    V: FolderStore + CipherStore + CollectionStore,
    R: VaultApi,
    A: AuthState,
    K: KeyValueStore,
    C: Clock,
{
    pub fn new(vault: V, api: R, auth: A, storage: K, clock: C, bus: SignalBus) -> Self {
        Self {
            vault,
            api,
            auth,
            storage,
            clock,
            bus,
            full_sync_interval: EngineConfig::default().full_sync_interval,
            in_progress: AtomicBool::new(false),
            last_outcome: AtomicU8::new(OUTCOME_NONE),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.full_sync_interval = config.full_sync_interval;
        self
    }

    /// Whether a reconciliation was started and has not completed yet.
    ///
    /// Overlapping calls share this flag; it is not a lock.
    pub fn is_sync_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SyncState {
        if self.is_sync_in_progress() {
            return SyncState::Syncing;
        }
        match self.last_outcome.load(Ordering::SeqCst) {
            OUTCOME_SUCCESS => SyncState::Synced,
            OUTCOME_FAILURE => SyncState::Error,
            _ => SyncState::Idle,
        }
    }

    pub const fn bus(&self) -> &SignalBus {
        &self.bus
    }

    pub const fn vault(&self) -> &V {
        &self.vault
    }

    /// Apply a folder create (`is_edit == false`) or update notification.
    pub async fn upsert_folder(&self, notification: &SyncNotification, is_edit: bool) -> bool {
        self.sync_started();
        if !self.auth.is_authenticated().await {
            return self.sync_completed(false);
        }

        let applied = match self.apply_folder_upsert(notification, is_edit).await {
            Ok(applied) => applied,
            Err(error) => {
                tracing::warn!(folder_id = %notification.id, "Folder upsert failed: {}", error);
                false
            }
        };
        self.sync_completed(applied)
    }

    pub async fn delete_folder(&self, notification: &SyncNotification) -> bool {
        self.sync_started();
        if !self.auth.is_authenticated().await {
            return self.sync_completed(false);
        }

        if let Err(error) = self.vault.delete_folder(&notification.id).await {
            tracing::warn!(folder_id = %notification.id, "Folder delete failed: {}", error);
            return self.sync_completed(false);
        }
        tracing::info!(folder_id = %notification.id, "Deleted folder from notification");
        self.bus.send(Signal::SyncedDeletedFolder {
            folder_id: notification.id.clone(),
        });
        self.sync_completed(true)
    }

    /// Apply a cipher create (`is_edit == false`) or update notification.
    ///
    /// An edit for a cipher the server no longer has is applied as a delete.
    pub async fn upsert_cipher(&self, notification: &SyncNotification, is_edit: bool) -> bool {
        self.sync_started();
        if !self.auth.is_authenticated().await {
            return self.sync_completed(false);
        }

        let applied = match self.apply_cipher_upsert(notification, is_edit).await {
            Ok(CipherUpsert::Applied) => true,
            Ok(CipherUpsert::Rejected) => false,
            Ok(CipherUpsert::Gone) => {
                tracing::info!(
                    cipher_id = %notification.id,
                    "Edited cipher no longer exists upstream; deleting local copy"
                );
                self.remove_cipher_locally(&notification.id).await
            }
            Err(error) => {
                tracing::warn!(cipher_id = %notification.id, "Cipher upsert failed: {}", error);
                false
            }
        };
        self.sync_completed(applied)
    }

    pub async fn delete_cipher(&self, notification: &SyncNotification) -> bool {
        self.sync_started();
        if !self.auth.is_authenticated().await {
            return self.sync_completed(false);
        }

        let deleted = self.remove_cipher_locally(&notification.id).await;
        self.sync_completed(deleted)
    }

    /// Replace the local cache from the authoritative source.
    ///
    /// Unless `force` is set this is skipped while the last sync is younger
    /// than the configured full sync interval.
    pub async fn full_sync(&self, force: bool) -> bool {
        if !force && !self.needs_full_sync().await {
            tracing::debug!("Last sync is recent; skipping full sync");
            return false;
        }

        self.sync_started();
        if !self.auth.is_authenticated().await {
            return self.sync_completed(false);
        }

        match self.apply_full_sync().await {
            Ok(()) => self.sync_completed(true),
            Err(error) => {
                tracing::warn!("Full sync failed: {}", error);
                self.sync_completed(false)
            }
        }
    }

    /// Whether an unforced full sync would run now.
    pub async fn needs_full_sync(&self) -> bool {
        match self.last_sync().await {
            Ok(Some(last_sync)) => {
                let age = self.clock.now().signed_duration_since(last_sync);
                age.to_std().map_or(false, |age| age >= self.full_sync_interval)
            }
            Ok(None) => true,
            Err(error) => {
                tracing::warn!("Failed to read last sync time: {}", error);
                true
            }
        }
    }

    /// Last sync time of the current user, `None` when signed out or never synced.
    pub async fn last_sync(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(user_id) = self.auth.user_id().await else {
            return Ok(None);
        };
        let Some(raw) = self.storage.get(&last_sync_key(&user_id)).await? else {
            return Ok(None);
        };
        parse_timestamp(&raw).map(Some)
    }

    /// Persist the last sync time of the current user; a no-op when signed out.
    pub async fn set_last_sync(&self, date: DateTime<Utc>) -> Result<()> {
        let Some(user_id) = self.auth.user_id().await else {
            return Ok(());
        };
        self.storage
            .save(&last_sync_key(&user_id), &format_timestamp(date))
            .await
    }

    /// Equivalent domain groups stored by the last full sync.
    pub async fn equivalent_domains(&self) -> Result<Vec<Vec<String>>> {
        let Some(user_id) = self.auth.user_id().await else {
            return Ok(Vec::new());
        };
        match self.storage.get(&equivalent_domains_key(&user_id)).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Reset per-user sync state; must run before the session is cleared.
    pub async fn on_logout(&self) -> Result<()> {
        self.set_last_sync(DateTime::<Utc>::UNIX_EPOCH).await?;
        if let Some(user_id) = self.auth.user_id().await {
            self.storage.remove(&security_stamp_key(&user_id)).await?;
            self.storage.remove(&equivalent_domains_key(&user_id)).await?;
        }
        self.reset();
        Ok(())
    }

    /// Clear the in-memory flags without touching storage.
    pub fn reset(&self) {
        self.in_progress.store(false, Ordering::SeqCst);
        self.last_outcome.store(OUTCOME_NONE, Ordering::SeqCst);
    }

    async fn apply_folder_upsert(
        &self,
        notification: &SyncNotification,
        is_edit: bool,
    ) -> Result<bool> {
        let local = self.vault.get_folder(&notification.id).await?;
        if !folder_upsert_accepted(local.as_ref(), notification, is_edit) {
            tracing::debug!(folder_id = %notification.id, is_edit, "Folder notification rejected");
            return Ok(false);
        }

        let folder = self.api.fetch_folder(&notification.id).await?;
        self.vault.upsert_folder(folder).await?;
        tracing::info!(folder_id = %notification.id, is_edit, "Applied folder notification");
        self.bus.send(Signal::SyncedUpsertedFolder {
            folder_id: notification.id.clone(),
            is_edit,
        });
        Ok(true)
    }

    async fn apply_cipher_upsert(
        &self,
        notification: &SyncNotification,
        is_edit: bool,
    ) -> Result<CipherUpsert> {
        let Some(local) = found_for_edit(self.vault.get_cipher(&notification.id).await, is_edit)?
        else {
            return Ok(CipherUpsert::Gone);
        };
        let accepted = match decide_cipher_upsert(local.as_ref(), notification, is_edit) {
            UpsertDecision::Accept => true,
            UpsertDecision::Reject => false,
            UpsertDecision::VerifyCollections => {
                let collections = self.vault.all_collections().await?;
                shares_visible_collection(notification, &collections)
            }
        };
        if !accepted {
            tracing::debug!(cipher_id = %notification.id, is_edit, "Cipher notification rejected");
            return Ok(CipherUpsert::Rejected);
        }

        let Some(cipher) = found_for_edit(self.api.fetch_cipher(&notification.id).await, is_edit)?
        else {
            return Ok(CipherUpsert::Gone);
        };
        self.vault.upsert_cipher(cipher).await?;
        tracing::info!(cipher_id = %notification.id, is_edit, "Applied cipher notification");
        self.bus.send(Signal::SyncedUpsertedCipher {
            cipher_id: notification.id.clone(),
            is_edit,
        });
        Ok(CipherUpsert::Applied)
    }

    async fn remove_cipher_locally(&self, cipher_id: &str) -> bool {
        if let Err(error) = self.vault.delete_cipher(cipher_id).await {
            tracing::warn!(cipher_id, "Cipher delete failed: {}", error);
            return false;
        }
        tracing::info!(cipher_id, "Deleted cipher from notification");
        self.bus.send(Signal::SyncedDeletedCipher {
            cipher_id: cipher_id.to_string(),
        });
        true
    }

    async fn apply_full_sync(&self) -> Result<()> {
        let user_id = self
            .auth
            .user_id()
            .await
            .ok_or_else(|| Error::Transient("session ended during sync".into()))?;

        let snapshot = self.api.fetch_sync().await?;
        self.verify_security_stamp(&user_id, &snapshot).await?;

        let SyncSnapshot {
            folders,
            collections,
            ciphers,
            equivalent_domains,
            ..
        } = snapshot;
        tracing::info!(
            folders = folders.len(),
            collections = collections.len(),
            ciphers = ciphers.len(),
            "Replacing local vault from full sync"
        );
        self.vault.replace_folders(folders).await?;
        self.vault.replace_collections(collections).await?;
        self.vault.replace_ciphers(ciphers).await?;

        let equivalent_domains: Vec<Vec<String>> = equivalent_domains
            .into_iter()
            .filter(|group| !group.is_empty())
            .collect();
        self.storage
            .save(
                &equivalent_domains_key(&user_id),
                &serde_json::to_string(&equivalent_domains)?,
            )
            .await?;

        self.set_last_sync(self.clock.now()).await
    }

    async fn verify_security_stamp(&self, user_id: &str, snapshot: &SyncSnapshot) -> Result<()> {
        let key = security_stamp_key(user_id);
        let stored = self.storage.get(&key).await?;
        if let Some(stored) = stored {
            if snapshot.security_stamp.as_deref() != Some(stored.as_str()) {
                tracing::warn!("Security stamp changed; invalidating session");
                self.bus
                    .send(Signal::AuthenticationInvalidated { expired: true });
                return Err(Error::SecurityStampChanged);
            }
        }

        if let Some(stamp) = snapshot.security_stamp.as_deref() {
            self.storage.save(&key, stamp).await?;
        }
        Ok(())
    }

    fn sync_started(&self) {
        self.in_progress.store(true, Ordering::SeqCst);
        self.bus.send(Signal::SyncStarted);
    }

    fn sync_completed(&self, successfully: bool) -> bool {
        self.in_progress.store(false, Ordering::SeqCst);
        self.last_outcome.store(
            if successfully {
                OUTCOME_SUCCESS
            } else {
                OUTCOME_FAILURE
            },
            Ordering::SeqCst,
        );
        self.bus.send(Signal::SyncCompleted { successfully });
        successfully
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryAuth, MemoryKeyValueStore, MemoryVault, MemoryVaultApi};
    use crate::models::Folder;
    use crate::services::{drain, ManualClock};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    type TestCoordinator =
        SyncCoordinator<MemoryVault, MemoryVaultApi, MemoryAuth, MemoryKeyValueStore, ManualClock>;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    async fn coordinator() -> (TestCoordinator, MemoryAuth, MemoryKeyValueStore, ManualClock) {
        let auth = MemoryAuth::signed_in("user-1").await;
        let storage = MemoryKeyValueStore::new();
        let clock = ManualClock::new(start());
        let coordinator = SyncCoordinator::new(
            MemoryVault::new(),
            MemoryVaultApi::default(),
            auth.clone(),
            storage.clone(),
            clock.clone(),
            SignalBus::default(),
        );
        (coordinator, auth, storage, clock)
    }

    #[tokio::test]
    async fn timestamps_round_trip_in_persisted_format() {
        let formatted = format_timestamp(start());
        assert_eq!(formatted, "2024-03-01T10:00:00.000Z");
        assert_eq!(parse_timestamp(&formatted).unwrap(), start());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[tokio::test]
    async fn last_sync_is_per_user_and_none_when_signed_out() {
        let (coordinator, auth, storage, _) = coordinator().await;
        coordinator.set_last_sync(start()).await.unwrap();
        assert_eq!(coordinator.last_sync().await.unwrap(), Some(start()));
        assert_eq!(
            storage.get("lastSync_user-1").await.unwrap().as_deref(),
            Some("2024-03-01T10:00:00.000Z")
        );

        auth.sign_out().await;
        assert_eq!(coordinator.last_sync().await.unwrap(), None);
        coordinator.set_last_sync(start()).await.unwrap();

        auth.sign_in("user-2").await;
        assert_eq!(coordinator.last_sync().await.unwrap(), None);
    }

    #[tokio::test]
    async fn bracket_signals_wrap_unauthenticated_calls() {
        let (coordinator, auth, _, _) = coordinator().await;
        auth.sign_out().await;
        let mut signals = coordinator.bus().subscribe();

        let notification = SyncNotification::personal("f1", start());
        assert!(!coordinator.upsert_folder(&notification, false).await);
        assert_eq!(
            drain(&mut signals),
            vec![
                Signal::SyncStarted,
                Signal::SyncCompleted {
                    successfully: false
                }
            ]
        );
        assert!(!coordinator.is_sync_in_progress());
        assert_eq!(coordinator.state(), SyncState::Error);
    }

    #[tokio::test]
    async fn failed_fetch_reports_failure() {
        let (coordinator, _, _, _) = coordinator().await;
        coordinator.api.make_unavailable("f1").await;

        let notification = SyncNotification::personal("f1", start());
        assert!(!coordinator.upsert_folder(&notification, false).await);
        assert_eq!(coordinator.vault.get_folder("f1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn needs_full_sync_follows_interval() {
        let (coordinator, _, _, clock) = coordinator().await;
        assert!(coordinator.needs_full_sync().await);

        coordinator.set_last_sync(start()).await.unwrap();
        assert!(!coordinator.needs_full_sync().await);

        clock.advance(Duration::from_secs(6 * 60 * 60));
        assert!(coordinator.needs_full_sync().await);
    }

    #[tokio::test]
    async fn full_sync_replaces_cache_and_records_stamp() {
        let (coordinator, _, storage, _) = coordinator().await;
        coordinator
            .api
            .put_folder(Folder {
                id: "f1".to_string(),
                name: "Work".to_string(),
                revision_date: start(),
            })
            .await;
        coordinator
            .api
            .set_security_stamp(Some("stamp-1".to_string()))
            .await;
        coordinator
            .vault
            .upsert_folder(Folder {
                id: "stale".to_string(),
                name: "Old".to_string(),
                revision_date: start(),
            })
            .await
            .unwrap();

        assert!(coordinator.full_sync(false).await);
        let folders = coordinator.vault.folders().await;
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].id, "f1");
        assert_eq!(coordinator.last_sync().await.unwrap(), Some(start()));
        assert_eq!(
            storage.get("securityStamp_user-1").await.unwrap().as_deref(),
            Some("stamp-1")
        );

        assert!(!coordinator.full_sync(false).await);
        assert!(coordinator.full_sync(true).await);
    }

    #[tokio::test]
    async fn changed_security_stamp_invalidates_session() {
        let (coordinator, _, storage, _) = coordinator().await;
        storage.save("securityStamp_user-1", "stamp-1").await.unwrap();
        coordinator
            .api
            .set_security_stamp(Some("stamp-2".to_string()))
            .await;
        let mut signals = coordinator.bus().subscribe();

        assert!(!coordinator.full_sync(true).await);
        assert_eq!(
            drain(&mut signals),
            vec![
                Signal::SyncStarted,
                Signal::AuthenticationInvalidated { expired: true },
                Signal::SyncCompleted {
                    successfully: false
                }
            ]
        );
        assert_eq!(coordinator.last_sync().await.unwrap(), None);
    }

    #[tokio::test]
    async fn full_sync_stores_non_empty_equivalent_domain_groups() {
        let (coordinator, _, _, _) = coordinator().await;
        let api = MemoryVaultApi::new(SyncSnapshot {
            equivalent_domains: vec![
                vec!["example.com".to_string(), "example.net".to_string()],
                Vec::new(),
            ],
            ..SyncSnapshot::default()
        });
        let coordinator = SyncCoordinator::new(
            coordinator.vault,
            api,
            coordinator.auth,
            coordinator.storage,
            coordinator.clock,
            coordinator.bus,
        );

        assert!(coordinator.full_sync(true).await);
        assert_eq!(
            coordinator.equivalent_domains().await.unwrap(),
            vec![vec!["example.com".to_string(), "example.net".to_string()]]
        );
    }

    #[tokio::test]
    async fn logout_resets_last_sync_to_epoch() {
        let (coordinator, _, storage, _) = coordinator().await;
        coordinator.set_last_sync(start()).await.unwrap();
        storage.save("securityStamp_user-1", "stamp-1").await.unwrap();

        coordinator.on_logout().await.unwrap();
        assert_eq!(
            coordinator.last_sync().await.unwrap(),
            Some(DateTime::<Utc>::UNIX_EPOCH)
        );
        assert_eq!(storage.get("securityStamp_user-1").await.unwrap(), None);
        assert_eq!(coordinator.state(), SyncState::Idle);
    }
}
