//! Background message dispatcher.
//!
//! Routes [`RuntimeMessage`]s to the sync coordinator and the notification
//! queue, and owns the logout sequence run when the session ends or is
//! invalidated.

mod message;
mod scheduler;

pub use message::RuntimeMessage;
pub use scheduler::SyncScheduler;

use std::rc::Rc;

use tokio::sync::broadcast;

use crate::config::EngineConfig;
use crate::notifications::{NotificationQueue, PurgeScheduler};
use crate::services::{
    drain, AuthState, CipherStore, Clock, CollectionStore, FolderStore, KeyValueStore, Signal,
    SignalBus, VaultApi,
};
use crate::sync::SyncCoordinator;

pub struct Runtime<V, R, A, K, C> {
    sync: SyncCoordinator<V, R, A, K, C>,
    queue: NotificationQueue<V, A, K, C>,
    vault: V,
    auth: A,
    bus: SignalBus,
    config: EngineConfig,
}

impl<V, R, A, K, C> Runtime<V, R, A, K, C>
where
    V: FolderStore + CipherStore + CollectionStore + Clone,
    R: VaultApi,
    A: AuthState + Clone,
    K: KeyValueStore + Clone,
    C: Clock + Clone,
{
    pub fn new(
        vault: V,
        api: R,
        auth: A,
        storage: K,
        clock: C,
        bus: SignalBus,
        config: EngineConfig,
    ) -> Self {
        let sync = SyncCoordinator::new(
            vault.clone(),
            api,
            auth.clone(),
            storage.clone(),
            clock.clone(),
            bus.clone(),
        )
        .with_config(&config);
        let queue = NotificationQueue::new(vault.clone(), auth.clone(), storage, clock, bus.clone())
            .with_config(&config);

        Self {
            sync,
            queue,
            vault,
            auth,
            bus,
            config,
        }
    }

    pub const fn sync(&self) -> &SyncCoordinator<V, R, A, K, C> {
        &self.sync
    }

    pub const fn queue(&self) -> &NotificationQueue<V, A, K, C> {
        &self.queue
    }

    pub const fn bus(&self) -> &SignalBus {
        &self.bus
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handle one message. Returns whether it changed or committed anything.
    pub async fn process(&self, message: RuntimeMessage) -> bool {
        let command = message.command();
        tracing::debug!(command, "Processing runtime message");

        let outcome = match message {
            RuntimeMessage::AddLogin { login, tab } => self
                .queue
                .observe_login(&login, &tab)
                .await
                .map(|kind| kind.is_some()),
            RuntimeMessage::ChangedPassword { data, tab } => {
                self.queue.observe_password_change(&data, &tab).await
            }
            RuntimeMessage::AddClose { tab } | RuntimeMessage::ChangeClose { tab } => {
                Ok(self.queue.dismiss(&tab).await > 0)
            }
            RuntimeMessage::AddSave { tab } => {
                self.queue.commit_add(&tab).await.map(|count| count > 0)
            }
            RuntimeMessage::ChangeSave { tab } => self
                .queue
                .commit_change_password(&tab)
                .await
                .map(|count| count > 0),
            RuntimeMessage::NeverSave { tab } => {
                self.queue.never_save(&tab).await.map(|count| count > 0)
            }
            RuntimeMessage::CheckNotificationQueue { tab } => {
                Ok(self.queue.check_queue(&tab).await.is_some())
            }
            RuntimeMessage::Logout { expired } => {
                self.logout(expired).await;
                Ok(true)
            }
            RuntimeMessage::SyncUpsertFolder(notification) => {
                Ok(self.sync.upsert_folder(&notification, false).await)
            }
            RuntimeMessage::SyncUpdateFolder(notification) => {
                Ok(self.sync.upsert_folder(&notification, true).await)
            }
            RuntimeMessage::SyncDeleteFolder(notification) => {
                Ok(self.sync.delete_folder(&notification).await)
            }
            RuntimeMessage::SyncUpsertCipher(notification) => {
                Ok(self.sync.upsert_cipher(&notification, false).await)
            }
            RuntimeMessage::SyncUpdateCipher(notification) => {
                Ok(self.sync.upsert_cipher(&notification, true).await)
            }
            RuntimeMessage::SyncDeleteCipher(notification) => {
                Ok(self.sync.delete_cipher(&notification).await)
            }
            RuntimeMessage::FullSync { force } => Ok(self.sync.full_sync(force).await),
        };

        outcome.unwrap_or_else(|error| {
            tracing::warn!(command, "Runtime message failed: {}", error);
            false
        })
    }

    /// Remove expired prompts now, outside the purge timer.
    pub async fn purge_expired(&self) -> usize {
        self.queue.purge_expired().await
    }

    /// Sweep expired prompts every `purge_interval`.
    pub fn schedule_purge(&self, scheduler: &mut PurgeScheduler)
    where
        C: Send + Sync + 'static,
    {
        scheduler.start(self.queue.sweeper(), self.config.purge_interval);
    }

    /// End the session and wipe every per-user cache.
    pub async fn logout(&self, expired: bool) {
        tracing::info!(expired, "Logging out");
        if let Err(error) = self.sync.on_logout().await {
            tracing::warn!("Failed to reset sync state: {}", error);
        }
        self.queue.clear().await;

        if let Err(error) = self.vault.clear_ciphers().await {
            tracing::warn!("Failed to clear ciphers: {}", error);
        }
        if let Err(error) = self.vault.clear_folders().await {
            tracing::warn!("Failed to clear folders: {}", error);
        }
        if let Err(error) = self.vault.clear_collections().await {
            tracing::warn!("Failed to clear collections: {}", error);
        }

        self.auth.clear_session().await;
        self.bus.send(Signal::DoneLoggingOut { expired });
    }

    /// React to a signal published by the engine. Returns whether it was acted on.
    pub async fn handle_signal(&self, signal: &Signal) -> bool {
        match signal {
            Signal::AuthenticationInvalidated { expired } => {
                self.logout(*expired).await;
                true
            }
            _ => false,
        }
    }

    /// Drain `receiver`, handling each signal, until no new signals arrive.
    ///
    /// Returns every signal observed in publication order.
    pub async fn settle(&self, receiver: &mut broadcast::Receiver<Signal>) -> Vec<Signal> {
        let mut observed = Vec::new();
        loop {
            let batch = drain(receiver);
            if batch.is_empty() {
                return observed;
            }
            for signal in &batch {
                self.handle_signal(signal).await;
            }
            observed.extend(batch);
        }
    }
}

impl<V, R, A, K, C> Runtime<V, R, A, K, C>
where
    V: FolderStore + CipherStore + CollectionStore + Clone + 'static,
    R: VaultApi + 'static,
    A: AuthState + Clone + 'static,
    K: KeyValueStore + Clone + 'static,
    C: Clock + Clone + 'static,
{
    /// Check on every `sync_check_interval` whether a full sync is due.
    ///
    /// Must be called from within a `LocalSet`.
    pub fn schedule_full_sync(self: &Rc<Self>, scheduler: &mut SyncScheduler) {
        let runtime = Rc::clone(self);
        scheduler.start(self.config.sync_check_interval, move || {
            let runtime = Rc::clone(&runtime);
            async move {
                runtime.sync.full_sync(false).await;
            }
        });
    }
}
