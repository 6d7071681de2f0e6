//! Per-tab queue of pending save/update credential prompts.
//!
//! Entries are staged from credentials observed on a page, shown one at a
//! time in the tab's notification bar, and either committed through the
//! cipher store or dismissed. An entry stops being eligible once its expiry
//! passes; the [`PurgeScheduler`] sweeps such entries out periodically.

mod scheduler;

pub use scheduler::{ExpirySweeper, PurgeScheduler};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::config::EngineConfig;
use crate::domain::{get_domain, get_hostname};
use crate::error::{Error, Result};
use crate::models::{
    Cipher, Login, LoginInfo, NotificationKind, NotificationPayload, PasswordChange,
    QueuedNotification, Tab,
};
use crate::services::{AuthState, CipherStore, Clock, KeyValueStore, Signal, SignalBus};

/// Storage key disabling the "save this login" prompt
pub const DISABLE_ADD_LOGIN_KEY: &str = "disableAddLoginNotification";
/// Storage key disabling the "update this password" prompt
pub const DISABLE_CHANGED_PASSWORD_KEY: &str = "disableChangedPasswordNotification";
/// Storage key of the hosts never prompted on, a JSON object keyed by hostname
pub const NEVER_DOMAINS_KEY: &str = "neverDomains";

const ADDED_LOGIN_ACTION: &str = "Added Login from Notification Bar";
const CHANGED_PASSWORD_ACTION: &str = "Changed Password from Notification Bar";

pub struct NotificationQueue<V, A, K, C> {
    vault: V,
    auth: A,
    storage: K,
    clock: C,
    bus: SignalBus,
    ttl: Duration,
    entries: Arc<Mutex<Vec<QueuedNotification>>>,
}

impl<V, A, K, C> NotificationQueue<V, A, K, C>
where
    V: CipherStore,
    A: AuthState,
    K: KeyValueStore,
    C: Clock,
{
    pub fn new(vault: V, auth: A, storage: K, clock: C, bus: SignalBus) -> Self {
        Self {
            vault,
            auth,
            storage,
            clock,
            bus,
            ttl: EngineConfig::default().notification_ttl,
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.ttl = config.notification_ttl;
        self
    }

    /// Handle for sweeping expired entries from another task.
    pub fn sweeper(&self) -> ExpirySweeper<C>
    where
        C: Clone,
    {
        ExpirySweeper::new(Arc::clone(&self.entries), self.clock.clone())
    }

    /// Stage a prompt for credentials submitted on a page.
    ///
    /// Queues `AddLogin` when no stored login for the domain has the same
    /// username and `ChangePassword` when exactly one does with a different
    /// password. Several username matches are ambiguous and queue nothing.
    pub async fn observe_login(
        &self,
        login: &LoginInfo,
        tab: &Tab,
    ) -> Result<Option<NotificationKind>> {
        if self.auth.is_locked().await {
            return Ok(None);
        }
        let Some(domain) = get_domain(&login.url) else {
            return Ok(None);
        };
        if self.is_never_domain(&login.url).await? {
            return Ok(None);
        }

        let normalized_username = login.username.as_deref().map(str::to_lowercase);
        let ciphers = self.vault.all_decrypted_for_url(&login.url).await?;
        let matches: Vec<&Cipher> = ciphers
            .iter()
            .filter(|cipher| {
                cipher
                    .username()
                    .is_some_and(|name| Some(name.to_lowercase()) == normalized_username)
            })
            .collect();

        match matches.as_slice() {
            [] => {
                if self.is_disabled(DISABLE_ADD_LOGIN_KEY).await? {
                    return Ok(None);
                }
                let payload = NotificationPayload::AddLogin {
                    username: login.username.clone(),
                    password: login.password.clone(),
                    uri: login.url.clone(),
                };
                self.enqueue(tab, domain, payload).await;
                Ok(Some(NotificationKind::AddLogin))
            }
            [existing] if existing.password() != Some(login.password.as_str()) => {
                if self.is_disabled(DISABLE_CHANGED_PASSWORD_KEY).await? {
                    return Ok(None);
                }
                let payload = NotificationPayload::ChangePassword {
                    cipher_id: existing.id.clone(),
                    new_password: login.password.clone(),
                };
                self.enqueue(tab, domain, payload).await;
                Ok(Some(NotificationKind::ChangePassword))
            }
            [_] => Ok(None),
            _ => {
                tracing::debug!(
                    domain = %domain,
                    matches = matches.len(),
                    "Several logins share the username; not prompting"
                );
                Ok(None)
            }
        }
    }

    /// Stage a password update for a change form submitted on a page.
    ///
    /// The target is the single same-domain login whose password equals the
    /// submitted current password or, without a current password, the only
    /// same-domain login.
    pub async fn observe_password_change(&self, change: &PasswordChange, tab: &Tab) -> Result<bool> {
        if self.auth.is_locked().await {
            return Ok(false);
        }
        let Some(domain) = get_domain(&change.url) else {
            return Ok(false);
        };
        if self.is_never_domain(&change.url).await? {
            return Ok(false);
        }

        let ciphers = self.vault.all_decrypted_for_url(&change.url).await?;
        let target = match change.current_password.as_deref() {
            Some(current) => {
                let mut matching = ciphers
                    .iter()
                    .filter(|cipher| cipher.password() == Some(current));
                match (matching.next(), matching.next()) {
                    (Some(cipher), None) => Some(cipher),
                    _ => None,
                }
            }
            None => match ciphers.as_slice() {
                [only] => Some(only),
                _ => None,
            },
        };

        let Some(target) = target else {
            return Ok(false);
        };
        let payload = NotificationPayload::ChangePassword {
            cipher_id: target.id.clone(),
            new_password: change.new_password.clone(),
        };
        self.enqueue(tab, domain, payload).await;
        Ok(true)
    }

    /// Show the first live prompt for the tab's current domain, if any.
    pub async fn check_queue(&self, tab: &Tab) -> Option<NotificationKind> {
        let tab_domain = get_domain(&tab.url)?;
        let now = self.clock.now();
        let kind = self
            .entries
            .lock()
            .await
            .iter()
            .find(|entry| {
                entry.tab_id == tab.id && entry.domain == tab_domain && !entry.is_expired(now)
            })
            .map(QueuedNotification::kind)?;

        self.bus.send(Signal::OpenNotificationBar {
            tab_id: tab.id,
            banner_type: kind.banner_type().to_string(),
        });
        Some(kind)
    }

    /// Save the tab's staged new logins. Returns the number of ciphers created.
    ///
    /// Fails with [`Error::Locked`] while the vault is locked. When a save
    /// fails, the entries not yet written go back on the queue.
    pub async fn commit_add(&self, tab: &Tab) -> Result<usize> {
        if self.auth.is_locked().await {
            return Err(Error::Locked);
        }

        let taken = self.take_matching(tab, NotificationKind::AddLogin).await;
        let mut created = 0;
        for (index, entry) in taken.iter().enumerate() {
            match self.save_new_login(entry).await {
                Ok(saved) => created += usize::from(saved),
                Err(error) => {
                    self.restore(tab, taken[index..].to_vec()).await;
                    return Err(error);
                }
            }
        }
        Ok(created)
    }

    /// Apply the tab's staged password updates. Returns the number of ciphers updated.
    ///
    /// Entries whose cipher is gone or is not a login are dropped. Locking and
    /// failed saves behave as in [`Self::commit_add`].
    pub async fn commit_change_password(&self, tab: &Tab) -> Result<usize> {
        if self.auth.is_locked().await {
            return Err(Error::Locked);
        }

        let taken = self.take_matching(tab, NotificationKind::ChangePassword).await;
        let mut updated = 0;
        for (index, entry) in taken.iter().enumerate() {
            match self.save_password_update(entry).await {
                Ok(saved) => updated += usize::from(saved),
                Err(error) => {
                    self.restore(tab, taken[index..].to_vec()).await;
                    return Err(error);
                }
            }
        }
        Ok(updated)
    }

    /// Drop the tab's live prompts without saving anything.
    pub async fn dismiss(&self, tab: &Tab) -> usize {
        let tab_domain = get_domain(&tab.url);
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|entry| {
            !(entry.matches_tab(tab.id, tab_domain.as_deref()) && !entry.is_expired(now))
        });
        before - entries.len()
    }

    /// Drop the tab's staged logins and stop prompting on its host.
    pub async fn never_save(&self, tab: &Tab) -> Result<usize> {
        let removed = self.take_matching(tab, NotificationKind::AddLogin).await.len();
        if removed == 0 {
            return Ok(0);
        }

        if let Some(hostname) = get_hostname(&tab.url) {
            let mut domains = self.never_domains().await?;
            domains.insert(hostname.clone(), serde_json::Value::Null);
            self.storage
                .save(NEVER_DOMAINS_KEY, &serde_json::to_string(&domains)?)
                .await?;
            tracing::info!(hostname = %hostname, "Never prompting to save logins for host");
        }
        Ok(removed)
    }

    /// Hostnames recorded by [`Self::never_save`], sorted
    pub async fn never_save_hosts(&self) -> Result<Vec<String>> {
        Ok(self.never_domains().await?.into_iter().map(|(host, _)| host).collect())
    }

    /// Remove every expired entry. Returns the number removed.
    pub async fn purge_expired(&self) -> usize {
        purge(&self.entries, self.clock.now()).await
    }

    /// Remove every entry, live or not.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Snapshot of the queue in insertion order
    pub async fn entries(&self) -> Vec<QueuedNotification> {
        self.entries.lock().await.clone()
    }

    async fn enqueue(&self, tab: &Tab, domain: String, payload: NotificationPayload) {
        let expires_at = self.expiry_from(self.clock.now());
        {
            let mut entries = self.entries.lock().await;
            entries.retain(|entry| entry.tab_id != tab.id);
            entries.push(QueuedNotification {
                tab_id: tab.id,
                domain,
                expires_at,
                payload,
            });
        }
        self.check_queue(tab).await;
    }

    /// Remove and return the tab's live entries of `kind`, closing the bar once per entry.
    async fn take_matching(&self, tab: &Tab, kind: NotificationKind) -> Vec<QueuedNotification> {
        let tab_domain = get_domain(&tab.url);
        let now = self.clock.now();
        let taken = {
            let mut entries = self.entries.lock().await;
            let mut taken = Vec::new();
            for index in (0..entries.len()).rev() {
                let entry = &entries[index];
                if entry.kind() == kind
                    && entry.matches_tab(tab.id, tab_domain.as_deref())
                    && !entry.is_expired(now)
                {
                    taken.push(entries.remove(index));
                }
            }
            taken
        };

        for _ in &taken {
            self.bus.send(Signal::CloseNotificationBar { tab_id: tab.id });
        }
        taken
    }

    async fn save_new_login(&self, entry: &QueuedNotification) -> Result<bool> {
        let NotificationPayload::AddLogin {
            username,
            password,
            uri,
        } = &entry.payload
        else {
            return Ok(false);
        };

        let name = get_hostname(uri).unwrap_or_else(|| entry.domain.clone());
        let name = name.strip_prefix("www.").unwrap_or(&name).to_string();
        let mut cipher = Cipher::new_login(
            name,
            Login {
                username: username.clone(),
                password: Some(password.clone()),
                uris: vec![uri.clone()],
            },
        );
        cipher.revision_date = self.clock.now();

        let saved = self.vault.save_with_server(cipher).await?;
        tracing::info!(cipher_id = %saved.id, action = ADDED_LOGIN_ACTION, "Analytics event");
        self.bus.send(Signal::Analytics {
            action: ADDED_LOGIN_ACTION.to_string(),
        });
        Ok(true)
    }

    async fn save_password_update(&self, entry: &QueuedNotification) -> Result<bool> {
        let NotificationPayload::ChangePassword {
            cipher_id,
            new_password,
        } = &entry.payload
        else {
            return Ok(false);
        };

        let Some(mut cipher) = self.vault.get_cipher(cipher_id).await? else {
            tracing::debug!(cipher_id = %cipher_id, "Staged password update target is gone");
            return Ok(false);
        };
        if !cipher.is_login() {
            return Ok(false);
        }
        cipher.login.get_or_insert_with(Login::default).password = Some(new_password.clone());
        cipher.revision_date = self.clock.now();

        self.vault.save_with_server(cipher).await?;
        tracing::info!(cipher_id = %cipher_id, action = CHANGED_PASSWORD_ACTION, "Analytics event");
        self.bus.send(Signal::Analytics {
            action: CHANGED_PASSWORD_ACTION.to_string(),
        });
        Ok(true)
    }

    /// Put back entries whose commit did not complete and reopen the bar.
    async fn restore(&self, tab: &Tab, entries: Vec<QueuedNotification>) {
        tracing::warn!(
            tab_id = tab.id,
            restored = entries.len(),
            "Commit failed; keeping staged prompts"
        );
        self.entries.lock().await.extend(entries);
        self.check_queue(tab).await;
    }

    async fn never_domains(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        match self.storage.get(NEVER_DOMAINS_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(serde_json::Map::new()),
        }
    }

    async fn is_never_domain(&self, url: &str) -> Result<bool> {
        let Some(hostname) = get_hostname(url) else {
            return Ok(false);
        };
        Ok(self.never_domains().await?.contains_key(&hostname))
    }

    async fn is_disabled(&self, key: &str) -> Result<bool> {
        Ok(self
            .storage
            .get(key)
            .await?
            .is_some_and(|raw| is_truthy(&raw)))
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(now)
    }
}

async fn purge(entries: &Mutex<Vec<QueuedNotification>>, now: DateTime<Utc>) -> usize {
    let mut entries = entries.lock().await;
    let before = entries.len();
    entries.retain(|entry| !entry.is_expired(now));
    let removed = before - entries.len();
    if removed > 0 {
        tracing::debug!(removed, "Purged expired notifications");
    }
    removed
}

fn is_truthy(raw: &str) -> bool {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Bool(value)) => value,
        Ok(serde_json::Value::String(value)) => value.eq_ignore_ascii_case("true"),
        _ => raw.trim().eq_ignore_ascii_case("true"),
    }
}
