//! Data models for vaultsync

mod notification;
mod prompt;
mod snapshot;
mod vault;

pub use notification::SyncNotification;
pub use prompt::{
    LoginInfo, NotificationKind, NotificationPayload, PasswordChange, QueuedNotification, Tab,
};
pub use snapshot::SyncSnapshot;
pub use vault::{Cipher, CipherKind, Collection, Folder, Login, Revisioned};
