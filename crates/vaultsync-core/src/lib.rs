//! vaultsync-core - Core library for vaultsync
//!
//! This crate contains the reconciliation logic that applies remote vault
//! change notifications to the local cache, the per-tab credential prompt
//! queue, and the store abstractions both of them are written against.

pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod memory;
pub mod models;
pub mod notifications;
pub mod runtime;
pub mod services;
pub mod state;
pub mod sync;

pub use error::{Error, Result};
pub use models::{Cipher, Folder, SyncNotification};
pub use notifications::NotificationQueue;
pub use runtime::{Runtime, RuntimeMessage};
pub use services::{Signal, SignalBus};
pub use sync::SyncCoordinator;
