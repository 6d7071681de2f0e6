pub mod common;
pub mod config;
pub mod last_sync;
pub mod replay;
