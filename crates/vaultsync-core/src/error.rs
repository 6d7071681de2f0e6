//! Error types for vaultsync-core

use thiserror::Error;

/// Result type alias using vaultsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in vaultsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The requested record does not exist in the store or upstream
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other store or API failure; the next full sync corrects it
    #[error("Transient failure: {0}")]
    Transient(String),

    /// The account security stamp changed; every session must end
    #[error("Security stamp has changed")]
    SecurityStampChanged,

    /// The vault is locked, so decrypted views are unavailable
    #[error("Vault is locked")]
    Locked,

    /// `SQLite` error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error means the record is gone rather than unreachable.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_not_found_is_not_found() {
        assert!(Error::NotFound("cipher-1".to_string()).is_not_found());
        assert!(!Error::Transient("timeout".to_string()).is_not_found());
        assert!(!Error::Locked.is_not_found());
    }
}
