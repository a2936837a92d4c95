//! Error types for the store module.

use sealfile_core::CoreError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Envelope serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A different envelope is already stored under this id.
    #[error("conflict: a different envelope is stored as {0}")]
    Conflict(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// The keyring has no unlock key, or the passphrase was wrong.
    #[error("keyring locked: {0}")]
    KeyringLocked(String),

    /// A locked private key could not be sealed or opened.
    #[error("keyring error: {0}")]
    Keyring(#[from] CoreError),

    /// A lock guarding store state was poisoned.
    #[error("store lock poisoned: {0}")]
    LockPoisoned(String),

    /// A blocking task failed to complete.
    #[error("background task failed: {0}")]
    Join(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
