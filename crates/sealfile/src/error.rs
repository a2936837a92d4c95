//! Error types for the client.

use sealfile_core::CoreError;
use sealfile_envelope::{ErrorKind, OpenError, SealError};
use sealfile_store::StoreError;
use thiserror::Error;

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Sealing failed.
    #[error(transparent)]
    Seal(#[from] SealError),

    /// Opening failed.
    #[error(transparent)]
    Open(#[from] OpenError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Key material error.
    #[error("key error: {0}")]
    Core(#[from] CoreError),

    /// The directory has no public key for a recipient.
    #[error("no public key published for {0}")]
    RecipientKeyNotFound(String),

    /// The request was rejected before sealing.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ClientError {
    /// The protocol-level kind of this error.
    ///
    /// `None` for storage failures, which are not part of the protocol.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ClientError::Seal(err) => Some(err.kind()),
            ClientError::Open(err) => Some(err.kind()),
            ClientError::Store(_) => None,
            ClientError::Core(CoreError::KeyFormat(_)) => Some(ErrorKind::KeyFormat),
            ClientError::Core(CoreError::Decryption(_)) => Some(ErrorKind::Decryption),
            ClientError::Core(_) => Some(ErrorKind::InvalidInput),
            ClientError::RecipientKeyNotFound(_) | ClientError::InvalidInput(_) => {
                Some(ErrorKind::InvalidInput)
            }
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
