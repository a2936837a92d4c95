//! Error types for sealing and opening envelopes.

use sealfile_core::Timestamp;
use thiserror::Error;

/// The user-distinguishable failure kinds of the envelope protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The seal could not be built: bad input (no recipients, missing
    /// fields) or a failure of the cipher itself.
    InvalidInput,
    /// A key string is not valid encoded key material.
    KeyFormat,
    /// The envelope failed structural checks or has an unknown version.
    MalformedEnvelope,
    /// The envelope's expiry has passed.
    Expired,
    /// The caller is not among the envelope's recipients.
    Unauthorized,
    /// Key unwrap or payload decryption failed.
    Decryption,
}

/// Errors that can occur while building a sealed file.
///
/// Building is all-or-nothing: any error means no envelope was produced.
#[derive(Debug, Error)]
pub enum SealError {
    /// Caller supplied invalid or missing input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A recipient's public key could not be used.
    #[error("invalid public key for {email}: {reason}")]
    KeyFormat {
        /// The recipient whose key was rejected.
        email: String,
        /// Why the key was rejected.
        reason: String,
    },

    /// The payload or a key could not be encrypted.
    #[error("encryption failed: {0}")]
    Encryption(String),
}

impl SealError {
    /// The protocol-level kind of this error.
    ///
    /// The taxonomy has no seal-side crypto kind, so [`SealError::Encryption`]
    /// reports [`ErrorKind::InvalidInput`]; match on the variant to tell the
    /// two apart.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SealError::InvalidInput(_) | SealError::Encryption(_) => ErrorKind::InvalidInput,
            SealError::KeyFormat { .. } => ErrorKind::KeyFormat,
        }
    }
}

/// Errors that can occur while validating or opening a sealed file.
///
/// Messages for [`OpenError::Unauthorized`] and [`OpenError::Decryption`]
/// are fixed and carry no detail about recipients or failure cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenError {
    /// The envelope is structurally invalid or of an unknown version.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// The envelope expired at the given time (Unix ms).
    #[error("file expired at {expires_at} (unix ms)")]
    Expired {
        /// When the envelope expired.
        expires_at: Timestamp,
    },

    /// The caller may not open this file.
    #[error("not authorized to open this file")]
    Unauthorized,

    /// The file could not be decrypted.
    #[error("unable to decrypt file")]
    Decryption,
}

impl OpenError {
    /// The protocol-level kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OpenError::Malformed(_) => ErrorKind::MalformedEnvelope,
            OpenError::Expired { .. } => ErrorKind::Expired,
            OpenError::Unauthorized => ErrorKind::Unauthorized,
            OpenError::Decryption => ErrorKind::Decryption,
        }
    }
}
