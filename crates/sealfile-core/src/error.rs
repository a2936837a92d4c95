//! Error types for Sealfile Core.

use thiserror::Error;

/// Errors raised by the key codec and the cryptographic wrappers.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The encoded key is not valid key material.
    #[error("invalid key format: {0}")]
    KeyFormat(String),

    /// Symmetric encryption or key wrapping failed.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Symmetric decryption or key unwrapping failed.
    #[error("decryption error: {0}")]
    Decryption(String),

    /// A stored blob could not be decoded.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A passphrase could not be stretched into a key.
    #[error("key derivation error: {0}")]
    KeyDerivation(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
