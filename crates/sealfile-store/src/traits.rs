//! Store traits: the narrow interfaces to external collaborators.
//!
//! - [`EnvelopeStore`] persists sealed files and returns them for opening
//! - [`KeyDirectory`] maps emails to published public keys
//! - [`Keyring`] holds the signed-in identity's private keys, locked at rest
//!
//! The protocol core never calls these itself; the client facade does.

use async_trait::async_trait;

use sealfile_core::{FileId, PrivateKey};
use sealfile_envelope::SealedFile;

use crate::error::{Result, StoreError};

/// Result of inserting an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// Envelope was inserted.
    Inserted,
    /// The identical envelope is already stored (idempotent - not an error).
    AlreadyExists,
    /// A different envelope is already stored under the same id.
    Conflict,
}

/// Persistence for sealed files.
///
/// Envelopes are immutable: an id, once stored, always returns the same
/// envelope until it is deleted.
#[async_trait]
pub trait EnvelopeStore: Send + Sync {
    /// Insert an envelope under its `file_id`.
    async fn insert(&self, envelope: &SealedFile) -> Result<InsertResult>;

    /// Get an envelope by id.
    async fn fetch(&self, id: &FileId) -> Result<Option<SealedFile>>;

    /// Check if an envelope exists.
    async fn contains(&self, id: &FileId) -> Result<bool>;

    /// Ids of envelopes addressed to `email` (case-insensitive), sorted.
    async fn list_for_recipient(&self, email: &str) -> Result<Vec<FileId>>;

    /// Remove an envelope. Returns whether it existed.
    async fn delete(&self, id: &FileId) -> Result<bool>;
}

/// Public-key directory.
#[async_trait]
pub trait KeyDirectory: Send + Sync {
    /// Publish (or replace) the encoded public key for `email`.
    async fn publish(&self, email: &str, public_key: &str) -> Result<()>;

    /// Look up the encoded public key for `email` (case-insensitive).
    async fn lookup(&self, email: &str) -> Result<Option<String>>;
}

/// Local store of private keys, keyed by identity.
///
/// Implementations persist only the blob produced by
/// [`sealfile_core::KeyringKey::lock_private_key`], never the key itself.
#[async_trait]
pub trait Keyring: Send + Sync {
    /// Lock and save (or replace) the private key for `email`.
    async fn save_private_key(&self, email: &str, private_key: &PrivateKey) -> Result<()>;

    /// Unlock the private key for `email` (case-insensitive).
    async fn private_key(&self, email: &str) -> Result<Option<PrivateKey>>;
}

/// Extension trait for common store patterns.
pub trait EnvelopeStoreExt: EnvelopeStore {
    /// Store an envelope and return its id.
    ///
    /// Storing the identical envelope twice succeeds; a different envelope
    /// under an existing id fails with [`StoreError::Conflict`].
    fn store(
        &self,
        envelope: &SealedFile,
    ) -> impl std::future::Future<Output = Result<FileId>> + Send;
}

impl<S: EnvelopeStore + ?Sized> EnvelopeStoreExt for S {
    async fn store(&self, envelope: &SealedFile) -> Result<FileId> {
        match self.insert(envelope).await? {
            InsertResult::Inserted | InsertResult::AlreadyExists => Ok(envelope.file_id.clone()),
            InsertResult::Conflict => Err(StoreError::Conflict(envelope.file_id.to_string())),
        }
    }
}
