//! The client: seal files for recipients by email, open them by id.
//!
//! Wires the key directory into the envelope builder on the sending side
//! and the envelope store into the open pipeline on the receiving side.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use sealfile_core::{export_public_key, generate_key_pair, now_millis, FileId, Timestamp};
use sealfile_envelope::{
    create_seal_file, DecryptedFile, FileMeta, MetadataValue, OpenError, OpenState, RecipientKey,
    SealOptions, SealedFile,
};
use sealfile_store::{EnvelopeStore, EnvelopeStoreExt, KeyDirectory, Keyring};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// A request to seal a file for a set of recipient emails.
#[derive(Debug, Clone)]
pub struct SealRequest {
    file_name: String,
    file_type: String,
    data: Vec<u8>,
    recipients: Vec<String>,
    file_id: Option<FileId>,
    expires_at: Option<Timestamp>,
    extensions: BTreeMap<String, MetadataValue>,
}

impl SealRequest {
    /// Seal `data`, named `file_name` with MIME type `file_type`.
    pub fn new(
        file_name: impl Into<String>,
        file_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            file_type: file_type.into(),
            data: data.into(),
            recipients: Vec::new(),
            file_id: None,
            expires_at: None,
            extensions: BTreeMap::new(),
        }
    }

    /// Add a recipient by email.
    pub fn recipient(mut self, email: impl Into<String>) -> Self {
        self.recipients.push(email.into());
        self
    }

    /// Add several recipients.
    pub fn recipients<I, E>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<String>,
    {
        self.recipients.extend(emails.into_iter().map(Into::into));
        self
    }

    /// Use a caller-chosen file id.
    pub fn file_id(mut self, file_id: impl Into<FileId>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }

    /// Expire at `timestamp` (Unix ms). Overrides the configured TTL.
    pub fn expires_at(mut self, timestamp: Timestamp) -> Self {
        self.expires_at = Some(timestamp);
        self
    }

    /// Attach an extension metadata field.
    pub fn extension(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }
}

/// The Sealfile client.
///
/// Generic over the envelope store and key directory so the same code runs
/// against SQLite in production and in-memory maps in tests.
pub struct SealClient<S: EnvelopeStore, D: KeyDirectory> {
    store: Arc<S>,
    directory: Arc<D>,
    config: ClientConfig,
}

impl<S: EnvelopeStore, D: KeyDirectory> SealClient<S, D> {
    /// Create a client over `store` and `directory`.
    pub fn new(store: Arc<S>, directory: Arc<D>, config: ClientConfig) -> Self {
        Self {
            store,
            directory,
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the directory reference.
    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Identity
    // ─────────────────────────────────────────────────────────────────────────

    /// Generate a key pair for `email`, publish the public half to the
    /// directory and lock the private half into `keyring`.
    ///
    /// Returns the encoded public key.
    pub async fn provision_identity<K: Keyring + ?Sized>(
        &self,
        email: &str,
        keyring: &K,
    ) -> Result<String> {
        let pair = generate_key_pair();
        let public_key = export_public_key(pair.public_key());

        keyring.save_private_key(email, pair.private_key()).await?;
        self.directory.publish(email, &public_key).await?;

        debug!(email, "provisioned identity");
        Ok(public_key)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sealing
    // ─────────────────────────────────────────────────────────────────────────

    /// Seal a file at the current time.
    pub async fn seal(&self, request: SealRequest) -> Result<SealedFile> {
        self.seal_at(request, now_millis()).await
    }

    /// Seal a file as if the clock read `now` (Unix ms).
    ///
    /// Every recipient's public key is looked up first; if any is missing
    /// nothing is sealed or stored.
    pub async fn seal_at(&self, request: SealRequest, now: Timestamp) -> Result<SealedFile> {
        if let Some(max) = self.config.max_file_size {
            if request.data.len() as u64 > max {
                return Err(ClientError::InvalidInput(format!(
                    "file is {} bytes, limit is {}",
                    request.data.len(),
                    max
                )));
            }
        }

        let mut keys = Vec::with_capacity(request.recipients.len());
        for email in &request.recipients {
            match self.directory.lookup(email).await? {
                Some(public_key) => keys.push(RecipientKey::new(email.clone(), public_key)),
                None => {
                    warn!(email = %email, "no public key in directory");
                    return Err(ClientError::RecipientKeyNotFound(email.clone()));
                }
            }
        }

        let expires_at = request
            .expires_at
            .or_else(|| self.config.default_ttl_ms.map(|ttl| now.saturating_add(ttl)));
        let options = SealOptions {
            created_at: Some(now),
            expires_at,
            extensions: request.extensions,
        };
        let file_id = request.file_id.unwrap_or_else(FileId::random);
        let file_meta = FileMeta::for_bytes(request.file_name, request.file_type, &request.data);

        let sealed = create_seal_file(&request.data, file_meta, &keys, file_id, options)?;

        if self.config.store_on_seal {
            self.store.store(&sealed).await?;
        }

        debug!(
            file_id = %sealed.file_id,
            recipients = sealed.recipients.len(),
            stored = self.config.store_on_seal,
            "sealed file"
        );
        Ok(sealed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Opening
    // ─────────────────────────────────────────────────────────────────────────

    /// Ids of stored files addressed to `email`.
    pub async fn list_files(&self, email: &str) -> Result<Vec<FileId>> {
        Ok(self.store.list_for_recipient(email).await?)
    }

    /// Open a stored file at the current time.
    pub async fn open<K: Keyring + ?Sized>(
        &self,
        file_id: &FileId,
        caller_email: &str,
        keyring: &K,
    ) -> Result<DecryptedFile> {
        self.open_at(file_id, caller_email, keyring, now_millis()).await
    }

    /// Open a stored file as if the clock read `now` (Unix ms).
    ///
    /// An id with no stored envelope fails with [`OpenError::Unauthorized`],
    /// the same as a file the caller is not a recipient of.
    pub async fn open_at<K: Keyring + ?Sized>(
        &self,
        file_id: &FileId,
        caller_email: &str,
        keyring: &K,
        now: Timestamp,
    ) -> Result<DecryptedFile> {
        let Some(envelope) = self.store.fetch(file_id).await? else {
            debug!(file_id = %file_id, "no stored envelope");
            return Err(OpenError::Unauthorized.into());
        };
        open_envelope(&envelope, caller_email, keyring, now).await
    }
}

/// Open an envelope received out of band.
///
/// Runs validation first; the caller's private key is read from `keyring`
/// only once the caller is known to be a recipient. A keyring with no key
/// for the caller ends in [`OpenError::Decryption`]; a keyring that cannot
/// unlock its stored key fails with [`ClientError::Store`].
pub async fn open_envelope<K: Keyring + ?Sized>(
    envelope: &SealedFile,
    caller_email: &str,
    keyring: &K,
    now: Timestamp,
) -> Result<DecryptedFile> {
    let state = match OpenState::start(envelope, caller_email, now) {
        OpenState::Validating(validating) => validating.validate(),
        other => other,
    };
    let decrypting = match state {
        OpenState::Decrypting(decrypting) => decrypting,
        other => return finish(other),
    };

    let state = match keyring.private_key(caller_email).await? {
        Some(private_key) => decrypting.decrypt(&private_key),
        None => decrypting.missing_key(),
    };
    finish(state)
}

fn finish(state: OpenState<'_>) -> Result<DecryptedFile> {
    match state.into_outcome() {
        Some(outcome) => Ok(outcome?),
        None => Err(OpenError::Decryption.into()),
    }
}
