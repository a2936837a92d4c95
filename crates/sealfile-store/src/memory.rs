//! In-memory implementation of the store traits.
//!
//! Primarily for testing. Same semantics as SQLite but nothing is
//! persisted. Private keys are still held locked, under a random
//! keyring key that lives as long as the store.

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use sealfile_core::{normalize_email, FileId, KeyringKey, PrivateKey};
use sealfile_envelope::SealedFile;

use crate::error::{Result, StoreError};
use crate::traits::{EnvelopeStore, InsertResult, KeyDirectory, Keyring};

/// In-memory store implementing [`EnvelopeStore`], [`KeyDirectory`] and
/// [`Keyring`].
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
    keyring_key: KeyringKey,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Envelopes indexed by file id.
    envelopes: HashMap<FileId, SealedFile>,

    /// Index: normalized recipient email -> file ids.
    by_recipient: HashMap<String, BTreeSet<FileId>>,

    /// Directory: normalized email -> encoded public key.
    public_keys: HashMap<String, String>,

    /// Keyring: normalized email -> locked private key.
    private_keys: HashMap<String, String>,
}

impl MemoryStore {
    /// Create a new empty in-memory store with a random keyring key.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
            keyring_key: KeyringKey::generate(),
        }
    }

    /// Number of stored envelopes.
    pub fn len(&self) -> usize {
        self.read().map(|inner| inner.envelopes.len()).unwrap_or(0)
    }

    /// True if no envelopes are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EnvelopeStore for MemoryStore {
    async fn insert(&self, envelope: &SealedFile) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if let Some(existing) = inner.envelopes.get(&envelope.file_id) {
            return Ok(if existing == envelope {
                InsertResult::AlreadyExists
            } else {
                InsertResult::Conflict
            });
        }

        for email in envelope.recipient_emails() {
            inner
                .by_recipient
                .entry(normalize_email(email))
                .or_default()
                .insert(envelope.file_id.clone());
        }
        inner
            .envelopes
            .insert(envelope.file_id.clone(), envelope.clone());

        Ok(InsertResult::Inserted)
    }

    async fn fetch(&self, id: &FileId) -> Result<Option<SealedFile>> {
        Ok(self.read()?.envelopes.get(id).cloned())
    }

    async fn contains(&self, id: &FileId) -> Result<bool> {
        Ok(self.read()?.envelopes.contains_key(id))
    }

    async fn list_for_recipient(&self, email: &str) -> Result<Vec<FileId>> {
        let inner = self.read()?;
        Ok(inner
            .by_recipient
            .get(&normalize_email(email))
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, id: &FileId) -> Result<bool> {
        let mut inner = self.write()?;

        let Some(envelope) = inner.envelopes.remove(id) else {
            return Ok(false);
        };
        for email in envelope.recipient_emails() {
            let key = normalize_email(email);
            if let Some(ids) = inner.by_recipient.get_mut(&key) {
                ids.remove(id);
                if ids.is_empty() {
                    inner.by_recipient.remove(&key);
                }
            }
        }

        Ok(true)
    }
}

#[async_trait]
impl KeyDirectory for MemoryStore {
    async fn publish(&self, email: &str, public_key: &str) -> Result<()> {
        self.write()?
            .public_keys
            .insert(normalize_email(email), public_key.to_string());
        Ok(())
    }

    async fn lookup(&self, email: &str) -> Result<Option<String>> {
        Ok(self.read()?.public_keys.get(&normalize_email(email)).cloned())
    }
}

#[async_trait]
impl Keyring for MemoryStore {
    async fn save_private_key(&self, email: &str, private_key: &PrivateKey) -> Result<()> {
        let locked = self.keyring_key.lock_private_key(private_key, email)?;
        self.write()?
            .private_keys
            .insert(normalize_email(email), locked);
        Ok(())
    }

    async fn private_key(&self, email: &str) -> Result<Option<PrivateKey>> {
        let locked = self.read()?.private_keys.get(&normalize_email(email)).cloned();
        match locked {
            Some(blob) => Ok(Some(self.keyring_key.unlock_private_key(&blob, email)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::EnvelopeStoreExt;
    use sealfile_core::{export_private_key, export_public_key, KeyPair};
    use sealfile_envelope::SealFileBuilder;

    fn sealed(id: &str, emails: &[&str]) -> SealedFile {
        let mut builder = SealFileBuilder::new("f.txt", "text/plain", b"data".to_vec()).file_id(id);
        for email in emails {
            let pair = KeyPair::generate();
            builder = builder.recipient(*email, export_public_key(pair.public_key()));
        }
        builder.build().unwrap()
    }

    #[tokio::test]
    async fn test_insert_fetch() {
        let store = MemoryStore::new();
        let envelope = sealed("f1", &["a@x.com"]);

        assert_eq!(store.insert(&envelope).await.unwrap(), InsertResult::Inserted);
        assert_eq!(store.fetch(&envelope.file_id).await.unwrap(), Some(envelope));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_idempotent() {
        let store = MemoryStore::new();
        let envelope = sealed("f1", &["a@x.com"]);

        store.insert(&envelope).await.unwrap();
        assert_eq!(
            store.insert(&envelope).await.unwrap(),
            InsertResult::AlreadyExists
        );
    }

    #[tokio::test]
    async fn test_insert_conflict() {
        let store = MemoryStore::new();
        store.insert(&sealed("f1", &["a@x.com"])).await.unwrap();

        let other = sealed("f1", &["b@x.com"]);
        assert_eq!(store.insert(&other).await.unwrap(), InsertResult::Conflict);
        assert!(matches!(
            store.store(&other).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_list_for_recipient_case_insensitive() {
        let store = MemoryStore::new();
        store.insert(&sealed("f1", &["a@x.com", "b@x.com"])).await.unwrap();
        store.insert(&sealed("f2", &["A@X.com"])).await.unwrap();

        let ids = store.list_for_recipient("A@x.COM").await.unwrap();
        assert_eq!(ids, vec![FileId::new("f1"), FileId::new("f2")]);

        let ids = store.list_for_recipient("b@x.com").await.unwrap();
        assert_eq!(ids, vec![FileId::new("f1")]);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        let envelope = sealed("f1", &["a@x.com"]);
        store.insert(&envelope).await.unwrap();

        assert!(store.delete(&envelope.file_id).await.unwrap());
        assert!(!store.delete(&envelope.file_id).await.unwrap());
        assert!(!store.contains(&envelope.file_id).await.unwrap());
        assert!(store.list_for_recipient("a@x.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_directory_and_keyring() {
        let store = MemoryStore::new();
        let pair = KeyPair::generate();
        store.publish("A@x.com", "pub").await.unwrap();
        store.save_private_key("a@X.com", pair.private_key()).await.unwrap();

        assert_eq!(store.lookup("a@x.com").await.unwrap(), Some("pub".into()));
        let unlocked = store.private_key("A@X.COM").await.unwrap().unwrap();
        assert_eq!(unlocked.public_key(), *pair.public_key());
        assert_eq!(store.lookup("b@x.com").await.unwrap(), None);
        assert!(store.private_key("b@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keyring_holds_only_locked_keys() {
        let store = MemoryStore::new();
        let pair = KeyPair::generate();
        store.save_private_key("a@x.com", pair.private_key()).await.unwrap();

        let encoded = export_private_key(pair.private_key());
        let inner = store.read().unwrap();
        let locked = &inner.private_keys["a@x.com"];
        assert_ne!(locked, &encoded);
        assert!(!locked.starts_with("MC4CAQAwBQYDK2VuBCIEI"));
    }

    #[tokio::test]
    async fn test_float_extension_insert_is_idempotent() {
        let store = MemoryStore::new();
        let pair = KeyPair::generate();
        let envelope = SealFileBuilder::new("f.txt", "text/plain", b"data".to_vec())
            .file_id("f1")
            .recipient("a@x.com", export_public_key(pair.public_key()))
            .extension("ratio", 0.25)
            .build()
            .unwrap();

        assert_eq!(store.insert(&envelope).await.unwrap(), InsertResult::Inserted);
        assert_eq!(
            store.insert(&envelope).await.unwrap(),
            InsertResult::AlreadyExists
        );
    }
}
