//! SQLite implementation of the store traits.
//!
//! The persistent backend. Uses rusqlite with bundled SQLite, wrapped in
//! async via tokio::spawn_blocking.
//!
//! The keyring starts locked. [`SqliteStore::unlock_keyring`] derives the
//! keyring key from a passphrase with Argon2id; the salt, cost and a
//! verifier are kept in `keyring_meta`, so only locked blobs and never a
//! private key reach the database file.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use zeroize::Zeroizing;

use sealfile_core::{
    generate_salt, normalize_email, now_millis, FileId, KdfParams, KeyringKey, PrivateKey,
};
use sealfile_envelope::SealedFile;

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{EnvelopeStore, InsertResult, KeyDirectory, Keyring};

/// SQLite-based store implementing [`EnvelopeStore`], [`KeyDirectory`] and
/// [`Keyring`].
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    keyring_key: Option<Arc<KeyringKey>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the parent directory and the file if needed, then runs
    /// migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            keyring_key: None,
        })
    }

    /// Lock keyring entries under an explicit key instead of a passphrase.
    pub fn with_keyring_key(mut self, key: KeyringKey) -> Self {
        self.keyring_key = Some(Arc::new(key));
        self
    }

    /// Unlock the keyring with `passphrase`, using default Argon2id cost for
    /// a keyring created now.
    pub async fn unlock_keyring(self, passphrase: &str) -> Result<Self> {
        self.unlock_keyring_with(passphrase, KdfParams::default()).await
    }

    /// Unlock the keyring with `passphrase`.
    ///
    /// The first unlock of a database fixes its salt and `kdf` cost; later
    /// unlocks reuse the stored ones and fail with
    /// [`StoreError::KeyringLocked`] on a wrong passphrase.
    pub async fn unlock_keyring_with(mut self, passphrase: &str, kdf: KdfParams) -> Result<Self> {
        let passphrase = Zeroizing::new(passphrase.as_bytes().to_vec());
        let key = self
            .run(move |conn| {
                let stored = conn
                    .query_row(
                        "SELECT salt, memory_kib, iterations, parallelism, verifier
                         FROM keyring_meta WHERE id = 1",
                        [],
                        |row| {
                            Ok((
                                row.get::<_, Vec<u8>>(0)?,
                                KdfParams {
                                    memory_kib: row.get(1)?,
                                    iterations: row.get(2)?,
                                    parallelism: row.get(3)?,
                                },
                                row.get::<_, Vec<u8>>(4)?,
                            ))
                        },
                    )
                    .optional()?;

                if let Some((salt, stored_params, verifier)) = stored {
                    let key = KeyringKey::derive_with(&passphrase, &salt, stored_params)?;
                    if !key.verify(&verifier) {
                        return Err(StoreError::KeyringLocked("wrong passphrase".into()));
                    }
                    return Ok(key);
                }

                let salt = generate_salt();
                let key = KeyringKey::derive_with(&passphrase, &salt, kdf)?;
                conn.execute(
                    "INSERT INTO keyring_meta (
                        id, salt, memory_kib, iterations, parallelism, verifier, created_at
                    ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        salt.to_vec(),
                        kdf.memory_kib,
                        kdf.iterations,
                        kdf.parallelism,
                        key.verifier()?,
                        now_millis()
                    ],
                )?;
                tracing::debug!("created keyring");
                Ok(key)
            })
            .await?;

        self.keyring_key = Some(Arc::new(key));
        Ok(self)
    }

    /// True once a keyring key is available.
    pub fn is_keyring_unlocked(&self) -> bool {
        self.keyring_key.is_some()
    }

    fn keyring_key(&self) -> Result<Arc<KeyringKey>> {
        self.keyring_key
            .clone()
            .ok_or_else(|| StoreError::KeyringLocked("keyring has not been unlocked".into()))
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

fn decode_envelope(bytes: &[u8]) -> Result<SealedFile> {
    SealedFile::from_cbor(bytes).map_err(|e| StoreError::InvalidData(e.to_string()))
}

#[async_trait]
impl EnvelopeStore for SqliteStore {
    async fn insert(&self, envelope: &SealedFile) -> Result<InsertResult> {
        let encoded = envelope
            .to_cbor()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let file_id = envelope.file_id.as_str().to_string();
        let version = envelope.version;
        let created_at = envelope.metadata.created_at;
        let expires_at = envelope.metadata.expires_at;
        let recipients: Vec<String> = envelope.recipient_emails().map(normalize_email).collect();

        let result = self
            .run(move |conn| {
                let tx = conn.transaction()?;

                let existing: Option<Vec<u8>> = tx
                    .query_row(
                        "SELECT envelope FROM envelopes WHERE file_id = ?1",
                        params![file_id],
                        |row| row.get(0),
                    )
                    .optional()?;

                if let Some(existing) = existing {
                    return Ok(if existing == encoded {
                        InsertResult::AlreadyExists
                    } else {
                        InsertResult::Conflict
                    });
                }

                tx.execute(
                    "INSERT INTO envelopes (
                        file_id, version, envelope, created_at, expires_at, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![file_id, version, encoded, created_at, expires_at, now_millis()],
                )?;

                for (position, email) in recipients.iter().enumerate() {
                    tx.execute(
                        "INSERT OR IGNORE INTO envelope_recipients (file_id, email, position)
                         VALUES (?1, ?2, ?3)",
                        params![file_id, email, position as i64],
                    )?;
                }

                tx.commit()?;
                Ok(InsertResult::Inserted)
            })
            .await?;

        if result == InsertResult::Conflict {
            tracing::warn!(file_id = %envelope.file_id, "refusing to overwrite stored envelope");
        }
        Ok(result)
    }

    async fn fetch(&self, id: &FileId) -> Result<Option<SealedFile>> {
        let file_id = id.as_str().to_string();
        let bytes: Option<Vec<u8>> = self
            .run(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT envelope FROM envelopes WHERE file_id = ?1",
                        params![file_id],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;

        bytes.as_deref().map(decode_envelope).transpose()
    }

    async fn contains(&self, id: &FileId) -> Result<bool> {
        let file_id = id.as_str().to_string();
        self.run(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM envelopes WHERE file_id = ?1",
                params![file_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    async fn list_for_recipient(&self, email: &str) -> Result<Vec<FileId>> {
        let email = normalize_email(email);
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT file_id FROM envelope_recipients WHERE email = ?1 ORDER BY file_id",
            )?;
            let ids = stmt
                .query_map(params![email], |row| row.get::<_, String>(0))?
                .map(|id| id.map(FileId::new))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })
        .await
    }

    async fn delete(&self, id: &FileId) -> Result<bool> {
        let file_id = id.as_str().to_string();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM envelope_recipients WHERE file_id = ?1",
                params![file_id],
            )?;
            let removed = tx.execute("DELETE FROM envelopes WHERE file_id = ?1", params![file_id])?;
            tx.commit()?;
            Ok(removed > 0)
        })
        .await
    }
}

#[async_trait]
impl KeyDirectory for SqliteStore {
    async fn publish(&self, email: &str, public_key: &str) -> Result<()> {
        let email = normalize_email(email);
        let public_key = public_key.to_string();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO public_keys (email, public_key, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(email) DO UPDATE SET
                    public_key = excluded.public_key,
                    updated_at = excluded.updated_at",
                params![email, public_key, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn lookup(&self, email: &str) -> Result<Option<String>> {
        let email = normalize_email(email);
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT public_key FROM public_keys WHERE email = ?1",
                    params![email],
                    |row| row.get(0),
                )
                .optional()?)
        })
        .await
    }
}

#[async_trait]
impl Keyring for SqliteStore {
    async fn save_private_key(&self, email: &str, private_key: &PrivateKey) -> Result<()> {
        let locked = self.keyring_key()?.lock_private_key(private_key, email)?;
        let email = normalize_email(email);
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO private_keys (email, locked_key, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(email) DO UPDATE SET
                    locked_key = excluded.locked_key,
                    updated_at = excluded.updated_at",
                params![email, locked, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn private_key(&self, email: &str) -> Result<Option<PrivateKey>> {
        let key = self.keyring_key()?;
        let normalized = normalize_email(email);
        let locked: Option<String> = self
            .run(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT locked_key FROM private_keys WHERE email = ?1",
                        params![normalized],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;

        match locked {
            Some(blob) => Ok(Some(key.unlock_private_key(&blob, email)?)),
            None => Ok(None),
        }
    }
}
