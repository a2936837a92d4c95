//! Envelope builder.
//!
//! Seals file bytes for a list of recipients:
//!
//! 1. Generate a fresh [`FileKey`] and a fresh nonce
//! 2. Encrypt the file bytes
//! 3. Wrap the file key for every recipient's public key
//! 4. Assemble the [`SealedFile`]
//!
//! All public keys are imported before any encryption happens, and a
//! failure for any one recipient fails the whole build. A sealed file is
//! never returned with an intended recipient missing.

use std::collections::{BTreeMap, HashSet};

use base64::{engine::general_purpose::STANDARD, Engine as _};

use sealfile_core::{
    import_public_key, normalize_email, now_millis, CoreError, FileId, FileIv, FileKey, PublicKey,
    Timestamp,
};

use crate::envelope::{Metadata, MetadataValue, RecipientEntry, SealedFile, SEALED_FILE_VERSION};
use crate::error::SealError;

/// Attributes of the original file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// File name shown to recipients.
    pub file_name: String,
    /// MIME type.
    pub file_type: String,
    /// Size in bytes.
    pub file_size: u64,
}

impl FileMeta {
    /// Create file attributes.
    pub fn new(file_name: impl Into<String>, file_type: impl Into<String>, file_size: u64) -> Self {
        Self {
            file_name: file_name.into(),
            file_type: file_type.into(),
            file_size,
        }
    }

    /// Attributes for `data`, taking the size from its length.
    pub fn for_bytes(
        file_name: impl Into<String>,
        file_type: impl Into<String>,
        data: &[u8],
    ) -> Self {
        Self::new(file_name, file_type, data.len() as u64)
    }
}

/// A recipient and their encoded public key, as returned by a key directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientKey {
    /// Recipient identity.
    pub email: String,
    /// Base64 SubjectPublicKeyInfo.
    pub public_key: String,
}

impl RecipientKey {
    /// Create a recipient key.
    pub fn new(email: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            public_key: public_key.into(),
        }
    }
}

/// Optional metadata supplied at seal time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SealOptions {
    /// Creation time. Defaults to the current clock.
    pub created_at: Option<Timestamp>,
    /// Expiry time. `None` means the file never expires.
    pub expires_at: Option<Timestamp>,
    /// Caller-supplied extension fields.
    pub extensions: BTreeMap<String, MetadataValue>,
}

/// Seal `file_bytes` for `recipients`.
///
/// Fails with [`SealError::InvalidInput`] on an empty recipient list, blank
/// ids or names, duplicate recipients, an expiry not after creation, or a
/// NaN or infinite float extension, and with [`SealError::KeyFormat`] if any
/// recipient key is unusable.
pub fn create_seal_file(
    file_bytes: &[u8],
    file_meta: FileMeta,
    recipients: &[RecipientKey],
    file_id: FileId,
    options: SealOptions,
) -> Result<SealedFile, SealError> {
    if recipients.is_empty() {
        return Err(SealError::InvalidInput(
            "at least one recipient is required".into(),
        ));
    }
    if file_id.is_blank() {
        return Err(SealError::InvalidInput("fileId is required".into()));
    }
    if file_meta.file_name.trim().is_empty() {
        return Err(SealError::InvalidInput("fileName is required".into()));
    }

    let created_at = options.created_at.unwrap_or_else(now_millis);
    if let Some(expires_at) = options.expires_at {
        if expires_at <= created_at {
            return Err(SealError::InvalidInput(format!(
                "expiresAt {} is not after createdAt {}",
                expires_at, created_at
            )));
        }
    }

    // NaN and infinity have no JSON form.
    for (key, value) in &options.extensions {
        if let MetadataValue::Float(f) = value {
            if !f.is_finite() {
                return Err(SealError::InvalidInput(format!(
                    "extension {} is not a finite number",
                    key
                )));
            }
        }
    }

    let keys = import_recipient_keys(recipients)?;

    let file_key = FileKey::generate();
    let iv = FileIv::generate();
    let ciphertext = file_key
        .encrypt(file_bytes, &iv)
        .map_err(|e| SealError::Encryption(e.to_string()))?;

    let context = file_id.as_str().as_bytes();
    let mut entries = Vec::with_capacity(keys.len());
    for (email, public_key) in keys {
        let wrapped = public_key
            .wrap(&file_key, context)
            .map_err(|e| match e {
                CoreError::KeyFormat(reason) => SealError::KeyFormat {
                    email: email.clone(),
                    reason,
                },
                other => SealError::Encryption(other.to_string()),
            })?;
        entries.push(RecipientEntry {
            email,
            wrapped_key: STANDARD.encode(wrapped),
        });
    }
    drop(file_key);

    Ok(SealedFile {
        version: SEALED_FILE_VERSION,
        file_id,
        file_name: file_meta.file_name,
        file_type: file_meta.file_type,
        file_size: file_meta.file_size,
        ciphertext: STANDARD.encode(ciphertext),
        iv: STANDARD.encode(iv.as_bytes()),
        recipients: entries,
        metadata: Metadata {
            created_at,
            expires_at: options.expires_at,
            extensions: options.extensions,
        },
    })
}

fn import_recipient_keys(recipients: &[RecipientKey]) -> Result<Vec<(String, PublicKey)>, SealError> {
    let mut seen = HashSet::with_capacity(recipients.len());
    let mut keys = Vec::with_capacity(recipients.len());

    for recipient in recipients {
        let email = recipient.email.trim();
        if email.is_empty() {
            return Err(SealError::InvalidInput("recipient email is required".into()));
        }
        if !seen.insert(normalize_email(email)) {
            return Err(SealError::InvalidInput(format!(
                "duplicate recipient: {}",
                email
            )));
        }

        let public_key = import_public_key(&recipient.public_key).map_err(|e| {
            SealError::KeyFormat {
                email: email.to_string(),
                reason: e.to_string(),
            }
        })?;
        keys.push((email.to_string(), public_key));
    }

    Ok(keys)
}

/// Builder for sealed files.
///
/// ```rust
/// use sealfile_core::{export_public_key, KeyPair};
/// use sealfile_envelope::SealFileBuilder;
///
/// let alice = KeyPair::generate();
/// let sealed = SealFileBuilder::new("notes.txt", "text/plain", b"hello".to_vec())
///     .recipient("alice@example.com", export_public_key(alice.public_key()))
///     .extension("project", "apollo")
///     .build()
///     .unwrap();
/// assert_eq!(sealed.recipients.len(), 1);
/// ```
pub struct SealFileBuilder {
    data: Vec<u8>,
    file_meta: FileMeta,
    file_id: Option<FileId>,
    recipients: Vec<RecipientKey>,
    options: SealOptions,
}

impl SealFileBuilder {
    /// Start sealing `data`; the size is taken from its length.
    pub fn new(
        file_name: impl Into<String>,
        file_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        let data = data.into();
        Self {
            file_meta: FileMeta::for_bytes(file_name, file_type, &data),
            data,
            file_id: None,
            recipients: Vec::new(),
            options: SealOptions::default(),
        }
    }

    /// Set the file id. A random id is used otherwise.
    pub fn file_id(mut self, file_id: impl Into<FileId>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }

    /// Add a recipient.
    pub fn recipient(mut self, email: impl Into<String>, public_key: impl Into<String>) -> Self {
        self.recipients.push(RecipientKey::new(email, public_key));
        self
    }

    /// Add several recipients.
    pub fn recipients(mut self, recipients: impl IntoIterator<Item = RecipientKey>) -> Self {
        self.recipients.extend(recipients);
        self
    }

    /// Pin the creation time.
    pub fn created_at(mut self, timestamp: Timestamp) -> Self {
        self.options.created_at = Some(timestamp);
        self
    }

    /// Set the expiry time.
    pub fn expires_at(mut self, timestamp: Timestamp) -> Self {
        self.options.expires_at = Some(timestamp);
        self
    }

    /// Add an extension metadata field.
    pub fn extension(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.options.extensions.insert(key.into(), value.into());
        self
    }

    /// Seal the file.
    pub fn build(self) -> Result<SealedFile, SealError> {
        let file_id = self.file_id.unwrap_or_else(FileId::random);
        create_seal_file(
            &self.data,
            self.file_meta,
            &self.recipients,
            file_id,
            self.options,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use sealfile_core::{export_public_key, KeyPair, IV_LEN, TAG_LEN, WRAPPED_KEY_LEN};

    fn recipient(email: &str) -> (KeyPair, RecipientKey) {
        let pair = KeyPair::generate();
        let key = RecipientKey::new(email, export_public_key(pair.public_key()));
        (pair, key)
    }

    #[test]
    fn test_seal_two_recipients() {
        let (_, a) = recipient("a@x.com");
        let (_, b) = recipient("b@x.com");

        let sealed = create_seal_file(
            b"0123456789",
            FileMeta::new("ten.bin", "application/octet-stream", 10),
            &[a, b],
            FileId::new("f1"),
            SealOptions::default(),
        )
        .unwrap();

        assert_eq!(sealed.version, SEALED_FILE_VERSION);
        assert_eq!(sealed.recipients.len(), 2);
        assert_eq!(sealed.recipients[0].email, "a@x.com");
        assert_eq!(sealed.recipients[1].email, "b@x.com");
        assert_eq!(sealed.file_size, 10);

        let ciphertext = STANDARD.decode(&sealed.ciphertext).unwrap();
        assert_eq!(ciphertext.len(), 10 + TAG_LEN);
        assert_eq!(STANDARD.decode(&sealed.iv).unwrap().len(), IV_LEN);
        for entry in &sealed.recipients {
            assert_eq!(
                STANDARD.decode(&entry.wrapped_key).unwrap().len(),
                WRAPPED_KEY_LEN
            );
        }
    }

    #[test]
    fn test_fresh_iv_per_seal() {
        let (_, a) = recipient("a@x.com");
        let seal = || {
            create_seal_file(
                b"same bytes",
                FileMeta::new("f", "text/plain", 10),
                std::slice::from_ref(&a),
                FileId::new("f1"),
                SealOptions::default(),
            )
            .unwrap()
        };

        let first = seal();
        let second = seal();
        assert_ne!(first.iv, second.iv);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn test_empty_recipients_rejected() {
        let result = create_seal_file(
            b"data",
            FileMeta::new("f", "text/plain", 4),
            &[],
            FileId::new("f1"),
            SealOptions::default(),
        );
        assert!(matches!(result, Err(SealError::InvalidInput(_))));
    }

    #[test]
    fn test_bad_key_fails_whole_build() {
        let (_, a) = recipient("a@x.com");
        let bad = RecipientKey::new("b@x.com", "definitely-not-a-key");
        let (_, c) = recipient("c@x.com");

        let err = create_seal_file(
            b"data",
            FileMeta::new("f", "text/plain", 4),
            &[a, bad, c],
            FileId::new("f1"),
            SealOptions::default(),
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::KeyFormat);
        assert!(matches!(err, SealError::KeyFormat { ref email, .. } if email == "b@x.com"));
    }

    #[test]
    fn test_duplicate_recipient_rejected() {
        let (_, a) = recipient("a@x.com");
        let (_, a_upper) = recipient("A@X.COM");

        let result = create_seal_file(
            b"data",
            FileMeta::new("f", "text/plain", 4),
            &[a, a_upper],
            FileId::new("f1"),
            SealOptions::default(),
        );
        assert!(matches!(result, Err(SealError::InvalidInput(_))));
    }

    #[test]
    fn test_expiry_must_follow_creation() {
        let (_, a) = recipient("a@x.com");
        let options = SealOptions {
            created_at: Some(1000),
            expires_at: Some(1000),
            ..SealOptions::default()
        };

        let result = create_seal_file(
            b"data",
            FileMeta::new("f", "text/plain", 4),
            &[a],
            FileId::new("f1"),
            options,
        );
        assert!(matches!(result, Err(SealError::InvalidInput(_))));
    }

    #[test]
    fn test_non_finite_float_extension_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let (_, a) = recipient("a@x.com");
            let result = SealFileBuilder::new("n.txt", "text/plain", b"hi".to_vec())
                .recipient(a.email, a.public_key)
                .extension("score", bad)
                .build();
            assert!(matches!(result, Err(SealError::InvalidInput(_))), "{} accepted", bad);
        }
    }

    #[test]
    fn test_finite_float_extension_survives_json() {
        let (_, a) = recipient("a@x.com");
        let sealed = SealFileBuilder::new("n.txt", "text/plain", b"hi".to_vec())
            .recipient(a.email, a.public_key)
            .extension("score", -2.5)
            .extension("whole", 3.0)
            .build()
            .unwrap();

        let parsed = SealedFile::from_json(&sealed.to_json().unwrap()).unwrap();
        assert_eq!(parsed, sealed);
        assert_eq!(parsed.metadata.extensions["whole"], MetadataValue::Float(3.0));
    }

    #[test]
    fn test_blank_file_id_rejected() {
        let (_, a) = recipient("a@x.com");
        let result = create_seal_file(
            b"data",
            FileMeta::new("f", "text/plain", 4),
            &[a],
            FileId::new(""),
            SealOptions::default(),
        );
        assert!(matches!(result, Err(SealError::InvalidInput(_))));
    }

    #[test]
    fn test_builder_sets_metadata() {
        let (_, a) = recipient("a@x.com");
        let sealed = SealFileBuilder::new("n.txt", "text/plain", b"hi".to_vec())
            .file_id("file-9")
            .recipient(a.email, a.public_key)
            .created_at(5_000)
            .expires_at(10_000)
            .extension("origin", "upload")
            .extension("pinned", true)
            .build()
            .unwrap();

        assert_eq!(sealed.file_id, FileId::new("file-9"));
        assert_eq!(sealed.file_size, 2);
        assert_eq!(sealed.metadata.created_at, 5_000);
        assert_eq!(sealed.metadata.expires_at, Some(10_000));
        assert_eq!(
            sealed.metadata.extensions["origin"],
            MetadataValue::Text("upload".into())
        );
        assert_eq!(sealed.metadata.extensions["pinned"], MetadataValue::Bool(true));
    }

    #[test]
    fn test_builder_assigns_random_file_id() {
        let (_, a) = recipient("a@x.com");
        let sealed = SealFileBuilder::new("n.txt", "text/plain", b"hi".to_vec())
            .recipient(a.email, a.public_key)
            .build()
            .unwrap();
        assert!(!sealed.file_id.is_blank());
    }
}
