//! The sealed-file envelope.
//!
//! A [`SealedFile`] is the unit of exchange: one ciphertext blob plus one
//! wrapped copy of the file key per recipient. It is a plain immutable value;
//! opening never mutates it.
//!
//! The portable encoding is JSON with camelCase keys. A CBOR encoding of the
//! same schema is available for compact storage. Both decoders check the
//! version before interpreting the rest of the document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sealfile_core::{emails_match, FileId, Timestamp};

use crate::error::OpenError;

/// The only envelope version this crate understands.
pub const SEALED_FILE_VERSION: u32 = 1;

/// A primitive value in the caller-supplied metadata extensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Text(String),
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Integer(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::Text(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::Text(v.to_string())
    }
}

/// Envelope metadata: a fixed set of optional fields plus extensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// When the envelope was built (Unix ms).
    pub created_at: Timestamp,

    /// When the envelope stops opening (Unix ms). `None` means never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,

    /// Caller-supplied fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, MetadataValue>,
}

impl Metadata {
    /// Metadata with only a creation time.
    pub fn new(created_at: Timestamp) -> Self {
        Self {
            created_at,
            expires_at: None,
            extensions: BTreeMap::new(),
        }
    }

    /// True if `now` is past the expiry. The expiry instant itself is
    /// still valid.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        matches!(self.expires_at, Some(expires) if now > expires)
    }
}

/// One recipient's wrapped copy of the file key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientEntry {
    /// Recipient identity. Compared case-insensitively.
    pub email: String,

    /// Base64 of the wrapped file key.
    pub wrapped_key: String,
}

/// A sealed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedFile {
    /// Format version.
    pub version: u32,

    /// Identifier assigned by the sender-side caller.
    pub file_id: FileId,

    /// Original file name.
    pub file_name: String,

    /// Original MIME type.
    pub file_type: String,

    /// Original size in bytes. Informational only.
    pub file_size: u64,

    /// Base64 of the ChaCha20-Poly1305 output (includes the tag).
    pub ciphertext: String,

    /// Base64 of the 12-byte nonce.
    pub iv: String,

    /// Recipients in insertion order.
    pub recipients: Vec<RecipientEntry>,

    /// Creation time, expiry, and extensions.
    pub metadata: Metadata,
}

/// Just enough of an envelope to read its version.
#[derive(Deserialize)]
struct VersionProbe {
    #[serde(default)]
    version: Option<u64>,
}

fn check_probe(probe: VersionProbe) -> Result<(), OpenError> {
    match probe.version {
        Some(v) if v == u64::from(SEALED_FILE_VERSION) => Ok(()),
        Some(v) => Err(OpenError::Malformed(format!(
            "unsupported envelope version: {}",
            v
        ))),
        None => Err(OpenError::Malformed("missing envelope version".into())),
    }
}

impl SealedFile {
    /// Find the entry for `email`, ignoring case. The first match wins.
    pub fn find_recipient(&self, email: &str) -> Option<&RecipientEntry> {
        self.recipients.iter().find(|r| emails_match(&r.email, email))
    }

    /// True if `email` is one of the recipients.
    pub fn has_recipient(&self, email: &str) -> bool {
        self.find_recipient(email).is_some()
    }

    /// Recipient emails in insertion order.
    pub fn recipient_emails(&self) -> impl Iterator<Item = &str> {
        self.recipients.iter().map(|r| r.email.as_str())
    }

    /// Expiry time, if any.
    pub fn expires_at(&self) -> Option<Timestamp> {
        self.metadata.expires_at
    }

    /// Serialize to the portable JSON form.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse untrusted JSON.
    ///
    /// Unknown versions are rejected before the body is interpreted.
    pub fn from_json(json: &str) -> Result<Self, OpenError> {
        let probe: VersionProbe = serde_json::from_str(json)
            .map_err(|e| OpenError::Malformed(format!("invalid JSON: {}", e)))?;
        check_probe(probe)?;

        serde_json::from_str(json).map_err(|e| OpenError::Malformed(e.to_string()))
    }

    /// Serialize to CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>, ciborium::ser::Error<std::io::Error>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)?;
        Ok(buf)
    }

    /// Parse untrusted CBOR bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, OpenError> {
        let probe: VersionProbe = ciborium::from_reader(bytes)
            .map_err(|e| OpenError::Malformed(format!("invalid CBOR: {}", e)))?;
        check_probe(probe)?;

        ciborium::from_reader(bytes).map_err(|e| OpenError::Malformed(e.to_string()))
    }
}
