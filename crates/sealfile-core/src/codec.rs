//! Key codec: portable text encoding of recipient keys.
//!
//! Keys travel as standard base64 of their DER encoding:
//!
//! - public keys as X25519 `SubjectPublicKeyInfo` (RFC 8410)
//! - private keys as X25519 PKCS#8 v1 `PrivateKeyInfo` (RFC 8410)
//!
//! Both encodings are a fixed prefix followed by the 32 raw key bytes, so
//! decoding is an exact prefix and length check. Anything else is rejected.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::crypto::{KeyPair, PrivateKey, PublicKey, X25519_LEN};
use crate::error::{CoreError, Result};

const SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x6e, 0x03, 0x21, 0x00,
];

const PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x6e, 0x04, 0x22, 0x04,
    0x20,
];

/// Which half of a key pair an encoding holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// SubjectPublicKeyInfo DER.
    Public,
    /// PKCS#8 PrivateKeyInfo DER.
    Private,
}

impl KeyKind {
    fn der_prefix(self) -> &'static [u8] {
        match self {
            KeyKind::Public => &SPKI_PREFIX,
            KeyKind::Private => &PKCS8_PREFIX,
        }
    }
}

/// A borrowed key of either kind, for [`export_key`].
#[derive(Debug, Clone, Copy)]
pub enum AnyKey<'a> {
    /// A public key.
    Public(&'a PublicKey),
    /// A private key.
    Private(&'a PrivateKey),
}

impl AnyKey<'_> {
    /// The kind of key held.
    pub fn kind(&self) -> KeyKind {
        match self {
            AnyKey::Public(_) => KeyKind::Public,
            AnyKey::Private(_) => KeyKind::Private,
        }
    }
}

/// Decode a base64 SubjectPublicKeyInfo into a wrap-only public key.
pub fn import_public_key(encoded: &str) -> Result<PublicKey> {
    let raw = decode_der(encoded, KeyKind::Public)?;
    if raw.iter().all(|b| *b == 0) {
        return Err(CoreError::KeyFormat("public key is all zeros".into()));
    }
    Ok(PublicKey::from_bytes(raw))
}

/// Decode a base64 PKCS#8 document into an unwrap-only private key.
pub fn import_private_key(encoded: &str) -> Result<PrivateKey> {
    let mut raw = decode_der(encoded, KeyKind::Private)?;
    let key = PrivateKey::from_bytes(raw);
    zeroize::Zeroize::zeroize(&mut raw);
    Ok(key)
}

/// Encode a public key as base64 SubjectPublicKeyInfo.
pub fn export_public_key(key: &PublicKey) -> String {
    encode_der(KeyKind::Public, key.as_bytes())
}

/// Encode a private key as base64 PKCS#8.
pub fn export_private_key(key: &PrivateKey) -> String {
    encode_der(KeyKind::Private, &key.to_bytes())
}

/// Encode `key` as `kind`. Fails if the key is not of the requested kind.
pub fn export_key(key: AnyKey<'_>, kind: KeyKind) -> Result<String> {
    match (key, kind) {
        (AnyKey::Public(pk), KeyKind::Public) => Ok(export_public_key(pk)),
        (AnyKey::Private(sk), KeyKind::Private) => Ok(export_private_key(sk)),
        (key, kind) => Err(CoreError::KeyFormat(format!(
            "cannot export {:?} key as {:?}",
            key.kind(),
            kind
        ))),
    }
}

/// Generate a new key pair for a user identity.
pub fn generate_key_pair() -> KeyPair {
    KeyPair::generate()
}

fn encode_der(kind: KeyKind, raw: &[u8; X25519_LEN]) -> String {
    let prefix = kind.der_prefix();
    let mut der = zeroize::Zeroizing::new(Vec::with_capacity(prefix.len() + X25519_LEN));
    der.extend_from_slice(prefix);
    der.extend_from_slice(raw);
    STANDARD.encode(der.as_slice())
}

fn decode_der(encoded: &str, kind: KeyKind) -> Result<[u8; X25519_LEN]> {
    let der = zeroize::Zeroizing::new(
        STANDARD
            .decode(encoded.trim())
            .map_err(|e| CoreError::KeyFormat(format!("invalid base64: {}", e)))?,
    );

    let prefix = kind.der_prefix();
    if der.len() != prefix.len() + X25519_LEN {
        return Err(CoreError::KeyFormat(format!(
            "expected {} bytes of {:?} key DER, got {}",
            prefix.len() + X25519_LEN,
            kind,
            der.len()
        )));
    }
    if !der.starts_with(prefix) {
        return Err(CoreError::KeyFormat(format!(
            "not an X25519 {:?} key encoding",
            kind
        )));
    }

    let mut raw = [0u8; X25519_LEN];
    raw.copy_from_slice(&der[prefix.len()..]);
    Ok(raw)
}
