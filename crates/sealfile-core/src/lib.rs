//! # Sealfile Core
//!
//! Pure primitives for sealed files: the key codec, the single-use file key,
//! and per-recipient key wrapping.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`PublicKey`] - X25519 recipient key, usable only to wrap
//! - [`PrivateKey`] - X25519 identity key, usable only to unwrap
//! - [`FileKey`] - 256-bit ChaCha20-Poly1305 key, fresh per sealed file
//! - [`FileId`] - Opaque identifier of a sealed file
//! - [`KeyringKey`] - Locks private keys at rest, random or passphrase-derived
//!
//! ## Key Codec
//!
//! Keys are exchanged as base64 DER (SPKI for public, PKCS#8 for private).
//! See the [`codec`] module.

pub mod codec;
pub mod crypto;
pub mod error;
pub mod keyring;
pub mod types;

pub use codec::{
    export_key, export_private_key, export_public_key, generate_key_pair, import_private_key,
    import_public_key, AnyKey, KeyKind,
};
pub use crypto::{
    FileIv, FileKey, KeyPair, PrivateKey, PublicKey, IV_LEN, KEY_LEN, TAG_LEN, WRAPPED_KEY_LEN,
};
pub use error::{CoreError, Result};
pub use keyring::{generate_salt, KdfParams, KeyringKey, KEYRING_SALT_LEN};
pub use types::{emails_match, normalize_email, now_millis, FileId, Timestamp};
