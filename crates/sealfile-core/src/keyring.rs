//! At-rest protection for private keys held in a keyring.
//!
//! A [`KeyringKey`] is either random (process-local keyrings) or derived
//! from a passphrase with Argon2id (persistent keyrings). It locks a
//! [`PrivateKey`] into an opaque base64 blob:
//!
//! ```text
//! base64( nonce (12) || ChaCha20-Poly1305(private_key (32)) + tag (16) )
//! ```
//!
//! The normalized owner email is bound as associated data, so a blob copied
//! onto another identity's row does not unlock.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::{PrivateKey, IV_LEN, KEY_LEN, TAG_LEN, X25519_LEN};
use crate::error::{CoreError, Result};
use crate::types::normalize_email;

/// Length of a passphrase salt in bytes.
pub const KEYRING_SALT_LEN: usize = 16;

/// Length of a decoded locked private key in bytes.
pub const LOCKED_KEY_LEN: usize = IV_LEN + X25519_LEN + TAG_LEN;

const KEYRING_DOMAIN: &[u8] = b"sealfile-v1 keyring\0";
const VERIFIER_PLAINTEXT: &[u8] = b"sealfile keyring verifier";

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 1,
        }
    }
}

/// Generate a random passphrase salt.
pub fn generate_salt() -> [u8; KEYRING_SALT_LEN] {
    let mut salt = [0u8; KEYRING_SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Symmetric key protecting private keys at rest.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyringKey([u8; KEY_LEN]);

impl KeyringKey {
    /// Generate a random keyring key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Derive a keyring key from a passphrase.
    pub fn derive_with(passphrase: &[u8], salt: &[u8], params: KdfParams) -> Result<Self> {
        if passphrase.is_empty() {
            return Err(CoreError::KeyDerivation("passphrase is empty".into()));
        }
        let argon_params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| CoreError::KeyDerivation(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

        let mut out = Zeroizing::new([0u8; KEY_LEN]);
        argon2
            .hash_password_into(passphrase, salt, &mut out[..])
            .map_err(|e| CoreError::KeyDerivation(e.to_string()))?;
        Ok(Self(*out))
    }

    /// Lock `private_key` for `email` into an opaque blob.
    pub fn lock_private_key(&self, private_key: &PrivateKey, email: &str) -> Result<String> {
        let secret = private_key.to_bytes();
        let aad = associated_data(email);
        let sealed = self.seal(&secret[..], &aad)?;
        Ok(STANDARD.encode(sealed))
    }

    /// Recover the private key `email` locked into `blob`.
    ///
    /// Fails with [`CoreError::Encoding`] on a malformed blob and with
    /// [`CoreError::Decryption`] on a wrong key or a blob bound to
    /// another email.
    pub fn unlock_private_key(&self, blob: &str, email: &str) -> Result<PrivateKey> {
        let bytes = STANDARD
            .decode(blob.trim())
            .map_err(|e| CoreError::Encoding(format!("locked key: {}", e)))?;
        if bytes.len() != LOCKED_KEY_LEN {
            return Err(CoreError::Encoding(format!(
                "locked key is {} bytes, expected {}",
                bytes.len(),
                LOCKED_KEY_LEN
            )));
        }

        let aad = associated_data(email);
        let secret = Zeroizing::new(self.open(&bytes, &aad)?);
        let mut raw = Zeroizing::new([0u8; X25519_LEN]);
        raw.copy_from_slice(&secret);
        Ok(PrivateKey::from_bytes(*raw))
    }

    /// A token proving knowledge of this key, stored beside a passphrase salt.
    pub fn verifier(&self) -> Result<Vec<u8>> {
        self.seal(VERIFIER_PLAINTEXT, KEYRING_DOMAIN)
    }

    /// Check a token produced by [`KeyringKey::verifier`].
    pub fn verify(&self, token: &[u8]) -> bool {
        matches!(self.open(token, KEYRING_DOMAIN), Ok(plain) if plain == VERIFIER_PLAINTEXT)
    }

    fn seal(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CoreError::Encryption(e.to_string()))?;
        let mut nonce = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
            .map_err(|_| CoreError::Encryption("keyring seal failed".into()))?;

        let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn open(&self, sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < IV_LEN + TAG_LEN {
            return Err(CoreError::Decryption("locked data truncated".into()));
        }
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CoreError::Decryption(e.to_string()))?;
        let (nonce, ciphertext) = sealed.split_at(IV_LEN);
        cipher
            .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
            .map_err(|_| CoreError::Decryption("wrong keyring key or tampered data".into()))
    }
}

impl std::fmt::Debug for KeyringKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyringKey([REDACTED])")
    }
}

fn associated_data(email: &str) -> Vec<u8> {
    let mut aad = KEYRING_DOMAIN.to_vec();
    aad.extend_from_slice(normalize_email(email).as_bytes());
    aad
}
