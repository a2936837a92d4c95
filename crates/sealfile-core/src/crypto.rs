//! Cryptographic building blocks for sealed files.
//!
//! Provides the single-use file key (ChaCha20-Poly1305), X25519 recipient
//! keys, and the per-recipient key wrapping built from them.
//!
//! ## Wrapped key layout
//!
//! ```text
//! ephemeral_public (32) || nonce (12) || sealed_file_key (32 + 16 tag)
//! ```
//!
//! The wrapping key is derived with BLAKE3 from the X25519 shared secret,
//! both public keys, and a caller-supplied context (the file id), so a
//! wrapped key cannot be replayed onto another file or another recipient.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use x25519_dalek::{EphemeralSecret, PublicKey as DalekPublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CoreError, Result};

/// Length of a symmetric file key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of a ChaCha20-Poly1305 nonce in bytes.
pub const IV_LEN: usize = 12;

/// Length of a Poly1305 authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Length of an X25519 key in bytes.
pub const X25519_LEN: usize = 32;

/// Length of a wrapped file key in bytes.
pub const WRAPPED_KEY_LEN: usize = X25519_LEN + IV_LEN + KEY_LEN + TAG_LEN;

const WRAP_DOMAIN: &str = "sealfile-v1 recipient key wrap";

/// A single-use 256-bit symmetric key for one sealed file.
///
/// Not `Clone`: the key lives for exactly one seal or open and is zeroized
/// when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct FileKey([u8; KEY_LEN]);

impl FileKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Encrypt data with this key. The output carries the 16-byte tag.
    pub fn encrypt(&self, plaintext: &[u8], iv: &FileIv) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CoreError::Encryption(e.to_string()))?;

        cipher
            .encrypt(Nonce::from_slice(&iv.0), plaintext)
            .map_err(|e| CoreError::Encryption(e.to_string()))
    }

    /// Decrypt data with this key, verifying the tag.
    pub fn decrypt(&self, ciphertext: &[u8], iv: &FileIv) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CoreError::Decryption(e.to_string()))?;

        cipher
            .decrypt(Nonce::from_slice(&iv.0), ciphertext)
            .map_err(|e| CoreError::Decryption(e.to_string()))
    }
}

impl std::fmt::Debug for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FileKey(..)")
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305, fresh per encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIv(pub [u8; IV_LEN]);

impl FileIv {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; IV_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, failing if the length is not [`IV_LEN`].
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; IV_LEN] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; IV_LEN] {
        &self.0
    }
}

/// An X25519 public key. Only usable to wrap file keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; X25519_LEN]);

impl PublicKey {
    pub(crate) const fn from_bytes(bytes: [u8; X25519_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; X25519_LEN] {
        &self.0
    }

    fn to_dalek(self) -> DalekPublicKey {
        DalekPublicKey::from(self.0)
    }

    /// Wrap a file key for the holder of the matching private key.
    ///
    /// `context` binds the wrapped key to the file it belongs to; the same
    /// bytes must be supplied to [`PrivateKey::unwrap`].
    pub fn wrap(&self, file_key: &FileKey, context: &[u8]) -> Result<Vec<u8>> {
        let ephemeral = EphemeralSecret::random_from_rng(rand::thread_rng());
        let ephemeral_public = DalekPublicKey::from(&ephemeral);

        let shared = ephemeral.diffie_hellman(&self.to_dalek());
        if !shared.was_contributory() {
            return Err(CoreError::KeyFormat(
                "public key is not usable for key agreement".into(),
            ));
        }

        let wrap_key = derive_wrap_key(
            shared.as_bytes(),
            ephemeral_public.as_bytes(),
            &self.0,
            context,
        );

        let nonce = FileIv::generate();
        let sealed = wrap_key.encrypt(file_key.as_bytes(), &nonce)?;

        let mut out = Vec::with_capacity(WRAPPED_KEY_LEN);
        out.extend_from_slice(ephemeral_public.as_bytes());
        out.extend_from_slice(nonce.as_bytes());
        out.extend_from_slice(&sealed);
        Ok(out)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", &hex::encode(self.0)[..16])
    }
}

/// An X25519 private key. Only usable to unwrap file keys.
pub struct PrivateKey(StaticSecret);

impl PrivateKey {
    pub(crate) fn from_bytes(bytes: [u8; X25519_LEN]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    pub(crate) fn to_bytes(&self) -> Zeroizing<[u8; X25519_LEN]> {
        Zeroizing::new(self.0.to_bytes())
    }

    /// Derive the public half.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(*DalekPublicKey::from(&self.0).as_bytes())
    }

    /// Recover a file key wrapped with [`PublicKey::wrap`].
    ///
    /// Every failure (wrong length, wrong key, tampering) is reported as the
    /// same [`CoreError::Decryption`].
    pub fn unwrap(&self, wrapped: &[u8], context: &[u8]) -> Result<FileKey> {
        if wrapped.len() != WRAPPED_KEY_LEN {
            return Err(CoreError::Decryption("wrapped key has wrong length".into()));
        }

        let (ephemeral_bytes, rest) = wrapped.split_at(X25519_LEN);
        let (nonce_bytes, sealed) = rest.split_at(IV_LEN);

        let mut ephemeral = [0u8; X25519_LEN];
        ephemeral.copy_from_slice(ephemeral_bytes);
        let nonce = FileIv::from_slice(nonce_bytes)
            .ok_or_else(|| CoreError::Decryption("wrapped key has wrong length".into()))?;

        let shared = self.0.diffie_hellman(&DalekPublicKey::from(ephemeral));
        let own_public = self.public_key();
        let wrap_key = derive_wrap_key(shared.as_bytes(), &ephemeral, &own_public.0, context);

        let key_bytes = Zeroizing::new(wrap_key.decrypt(sealed, &nonce)?);
        let arr: [u8; KEY_LEN] = key_bytes
            .as_slice()
            .try_into()
            .map_err(|_| CoreError::Decryption("unwrapped key has wrong length".into()))?;
        Ok(FileKey::from_bytes(arr))
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey(public={:?})", self.public_key())
    }
}

/// An asymmetric key pair for one user identity.
pub struct KeyPair {
    public: PublicKey,
    private: PrivateKey,
}

impl KeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::thread_rng());
        Self::from_private(PrivateKey(secret))
    }

    /// Create a deterministic key pair from a 32-byte seed.
    pub fn from_seed(seed: [u8; X25519_LEN]) -> Self {
        Self::from_private(PrivateKey::from_bytes(seed))
    }

    /// Build a pair around an existing private key.
    pub fn from_private(private: PrivateKey) -> Self {
        Self {
            public: private.public_key(),
            private,
        }
    }

    /// The public half.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// The private half.
    pub fn private_key(&self) -> &PrivateKey {
        &self.private
    }

    /// Split into its halves.
    pub fn into_parts(self) -> (PublicKey, PrivateKey) {
        (self.public, self.private)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair").field("public", &self.public).finish()
    }
}

fn derive_wrap_key(
    shared: &[u8; X25519_LEN],
    ephemeral_public: &[u8; X25519_LEN],
    recipient_public: &[u8; X25519_LEN],
    context: &[u8],
) -> FileKey {
    let mut hasher = blake3::Hasher::new_derive_key(WRAP_DOMAIN);
    hasher.update(shared);
    hasher.update(ephemeral_public);
    hasher.update(recipient_public);
    hasher.update(context);
    FileKey(*hasher.finalize().as_bytes())
}
