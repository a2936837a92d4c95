//! # Sealfile Envelope
//!
//! The sealed-file envelope protocol: building, validating, and opening.
//!
//! ## Overview
//!
//! A sealed file carries one ciphertext and one wrapped copy of the file key
//! per recipient:
//!
//! 1. **File Key**: a fresh ChaCha20-Poly1305 key encrypts the file bytes
//! 2. **Recipient Entries**: the file key is wrapped for each recipient's
//!    X25519 public key
//!
//! Opening runs a four-state pipeline (`Validating → Decrypting → Done`, or
//! `Failed`) so callers can show each stage and tell failures apart.
//!
//! ## Usage
//!
//! ```rust
//! use sealfile_core::{export_public_key, now_millis, KeyPair};
//! use sealfile_envelope::{open_sealed_file, SealFileBuilder};
//!
//! let alice = KeyPair::generate();
//!
//! let sealed = SealFileBuilder::new("hello.txt", "text/plain", b"hello".to_vec())
//!     .recipient("alice@example.com", export_public_key(alice.public_key()))
//!     .build()
//!     .unwrap();
//!
//! let file = open_sealed_file(&sealed, "Alice@Example.com", alice.private_key(), now_millis())
//!     .unwrap();
//! assert_eq!(&file.data[..], b"hello");
//! ```

pub mod builder;
pub mod envelope;
pub mod error;
pub mod pipeline;
pub mod validation;

pub use builder::{create_seal_file, FileMeta, RecipientKey, SealFileBuilder, SealOptions};
pub use envelope::{Metadata, MetadataValue, RecipientEntry, SealedFile, SEALED_FILE_VERSION};
pub use error::{ErrorKind, OpenError, SealError};
pub use pipeline::{open_sealed_file, DecryptedFile, Decrypting, OpenPhase, OpenState, Validating};
pub use validation::{validate, ValidatedEnvelope, ValidationResult};
