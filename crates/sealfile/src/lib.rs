//! # Sealfile
//!
//! Share a file with a list of people by email so that only they can read
//! it, and only until it expires.
//!
//! ## Overview
//!
//! - **Sealing**: the file is encrypted once with a fresh key, and that key
//!   is wrapped for each recipient's published public key
//! - **Opening**: the recipient's client checks structure, expiry and
//!   membership before any decryption is attempted
//! - **Storage**: envelopes, the public-key directory and the local keyring
//!   sit behind traits with SQLite and in-memory backends
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use sealfile::store::SqliteStore;
//! use sealfile::{ClientConfig, SealClient, SealRequest};
//!
//! async fn example() {
//!     let store = SqliteStore::open("sealfile.db")
//!         .unwrap()
//!         .unlock_keyring("correct horse battery staple")
//!         .await
//!         .unwrap();
//!     let store = Arc::new(store);
//!     let client = SealClient::new(store.clone(), store.clone(), ClientConfig::default());
//!
//!     client.provision_identity("alice@example.com", store.as_ref()).await.unwrap();
//!
//!     let sealed = client
//!         .seal(
//!             SealRequest::new("plan.txt", "text/plain", b"top secret".to_vec())
//!                 .recipient("alice@example.com"),
//!         )
//!         .await
//!         .unwrap();
//!
//!     let file = client
//!         .open(&sealed.file_id, "Alice@Example.com", store.as_ref())
//!         .await
//!         .unwrap();
//!     assert_eq!(&file.data[..], b"top secret");
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `sealfile::core` - Key codec and primitive crypto
//! - `sealfile::envelope` - Envelope format, builder, validator, open pipeline
//! - `sealfile::store` - Storage traits and backends

pub mod client;
pub mod config;
pub mod error;

pub use sealfile_core as core;
pub use sealfile_envelope as envelope;
pub use sealfile_store as store;

pub use client::{open_envelope, SealClient, SealRequest};
pub use config::ClientConfig;
pub use error::{ClientError, Result};

pub use sealfile_core::{
    export_private_key, export_public_key, generate_key_pair, import_private_key,
    import_public_key, FileId, KdfParams, KeyPair, KeyringKey, Timestamp,
};
pub use sealfile_envelope::{
    open_sealed_file, DecryptedFile, ErrorKind, OpenError, OpenPhase, OpenState, SealError,
    SealFileBuilder, SealedFile,
};
