//! # Sealfile Store
//!
//! Storage for sealed files and the keys around them. Provides trait-based
//! interfaces with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`EnvelopeStore`] - Persists sealed files by id
//! - [`KeyDirectory`] - Email to public-key lookup
//! - [`Keyring`] - Local private keys for signed-in identities, locked at rest
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sealfile_store::{EnvelopeStore, KeyDirectory, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("sealfile.db")
//!         .unwrap()
//!         .unlock_keyring("correct horse battery staple")
//!         .await
//!         .unwrap();
//!
//!     store.publish("alice@example.com", "MCowBQYDK2VuAyEA...").await.unwrap();
//!     let ids = store.list_for_recipient("Alice@Example.com").await.unwrap();
//!     println!("{} files for alice", ids.len());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent inserts**: inserting the same envelope twice returns `AlreadyExists`
//! - **Immutable envelopes**: a different envelope under a stored id returns `Conflict`
//! - **Case-insensitive emails**: every email key is normalized before use
//! - **Locked keyring**: private keys are stored only as ChaCha20-Poly1305
//!   blobs under a random or passphrase-derived keyring key

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{EnvelopeStore, EnvelopeStoreExt, InsertResult, KeyDirectory, Keyring};
