//! # Sealfile Testkit
//!
//! Testing utilities for Sealfile.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: parties with key pairs and a pre-populated memory store
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use sealfile_testkit::generators::{sealed_from_params, SealParams};
//!
//! proptest! {
//!     #[test]
//!     fn every_recipient_has_an_entry(params: SealParams) {
//!         let (sealed, parties) = sealed_from_params(&params).unwrap();
//!         prop_assert_eq!(sealed.recipients.len(), parties.len());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use sealfile_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::with_parties(&["a@x.com", "b@x.com"]).await.unwrap();
//! let alice = fixture.party("a@x.com").unwrap();
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{multi_party_fixtures, Party, TestFixture};
pub use generators::{sealed_from_params, SealParams};
