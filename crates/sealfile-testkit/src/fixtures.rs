//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use sealfile_core::{export_public_key, KeyPair};
use sealfile_envelope::RecipientKey;
use sealfile_store::{KeyDirectory, Keyring, MemoryStore, Result};

/// One identity: an email and its key pair.
#[derive(Debug)]
pub struct Party {
    pub email: String,
    pub keypair: KeyPair,
}

impl Party {
    /// Create a party with a random key pair.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            keypair: KeyPair::generate(),
        }
    }

    /// Create with a deterministic key pair from seed.
    pub fn with_seed(email: impl Into<String>, seed: [u8; 32]) -> Self {
        Self {
            email: email.into(),
            keypair: KeyPair::from_seed(seed),
        }
    }

    /// The encoded public key, as a directory would publish it.
    pub fn public_key(&self) -> String {
        export_public_key(self.keypair.public_key())
    }

    /// This party as a builder recipient.
    pub fn recipient_key(&self) -> RecipientKey {
        RecipientKey::new(self.email.clone(), self.public_key())
    }
}

/// A memory store acting as envelope store, directory and keyring, with
/// every party's keys already published and saved.
pub struct TestFixture {
    pub store: Arc<MemoryStore>,
    pub parties: Vec<Party>,
}

impl TestFixture {
    /// Create a fixture with no parties.
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            parties: Vec::new(),
        }
    }

    /// Create a fixture with a random key pair for each email.
    pub async fn with_parties(emails: &[&str]) -> Result<Self> {
        let mut fixture = Self::new();
        for email in emails {
            fixture.add_party(Party::new(*email)).await?;
        }
        Ok(fixture)
    }

    /// Publish and save `party`'s keys, then keep it.
    pub async fn add_party(&mut self, party: Party) -> Result<&Party> {
        self.store.publish(&party.email, &party.public_key()).await?;
        self.store
            .save_private_key(&party.email, party.keypair.private_key())
            .await?;
        self.parties.push(party);
        Ok(&self.parties[self.parties.len() - 1])
    }

    /// Look up a party by exact email.
    pub fn party(&self, email: &str) -> Option<&Party> {
        self.parties.iter().find(|p| p.email == email)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create deterministic parties `party0@example.com`, `party1@example.com`, ...
pub fn multi_party_fixtures(count: usize) -> Vec<Party> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[..8].copy_from_slice(&(i as u64).to_le_bytes());
            seed[31] = 0x5f;
            Party::with_seed(format!("party{}@example.com", i), seed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_publishes_keys() {
        let fixture = TestFixture::with_parties(&["a@x.com", "b@x.com"])
            .await
            .unwrap();
        let a = fixture.party("a@x.com").unwrap();

        assert_eq!(
            fixture.store.lookup("A@X.com").await.unwrap(),
            Some(a.public_key())
        );
        let saved = fixture.store.private_key("a@x.com").await.unwrap().unwrap();
        assert_eq!(saved.public_key(), *a.keypair.public_key());
        assert!(fixture.party("c@x.com").is_none());
    }

    #[test]
    fn test_multi_party() {
        let parties = multi_party_fixtures(3);

        let pks: Vec<_> = parties.iter().map(|p| p.public_key()).collect();
        assert_ne!(pks[0], pks[1]);
        assert_ne!(pks[1], pks[2]);
        assert_ne!(pks[0], pks[2]);

        // Deterministic.
        assert_eq!(multi_party_fixtures(3)[1].public_key(), pks[1]);
    }
}
