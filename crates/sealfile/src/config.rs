//! Client configuration.

/// Configuration for the [`SealClient`](crate::SealClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Expiry applied, relative to creation, when a seal request sets none.
    pub default_ttl_ms: Option<i64>,
    /// Whether to persist envelopes after sealing.
    pub store_on_seal: bool,
    /// Reject inputs larger than this many bytes.
    pub max_file_size: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: None,
            store_on_seal: true,
            max_file_size: None,
        }
    }
}

impl ClientConfig {
    /// Expire sealed files `ttl_ms` after creation unless a request says otherwise.
    pub fn with_default_ttl(mut self, ttl_ms: i64) -> Self {
        self.default_ttl_ms = Some(ttl_ms);
        self
    }

    /// Set whether sealed envelopes are persisted.
    pub fn with_store_on_seal(mut self, store: bool) -> Self {
        self.store_on_seal = store;
        self
    }

    /// Cap the plaintext size.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert!(config.store_on_seal);
        assert_eq!(config.default_ttl_ms, None);
        assert_eq!(config.max_file_size, None);
    }

    #[test]
    fn test_setters() {
        let config = ClientConfig::default()
            .with_default_ttl(60_000)
            .with_store_on_seal(false)
            .with_max_file_size(1024);
        assert_eq!(config.default_ttl_ms, Some(60_000));
        assert!(!config.store_on_seal);
        assert_eq!(config.max_file_size, Some(1024));
    }
}
