//! Token-state stores.

use crate::filter::BoxFuture;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;

/// Token-state store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("token store connection failed: {0}")]
    Connection(String),

    /// The store rejected the lookup.
    #[error("token store command failed: {0}")]
    Command(String),
}

/// Answers whether a token has been revoked.
///
/// Keys are the token's `jti` claim when present, otherwise the raw token.
pub trait TokenStateStore: Send + Sync + std::fmt::Debug {
    /// Store name, used in logs.
    fn name(&self) -> &'static str;

    /// Returns `true` if `key` has been revoked.
    fn is_revoked<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, StoreError>>;
}

/// In-process store. Used when no external store is configured, and in tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    revoked: DashMap<String, Option<DateTime<Utc>>>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Revokes `key` permanently.
    pub fn revoke(&self, key: impl Into<String>) {
        self.revoked.insert(key.into(), None);
    }

    /// Revokes `key` until `until`. After that the entry is ignored.
    pub fn revoke_until(&self, key: impl Into<String>, until: DateTime<Utc>) {
        self.revoked.insert(key.into(), Some(until));
    }

    /// Removes a revocation.
    pub fn restore(&self, key: &str) {
        self.revoked.remove(key);
    }

    fn check(&self, key: &str) -> bool {
        match self.revoked.get(key).map(|entry| *entry.value()) {
            Some(None) => true,
            Some(Some(until)) if until > Utc::now() => true,
            Some(Some(_)) => {
                self.revoked.remove(key);
                false
            }
            None => false,
        }
    }
}

impl TokenStateStore for MemoryTokenStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_revoked<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, StoreError>> {
        let revoked = self.check(key);
        Box::pin(async move { Ok(revoked) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryTokenStore::new();
        assert!(!store.is_revoked("abc").await.unwrap());

        store.revoke("abc");
        assert!(store.is_revoked("abc").await.unwrap());

        store.restore("abc");
        assert!(!store.is_revoked("abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_timed_revocation_lapses() {
        let store = MemoryTokenStore::new();
        store.revoke_until("live", Utc::now() + Duration::minutes(5));
        store.revoke_until("lapsed", Utc::now() - Duration::seconds(1));

        assert!(store.is_revoked("live").await.unwrap());
        assert!(!store.is_revoked("lapsed").await.unwrap());
        assert_eq!(store.name(), "memory");
    }
}
