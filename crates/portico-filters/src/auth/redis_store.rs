//! Redis-backed token-state store.
//!
//! A token is revoked when the key `{prefix}{jti}` exists.

use super::store::{StoreError, TokenStateStore};
use crate::filter::BoxFuture;
use redis::aio::ConnectionManager;

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    /// Host name.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Prefix prepended to every key.
    pub key_prefix: String,
}

impl RedisSettings {
    /// Returns the connection URL.
    #[must_use]
    pub fn url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}

/// Revocation lookups against Redis.
#[derive(Clone)]
pub struct RedisTokenStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl std::fmt::Debug for RedisTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTokenStore")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl RedisTokenStore {
    /// Connects to Redis.
    pub async fn connect(settings: &RedisSettings) -> Result<Self, StoreError> {
        let client = redis::Client::open(settings.url())
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!(host = %settings.host, port = settings.port, "connected to token store");
        Ok(Self {
            conn,
            key_prefix: settings.key_prefix.clone(),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

impl TokenStateStore for RedisTokenStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn is_revoked<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, StoreError>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let exists: i64 = redis::cmd("EXISTS")
                .arg(self.full_key(key))
                .query_async(&mut conn)
                .await
                .map_err(|e| {
                    if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() {
                        StoreError::Connection(e.to_string())
                    } else {
                        StoreError::Command(e.to_string())
                    }
                })?;
            Ok(exists > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url() {
        let settings = RedisSettings {
            host: "redis.internal".to_string(),
            port: 6380,
            key_prefix: "revoked:".to_string(),
        };
        assert_eq!(settings.url(), "redis://redis.internal:6380/");
    }
}
