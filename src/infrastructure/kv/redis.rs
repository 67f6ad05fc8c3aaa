//! Redis expiring store implementation

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisResult};

use crate::domain::kv::{CounterWindow, ExpiringStore};
use crate::domain::DomainError;

/// Configuration for the Redis store
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
    /// Deadline applied to every command
    pub command_timeout: Duration,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: None,
            command_timeout: Duration::from_millis(500),
        }
    }
}

impl RedisStoreConfig {
    /// Creates a new configuration with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Sets the per-command deadline
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// Open a managed connection, bounded by the configured deadline
pub async fn connect(config: &RedisStoreConfig) -> Result<ConnectionManager, DomainError> {
    let client = Client::open(config.url.as_str())
        .map_err(|e| DomainError::store(format!("Failed to create Redis client: {}", e)))?;

    let connect_timeout = config.command_timeout.max(Duration::from_secs(5));
    tokio::time::timeout(connect_timeout, ConnectionManager::new(client))
        .await
        .map_err(|_| DomainError::store("Timed out connecting to Redis"))?
        .map_err(|e| DomainError::store(format!("Failed to connect to Redis: {}", e)))
}

/// Redis-backed expiring store
///
/// - Every command is bounded by `command_timeout`; a timeout is a store error
/// - `increment_window` runs INCR, PEXPIRE NX and PTTL in one MULTI/EXEC round trip
/// - Connection pooling via ConnectionManager
#[derive(Clone)]
pub struct RedisExpiringStore {
    connection: ConnectionManager,
    config: RedisStoreConfig,
}

impl fmt::Debug for RedisExpiringStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisExpiringStore")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisExpiringStore {
    /// Connects using the given configuration
    pub async fn new(config: RedisStoreConfig) -> Result<Self, DomainError> {
        let connection = connect(&config).await?;
        Ok(Self { connection, config })
    }

    /// Wraps an existing connection
    pub fn with_connection(connection: ConnectionManager, config: RedisStoreConfig) -> Self {
        Self { connection, config }
    }

    fn prefix_key(&self, key: &str) -> String {
        match &self.config.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }

    async fn bounded<T, F>(&self, op: &str, key: &str, fut: F) -> Result<T, DomainError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.config.command_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(DomainError::store(format!(
                "Failed to {} key '{}': {}",
                op, key, e
            ))),
            Err(_) => Err(DomainError::store(format!(
                "Timed out after {:?} trying to {} key '{}'",
                self.config.command_timeout, op, key
            ))),
        }
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl ExpiringStore for RedisExpiringStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        self.bounded("get", key, async move {
            conn.get::<_, Option<String>>(&prefixed_key).await
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();
        let ttl_ms = duration_millis(ttl);

        self.bounded("set", key, async move {
            conn.pset_ex::<_, _, ()>(&prefixed_key, value, ttl_ms).await
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let deleted: i64 = self
            .bounded("delete", key, async move { conn.del(&prefixed_key).await })
            .await?;

        Ok(deleted > 0)
    }

    async fn increment_window(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<CounterWindow, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();
        let window_ms = duration_millis(window);

        // NX: only a key without expiry gets one, i.e. the increment that created it
        let (count, pttl): (i64, i64) = self
            .bounded("increment", key, async move {
                redis::pipe()
                    .atomic()
                    .cmd("INCR")
                    .arg(&prefixed_key)
                    .cmd("PEXPIRE")
                    .arg(&prefixed_key)
                    .arg(window_ms)
                    .arg("NX")
                    .ignore()
                    .cmd("PTTL")
                    .arg(&prefixed_key)
                    .query_async(&mut conn)
                    .await
            })
            .await?;

        let ttl_remaining = u64::try_from(pttl)
            .map(Duration::from_millis)
            .unwrap_or(window);

        Ok(CounterWindow {
            count,
            ttl_remaining,
        })
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests require a running Redis 7+ instance (PEXPIRE ... NX)

    async fn test_store() -> RedisExpiringStore {
        let config = RedisStoreConfig::new("redis://127.0.0.1:6379")
            .with_key_prefix(format!("test-{}", uuid::Uuid::new_v4()));
        RedisExpiringStore::new(config).await.unwrap()
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_set_get_delete() {
        let store = test_store().await;

        store.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_increment_window_sets_ttl_once() {
        let store = test_store().await;

        let first = store
            .increment_window("rate:/x:p", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(first.count, 1);
        assert!(first.ttl_remaining > Duration::from_secs(55));

        let second = store
            .increment_window("rate:/x:p", Duration::from_secs(600))
            .await
            .unwrap();
        assert_eq!(second.count, 2);
        assert!(second.ttl_remaining <= Duration::from_secs(60));
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_concurrent_increments() {
        let store = test_store().await;

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .increment_window("rate:/c:p", Duration::from_secs(60))
                        .await
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get("rate:/c:p").await.unwrap(), Some("50".to_string()));
    }

    #[test]
    fn test_key_prefix() {
        let config = RedisStoreConfig::new("redis://localhost")
            .with_key_prefix("bookshare")
            .with_command_timeout(Duration::from_millis(250));

        assert_eq!(config.key_prefix, Some("bookshare".to_string()));
        assert_eq!(config.command_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_duration_millis_never_zero() {
        assert_eq!(duration_millis(Duration::ZERO), 1);
        assert_eq!(duration_millis(Duration::from_secs(2)), 2000);
    }
}
