//! In-memory expiring store
//!
//! Expiry is measured on the tokio clock so tests can pause and advance time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::kv::{CounterWindow, ExpiringStore};
use crate::domain::DomainError;

/// Writes between sweeps of expired keys
const SWEEP_INTERVAL: u64 = 1024;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Single-process expiring store
///
/// Every operation runs under one lock, which gives the same per-key atomicity the
/// Redis backend gets from MULTI/EXEC. Expired keys are dropped when read, and all of
/// them are swept every `SWEEP_INTERVAL` writes.
#[derive(Debug, Default)]
pub struct InMemoryExpiringStore {
    entries: Mutex<HashMap<String, Entry>>,
    writes: AtomicU64,
}

impl InMemoryExpiringStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|e| e.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Keys held in the map, expired or not
    pub async fn held(&self) -> usize {
        self.entries.lock().await.len()
    }

    fn sweep_if_due(&self, entries: &mut HashMap<String, Entry>, now: Instant) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_INTERVAL == 0 {
            entries.retain(|_, e| e.is_live(now));
        }
    }
}

#[async_trait]
impl ExpiringStore for InMemoryExpiringStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        self.sweep_if_due(&mut entries, now);

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        Ok(entries.remove(key).is_some_and(|e| e.is_live(now)))
    }

    async fn increment_window(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<CounterWindow, DomainError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        self.sweep_if_due(&mut entries, now);

        if !entries.get(key).is_some_and(|e| e.is_live(now)) {
            entries.remove(key);
        }

        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });

        let count = entry
            .value
            .parse::<i64>()
            .map_err(|_| DomainError::store(format!("Value at '{}' is not an integer", key)))?
            + 1;
        entry.value = count.to_string();

        let expires_at = *entry.expires_at.get_or_insert(now + window);

        Ok(CounterWindow {
            count,
            ttl_remaining: expires_at.saturating_duration_since(now),
        })
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_set_get_expiry() {
        let store = InMemoryExpiringStore::new();

        store.set("k", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryExpiringStore::new();

        store.set("k", "v", Duration::from_secs(10)).await.unwrap();
        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_increment_window_fixed_expiry() {
        let store = InMemoryExpiringStore::new();
        let window = Duration::from_secs(60);

        let first = store.increment_window("c", window).await.unwrap();
        assert_eq!(first.count, 1);
        assert_eq!(first.ttl_remaining, window);

        tokio::time::advance(Duration::from_secs(20)).await;
        let second = store.increment_window("c", window).await.unwrap();
        assert_eq!(second.count, 2);
        assert_eq!(second.ttl_remaining, Duration::from_secs(40));

        tokio::time::advance(Duration::from_secs(40)).await;
        let fresh = store.increment_window("c", window).await.unwrap();
        assert_eq!(fresh.count, 1);
        assert_eq!(fresh.ttl_remaining, window);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_counters_are_swept() {
        let store = InMemoryExpiringStore::new();
        let window = Duration::from_secs(60);

        for i in 0..10_000 {
            let key = format!("rate:/api/v1/login:10.0.{}.{}", i / 256, i % 256);
            store.increment_window(&key, window).await.unwrap();
        }
        assert_eq!(store.len().await, 10_000);

        tokio::time::advance(Duration::from_secs(3600)).await;
        for i in 0..SWEEP_INTERVAL {
            let key = format!("rate:/api/v1/me:{}", i);
            store.increment_window(&key, window).await.unwrap();
        }

        assert_eq!(store.len().await, SWEEP_INTERVAL as usize);
        assert!(store.held().await <= SWEEP_INTERVAL as usize);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_sweeps_expired_keys() {
        let store = InMemoryExpiringStore::new();

        for i in 0..SWEEP_INTERVAL {
            let key = format!("old:{}", i);
            store.set(&key, "v", Duration::from_secs(1)).await.unwrap();
        }
        tokio::time::advance(Duration::from_secs(2)).await;

        for i in 0..SWEEP_INTERVAL {
            let key = format!("new:{}", i);
            store.set(&key, "v", Duration::from_secs(60)).await.unwrap();
        }

        assert_eq!(store.held().await, SWEEP_INTERVAL as usize);
    }

    #[tokio::test]
    async fn test_increment_non_integer_fails() {
        let store = InMemoryExpiringStore::new();
        store.set("k", "abc", Duration::from_secs(10)).await.unwrap();

        let result = store.increment_window("k", Duration::from_secs(10)).await;
        assert!(matches!(result, Err(DomainError::Store { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(InMemoryExpiringStore::new());

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .increment_window("c", Duration::from_secs(60))
                        .await
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get("c").await.unwrap(), Some("64".to_string()));
    }
}
