//! In-memory refresh token store

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::token::RefreshTokenStore;
use crate::domain::DomainError;

const SWEEP_INTERVAL: u64 = 1024;

/// Map-backed refresh token store honoring the same contract as the store-backed one
///
/// Expired tokens are swept every `SWEEP_INTERVAL` creations.
#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: RwLock<HashMap<String, (String, Instant)>>,
    creations: AtomicU64,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens that would still verify
    pub async fn live_count(&self) -> usize {
        let now = Instant::now();
        self.tokens
            .read()
            .await
            .values()
            .filter(|(_, expires_at)| *expires_at > now)
            .count()
    }

    /// Tokens held in the map, expired or not
    pub async fn held(&self) -> usize {
        self.tokens.read().await.len()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn create(&self, principal: &str, ttl: Duration) -> Result<String, DomainError> {
        let token = Uuid::new_v4().to_string();
        let now = Instant::now();
        let mut tokens = self.tokens.write().await;

        if (self.creations.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0 {
            tokens.retain(|_, (_, expires_at)| *expires_at > now);
        }

        tokens.insert(token.clone(), (principal.to_string(), now + ttl));
        Ok(token)
    }

    async fn verify(&self, token: &str) -> Result<String, DomainError> {
        let now = Instant::now();

        match self.tokens.read().await.get(token) {
            Some((principal, expires_at)) if *expires_at > now => Ok(principal.clone()),
            _ => Err(DomainError::not_found("refresh token not found")),
        }
    }

    async fn delete(&self, token: &str) -> Result<(), DomainError> {
        self.tokens.write().await.remove(token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_verify_delete() {
        let store = InMemoryRefreshTokenStore::new();

        let token = store.create("user-1", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.verify(&token).await.unwrap(), "user-1");
        assert_eq!(store.live_count().await, 1);

        store.delete(&token).await.unwrap();
        assert!(store.verify(&token).await.unwrap_err().is_not_found());
        store.delete(&token).await.unwrap();
        assert_eq!(store.live_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry() {
        let store = InMemoryRefreshTokenStore::new();

        let token = store.create("user-1", Duration::from_secs(5)).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;

        assert!(store.verify(&token).await.unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_tokens_are_swept() {
        let store = InMemoryRefreshTokenStore::new();

        for _ in 0..SWEEP_INTERVAL {
            store.create("user-1", Duration::from_secs(5)).await.unwrap();
        }
        tokio::time::advance(Duration::from_secs(6)).await;

        for _ in 0..SWEEP_INTERVAL {
            store.create("user-2", Duration::from_secs(60)).await.unwrap();
        }

        assert_eq!(store.live_count().await, SWEEP_INTERVAL as usize);
        assert_eq!(store.held().await, SWEEP_INTERVAL as usize);
    }
}
