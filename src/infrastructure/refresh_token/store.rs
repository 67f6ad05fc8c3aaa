//! Refresh tokens kept in the shared expiring store

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::domain::kv::{keys, ExpiringStore};
use crate::domain::token::RefreshTokenStore;
use crate::domain::DomainError;

/// `refresh:<token> -> principal` entries with TTL
#[derive(Clone)]
pub struct StoreRefreshTokenStore {
    store: Arc<dyn ExpiringStore>,
}

impl fmt::Debug for StoreRefreshTokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRefreshTokenStore").finish_non_exhaustive()
    }
}

impl StoreRefreshTokenStore {
    pub fn new(store: Arc<dyn ExpiringStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RefreshTokenStore for StoreRefreshTokenStore {
    async fn create(&self, principal: &str, ttl: Duration) -> Result<String, DomainError> {
        let token = Uuid::new_v4().to_string();

        self.store
            .set(&keys::refresh_token_key(&token), principal, ttl)
            .await?;

        debug!(principal = %principal, ttl_secs = ttl.as_secs(), "Refresh token created");
        Ok(token)
    }

    async fn verify(&self, token: &str) -> Result<String, DomainError> {
        self.store
            .get(&keys::refresh_token_key(token))
            .await?
            .ok_or_else(|| DomainError::not_found("refresh token not found"))
    }

    async fn delete(&self, token: &str) -> Result<(), DomainError> {
        self.store.delete(&keys::refresh_token_key(token)).await?;
        Ok(())
    }
}
