//! Refresh token capability
//!
//! Refresh tokens are opaque, single-use by rotation. Verification never deletes;
//! callers pair every successful verify with delete-then-reissue.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Issues, verifies and revokes opaque refresh tokens
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Mint a random token (at least 122 bits of entropy) mapped to `principal` for `ttl`
    async fn create(&self, principal: &str, ttl: Duration) -> Result<String, DomainError>;

    /// Resolve the principal for a token. `NotFound` when unknown, expired or deleted.
    async fn verify(&self, token: &str) -> Result<String, DomainError>;

    /// Revoke a token. Deleting an absent token is not an error.
    async fn delete(&self, token: &str) -> Result<(), DomainError>;
}
