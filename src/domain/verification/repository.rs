//! Verification token repository trait

use async_trait::async_trait;
use std::fmt::Debug;
use uuid::Uuid;

use super::entity::VerificationToken;
use crate::domain::DomainError;

/// Durable storage for verification tokens
#[async_trait]
pub trait VerificationTokenRepository: Send + Sync + Debug {
    /// Persist a new token. Several live tokens per user may coexist.
    async fn create(&self, token: VerificationToken) -> Result<VerificationToken, DomainError>;

    /// Point lookup matching both the token string and its owner
    async fn find(
        &self,
        token: &str,
        user_id: Uuid,
    ) -> Result<Option<VerificationToken>, DomainError>;

    /// Delete a row by id, returning whether it existed
    async fn delete(&self, id: Uuid) -> Result<bool, DomainError>;
}
