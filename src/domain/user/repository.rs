//! User repository trait

use async_trait::async_trait;
use std::fmt::Debug;
use uuid::Uuid;

use super::entity::User;
use crate::domain::DomainError;

/// Repository trait for user storage
#[async_trait]
pub trait UserRepository: Send + Sync + Debug {
    /// Create a new user. `Conflict` when the email is already registered.
    async fn create(&self, user: User) -> Result<User, DomainError>;

    /// Get a user by their ID
    async fn get(&self, id: Uuid) -> Result<Option<User>, DomainError>;

    /// Get a user by their (normalized) email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError>;

    /// Set the verified flag. `NotFound` when the user does not exist.
    async fn set_verified(&self, id: Uuid) -> Result<(), DomainError>;

    /// All users, newest first
    async fn list(&self) -> Result<Vec<User>, DomainError>;

    /// Check if an email is already registered
    async fn email_exists(&self, email: &str) -> Result<bool, DomainError> {
        Ok(self.get_by_email(email).await?.is_some())
    }
}
