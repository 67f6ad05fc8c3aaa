//! In-memory user repository

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::user::{User, UserRepository};
use crate::domain::DomainError;

/// In-memory user repository for single-process deployments and tests
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    should_fail: Arc<RwLock<bool>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether operations should fail
    pub async fn set_should_fail(&self, fail: bool) {
        *self.should_fail.write().await = fail;
    }

    async fn check_should_fail(&self) -> Result<(), DomainError> {
        if *self.should_fail.read().await {
            return Err(DomainError::storage("In-memory repository configured to fail"));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, DomainError> {
        self.check_should_fail().await?;
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email() == user.email()) {
            return Err(DomainError::conflict(format!(
                "Email '{}' is already registered",
                user.email()
            )));
        }

        users.insert(user.id(), user.clone());
        Ok(user)
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, DomainError> {
        self.check_should_fail().await?;
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        self.check_should_fail().await?;
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email() == email).cloned())
    }

    async fn set_verified(&self, id: Uuid) -> Result<(), DomainError> {
        self.check_should_fail().await?;
        let mut users = self.users.write().await;

        match users.get_mut(&id) {
            Some(user) => {
                user.mark_verified();
                Ok(())
            }
            None => Err(DomainError::not_found(format!("User '{}' not found", id))),
        }
    }

    async fn list(&self) -> Result<Vec<User>, DomainError> {
        self.check_should_fail().await?;
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|u| std::cmp::Reverse(u.created_at()));
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::UserRole;

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = InMemoryUserRepository::new();
        let user = User::new("reader@example.com", "hash");

        repo.create(user.clone()).await.unwrap();

        let by_id = repo.get(user.id()).await.unwrap().unwrap();
        assert_eq!(by_id.email(), "reader@example.com");

        let by_email = repo.get_by_email("reader@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id(), user.id());
        assert!(repo.email_exists("reader@example.com").await.unwrap());
        assert!(!repo.email_exists("other@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_email_uniqueness() {
        let repo = InMemoryUserRepository::new();

        repo.create(User::new("reader@example.com", "a")).await.unwrap();
        let result = repo.create(User::new("reader@example.com", "b")).await;

        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_set_verified() {
        let repo = InMemoryUserRepository::new();
        let user = repo.create(User::new("reader@example.com", "hash")).await.unwrap();

        repo.set_verified(user.id()).await.unwrap();
        assert!(repo.get(user.id()).await.unwrap().unwrap().is_verified());

        let missing = repo.set_verified(Uuid::new_v4()).await;
        assert!(missing.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let repo = InMemoryUserRepository::new();

        let first = repo.create(User::new("a@example.com", "h")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = repo
            .create(User::new("b@example.com", "h").with_role(UserRole::Admin))
            .await
            .unwrap();

        let users = repo.list().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id(), second.id());
        assert_eq!(users[1].id(), first.id());
    }

    #[tokio::test]
    async fn test_should_fail() {
        let repo = InMemoryUserRepository::new();
        repo.set_should_fail(true).await;

        let result = repo.get(Uuid::new_v4()).await;
        assert!(result.unwrap_err().is_internal());
    }
}
