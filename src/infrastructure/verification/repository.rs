//! Verification token repositories

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::verification::{VerificationToken, VerificationTokenRepository};
use crate::domain::DomainError;
use crate::infrastructure::storage::map_write_error;

/// PostgreSQL implementation of VerificationTokenRepository
#[derive(Debug, Clone)]
pub struct PostgresVerificationTokenRepository {
    pool: PgPool,
}

impl PostgresVerificationTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VerificationTokenRepository for PostgresVerificationTokenRepository {
    async fn create(&self, token: VerificationToken) -> Result<VerificationToken, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO verification_tokens (id, user_id, token, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_write_error(
                e,
                || "Verification token collision".to_string(),
                "create verification token",
            )
        })?;

        Ok(token)
    }

    async fn find(
        &self,
        token: &str,
        user_id: Uuid,
    ) -> Result<Option<VerificationToken>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, token, expires_at, created_at
            FROM verification_tokens
            WHERE token = $1 AND user_id = $2
            "#,
        )
        .bind(token)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to find verification token: {}", e)))?;

        Ok(row.map(|row| VerificationToken {
            id: row.get("id"),
            user_id: row.get("user_id"),
            token: row.get("token"),
            expires_at: row.get("expires_at"),
            created_at: row.get("created_at"),
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM verification_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::storage(format!("Failed to delete verification token: {}", e))
            })?;

        Ok(result.rows_affected() > 0)
    }
}

/// In-memory verification token repository
#[derive(Debug, Default, Clone)]
pub struct InMemoryVerificationTokenRepository {
    tokens: Arc<RwLock<HashMap<Uuid, VerificationToken>>>,
}

impl InMemoryVerificationTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows owned by a user
    pub async fn tokens_for(&self, user_id: Uuid) -> Vec<VerificationToken> {
        self.tokens
            .read()
            .await
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl VerificationTokenRepository for InMemoryVerificationTokenRepository {
    async fn create(&self, token: VerificationToken) -> Result<VerificationToken, DomainError> {
        let mut tokens = self.tokens.write().await;

        if tokens.values().any(|t| t.token == token.token) {
            return Err(DomainError::conflict("Verification token collision"));
        }

        tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn find(
        &self,
        token: &str,
        user_id: Uuid,
    ) -> Result<Option<VerificationToken>, DomainError> {
        Ok(self
            .tokens
            .read()
            .await
            .values()
            .find(|t| t.token == token && t.user_id == user_id)
            .cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DomainError> {
        Ok(self.tokens.write().await.remove(&id).is_some())
    }
}
