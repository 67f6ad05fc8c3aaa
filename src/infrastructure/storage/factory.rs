//! Runtime selection of the relational backends (users, verification tokens, audit)

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::domain::audit::AuditLogger;
use crate::domain::user::UserRepository;
use crate::domain::verification::VerificationTokenRepository;
use crate::domain::DomainError;
use crate::infrastructure::audit::{PostgresAuditLogger, TracingAuditLogger};
use crate::infrastructure::user::{InMemoryUserRepository, PostgresUserRepository};
use crate::infrastructure::verification::{
    InMemoryVerificationTokenRepository, PostgresVerificationTokenRepository,
};

use super::postgres::{connect_pool, PostgresConfig};

/// Supported storage types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    /// In-memory storage (for testing/development)
    InMemory,
    #[default]
    Postgres,
}

impl std::str::FromStr for StorageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Ok(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            _ => Err(DomainError::configuration(format!(
                "Unknown storage type: {}. Valid types: in_memory, postgres",
                s
            ))),
        }
    }
}

/// Repositories that live in the relational store
#[derive(Clone)]
pub struct RelationalBackends {
    pub users: Arc<dyn UserRepository>,
    pub verification_tokens: Arc<dyn VerificationTokenRepository>,
    pub audit: Arc<dyn AuditLogger>,
    /// Present for the Postgres backend, used by migrations
    pub pool: Option<PgPool>,
}

impl std::fmt::Debug for RelationalBackends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalBackends")
            .field("postgres", &self.pool.is_some())
            .finish_non_exhaustive()
    }
}

impl RelationalBackends {
    /// Fresh in-memory repositories with audit events written to the log
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::new()),
            verification_tokens: Arc::new(InMemoryVerificationTokenRepository::new()),
            audit: Arc::new(TracingAuditLogger),
            pool: None,
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PostgresUserRepository::new(pool.clone())),
            verification_tokens: Arc::new(PostgresVerificationTokenRepository::new(pool.clone())),
            audit: Arc::new(PostgresAuditLogger::new(pool.clone())),
            pool: Some(pool),
        }
    }
}

/// Creates the relational backends for the configured storage type
pub async fn create_relational_backends(
    storage_type: StorageType,
    postgres: &PostgresConfig,
) -> Result<RelationalBackends, DomainError> {
    match storage_type {
        StorageType::InMemory => Ok(RelationalBackends::in_memory()),
        StorageType::Postgres => Ok(RelationalBackends::postgres(connect_pool(postgres).await?)),
    }
}
