//! Backend selection for store-like components

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::kv::ExpiringStore;
use crate::domain::DomainError;

use super::in_memory::InMemoryExpiringStore;
use super::redis::{RedisExpiringStore, RedisStoreConfig};

/// Supported backends for the expiring store, refresh tokens and the task queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Single-process, lost on restart
    InMemory,
    #[default]
    Redis,
}

impl std::fmt::Display for StoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreType::InMemory => write!(f, "in_memory"),
            StoreType::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for StoreType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(StoreType::InMemory),
            "redis" => Ok(StoreType::Redis),
            _ => Err(DomainError::configuration(format!(
                "Unknown store type: {}. Valid types: in_memory, redis",
                s
            ))),
        }
    }
}

/// Creates the expiring store for the configured backend
pub async fn create_expiring_store(
    store_type: StoreType,
    redis: &RedisStoreConfig,
) -> Result<Arc<dyn ExpiringStore>, DomainError> {
    match store_type {
        StoreType::InMemory => Ok(Arc::new(InMemoryExpiringStore::new())),
        StoreType::Redis => Ok(Arc::new(RedisExpiringStore::new(redis.clone()).await?)),
    }
}
