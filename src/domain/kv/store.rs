//! Expiring store trait definition

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::DomainError;

/// State of a fixed-window counter right after an increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterWindow {
    /// Counter value after the increment
    pub count: i64,
    /// Time left until the window key expires
    pub ttl_remaining: Duration,
}

/// Remote key-value store with per-key expiry
///
/// Implementations must bound every call by their configured deadline and report a
/// timeout as [`DomainError::Store`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExpiringStore: Send + Sync {
    /// Reads a value, `None` when the key is missing or expired
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Writes a value with a TTL, replacing any previous value
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError>;

    /// Deletes a key, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Increments a counter and, when the increment created the key, sets its expiry
    /// to `window`. Both steps run as one atomic unit in one round trip.
    async fn increment_window(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<CounterWindow, DomainError>;
}
