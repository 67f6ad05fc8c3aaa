//! Task handler trait

use async_trait::async_trait;
use thiserror::Error;

use super::envelope::TaskEnvelope;

/// Failure of one handler invocation. The kind decides redelivery.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Transient; the queue redelivers with backoff
    #[error("retryable: {0}")]
    Retryable(String),

    /// Permanent for this job instance; the queue archives it
    #[error("fatal: {0}")]
    Fatal(String),
}

impl TaskError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

/// Handles every job of one task type
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn task_type(&self) -> &'static str;

    async fn handle(&self, task: &TaskEnvelope) -> Result<(), TaskError>;
}
