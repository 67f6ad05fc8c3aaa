//! Task pipeline infrastructure - queues, distributor, worker pool and handlers

mod distributor;
mod email_handler;
mod in_memory;
mod processor;
mod redis;

use std::sync::Arc;

use crate::domain::task::TaskQueue;
use crate::domain::DomainError;
use crate::infrastructure::kv::StoreType;

pub use distributor::TaskDistributor;
pub use email_handler::SendVerificationEmailHandler;
pub use in_memory::InMemoryTaskQueue;
pub use processor::{backoff_delay, ProcessorConfig, TaskOutcome, TaskProcessor};
pub use self::redis::{RedisTaskQueue, RedisTaskQueueConfig};

/// Creates the task queue for the configured backend
pub async fn create_task_queue(
    store_type: StoreType,
    config: RedisTaskQueueConfig,
) -> Result<Arc<dyn TaskQueue>, DomainError> {
    match store_type {
        StoreType::InMemory => Ok(Arc::new(InMemoryTaskQueue::new(config.lease))),
        StoreType::Redis => Ok(Arc::new(RedisTaskQueue::new(config).await?)),
    }
}
