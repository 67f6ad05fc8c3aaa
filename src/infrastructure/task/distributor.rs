//! Producer side of the task pipeline

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::task::{
    SendVerificationEmailPayload, TaskEnvelope, TaskQueue, TASK_SEND_VERIFICATION_EMAIL,
};
use crate::domain::DomainError;

/// Builds typed jobs and hands them to the queue
#[derive(Debug, Clone)]
pub struct TaskDistributor {
    queue: Arc<dyn TaskQueue>,
}

impl TaskDistributor {
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        Self { queue }
    }

    pub async fn distribute_verification_email(
        &self,
        payload: &SendVerificationEmailPayload,
    ) -> Result<Uuid, DomainError> {
        let task = TaskEnvelope::new(TASK_SEND_VERIFICATION_EMAIL, payload)?;
        let id = self.queue.enqueue(task).await?;

        info!(
            task_id = %id,
            task_type = TASK_SEND_VERIFICATION_EMAIL,
            user_id = %payload.user_id,
            "Enqueued task"
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::task::InMemoryTaskQueue;
    use std::time::Duration;

    #[tokio::test]
    async fn test_distribute_verification_email() {
        let queue = Arc::new(InMemoryTaskQueue::default());
        let distributor = TaskDistributor::new(queue.clone());

        let payload = SendVerificationEmailPayload {
            user_id: Uuid::new_v4(),
            email: "reader@example.com".to_string(),
        };
        let id = distributor.distribute_verification_email(&payload).await.unwrap();

        let delivery = queue.dequeue(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(delivery.task.id, id);
        assert_eq!(delivery.task.task_type, TASK_SEND_VERIFICATION_EMAIL);
        assert_eq!(
            delivery.task.decode::<SendVerificationEmailPayload>().unwrap(),
            payload
        );
    }
}
