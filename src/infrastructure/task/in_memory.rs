//! In-memory task queue implementation

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::warn;
use uuid::Uuid;

use crate::domain::task::{MaintenanceReport, QueueStats, TaskDelivery, TaskEnvelope, TaskQueue};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<TaskEnvelope>,
    active: HashMap<Uuid, (TaskEnvelope, Instant)>,
    scheduled: Vec<(Instant, TaskEnvelope)>,
    dead: Vec<(TaskEnvelope, String)>,
}

/// Single-process queue with the same lease and retry semantics as the Redis queue
///
/// Jobs do not survive a restart. Used for tests and for running the API and the
/// workers in one process.
#[derive(Debug)]
pub struct InMemoryTaskQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    lease: Duration,
}

impl InMemoryTaskQueue {
    pub fn new(lease: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            lease,
        }
    }

    /// Archived jobs with the reason they were archived
    pub async fn dead_letters(&self) -> Vec<(TaskEnvelope, String)> {
        self.state.lock().await.dead.clone()
    }

    fn parse_receipt(delivery: &TaskDelivery) -> Result<Uuid, DomainError> {
        Uuid::parse_str(delivery.receipt())
            .map_err(|_| DomainError::queue(format!("Malformed receipt '{}'", delivery.receipt())))
    }
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, task: TaskEnvelope) -> Result<Uuid, DomainError> {
        let id = task.id;
        self.state.lock().await.pending.push_back(task);
        self.notify.notify_one();
        Ok(id)
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<TaskDelivery>, DomainError> {
        let deadline = Instant::now() + wait;

        loop {
            {
                let mut state = self.state.lock().await;
                if let Some(task) = state.pending.pop_front() {
                    let receipt = task.id.to_string();
                    state
                        .active
                        .insert(task.id, (task.clone(), Instant::now() + self.lease));
                    return Ok(Some(TaskDelivery::new(task, receipt)));
                }
            }

            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }

    async fn ack(&self, delivery: &TaskDelivery) -> Result<(), DomainError> {
        let id = Self::parse_receipt(delivery)?;
        if self.state.lock().await.active.remove(&id).is_none() {
            warn!(task_id = %id, "Ack for a delivery that is no longer active");
        }
        Ok(())
    }

    async fn retry(&self, delivery: &TaskDelivery, delay: Duration) -> Result<(), DomainError> {
        let id = Self::parse_receipt(delivery)?;
        let mut state = self.state.lock().await;

        match state.active.remove(&id) {
            Some((mut task, _)) => {
                task.retried += 1;
                state.scheduled.push((Instant::now() + delay, task));
            }
            None => warn!(task_id = %id, "Retry for a delivery that is no longer active"),
        }
        Ok(())
    }

    async fn archive(&self, delivery: &TaskDelivery, reason: &str) -> Result<(), DomainError> {
        let id = Self::parse_receipt(delivery)?;
        let mut state = self.state.lock().await;

        match state.active.remove(&id) {
            Some((task, _)) => state.dead.push((task, reason.to_string())),
            None => warn!(task_id = %id, "Archive for a delivery that is no longer active"),
        }
        Ok(())
    }

    async fn run_maintenance(&self) -> Result<MaintenanceReport, DomainError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let mut report = MaintenanceReport::default();

        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut state.scheduled)
            .into_iter()
            .partition(|(run_at, _)| *run_at <= now);
        state.scheduled = waiting;
        for (_, task) in due {
            state.pending.push_back(task);
            report.promoted += 1;
        }

        let expired: Vec<Uuid> = state
            .active
            .iter()
            .filter(|(_, (_, lease_until))| *lease_until <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some((task, _)) = state.active.remove(&id) {
                state.pending.push_back(task);
                report.recovered += 1;
            }
        }

        drop(state);
        for _ in 0..(report.promoted + report.recovered) {
            self.notify.notify_one();
        }

        Ok(report)
    }

    async fn stats(&self) -> Result<QueueStats, DomainError> {
        let state = self.state.lock().await;
        Ok(QueueStats {
            pending: state.pending.len(),
            active: state.active.len(),
            scheduled: state.scheduled.len(),
            dead: state.dead.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn task(n: u32) -> TaskEnvelope {
        TaskEnvelope::new("test:task", &json!({ "n": n })).unwrap()
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = InMemoryTaskQueue::default();
        let first = queue.enqueue(task(1)).await.unwrap();
        let second = queue.enqueue(task(2)).await.unwrap();

        let a = queue.dequeue(Duration::ZERO).await.unwrap().unwrap();
        let b = queue.dequeue(Duration::ZERO).await.unwrap().unwrap();

        assert_eq!(a.task.id, first);
        assert_eq!(b.task.id, second);
        assert!(queue.dequeue(Duration::ZERO).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dequeue_times_out_when_empty() {
        let queue = InMemoryTaskQueue::default();
        let result = queue.dequeue(Duration::from_secs(2)).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_dequeue_wakes_on_enqueue() {
        let queue = Arc::new(InMemoryTaskQueue::default());

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue(Duration::from_secs(5)).await })
        };

        tokio::task::yield_now().await;
        let id = queue.enqueue(task(1)).await.unwrap();

        let delivery = waiter.await.unwrap().unwrap().unwrap();
        assert_eq!(delivery.task.id, id);
    }

    #[tokio::test]
    async fn test_ack_removes_active() {
        let queue = InMemoryTaskQueue::default();
        queue.enqueue(task(1)).await.unwrap();

        let delivery = queue.dequeue(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(queue.stats().await.unwrap().active, 1);

        queue.ack(&delivery).await.unwrap();
        assert_eq!(queue.stats().await.unwrap(), QueueStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_is_scheduled_then_promoted() {
        let queue = InMemoryTaskQueue::default();
        queue.enqueue(task(1)).await.unwrap();

        let delivery = queue.dequeue(Duration::ZERO).await.unwrap().unwrap();
        queue.retry(&delivery, Duration::from_secs(10)).await.unwrap();

        let report = queue.run_maintenance().await.unwrap();
        assert_eq!(report.promoted, 0);
        assert_eq!(queue.stats().await.unwrap().scheduled, 1);

        tokio::time::advance(Duration::from_secs(11)).await;
        let report = queue.run_maintenance().await.unwrap();
        assert_eq!(report.promoted, 1);

        let redelivered = queue.dequeue(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(redelivered.task.id, delivery.task.id);
        assert_eq!(redelivered.task.retried, 1);
    }

    #[tokio::test]
    async fn test_archive_moves_to_dead() {
        let queue = InMemoryTaskQueue::default();
        queue.enqueue(task(1)).await.unwrap();

        let delivery = queue.dequeue(Duration::ZERO).await.unwrap().unwrap();
        queue.archive(&delivery, "bad payload").await.unwrap();

        let dead = queue.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].1, "bad payload");
        assert_eq!(queue.stats().await.unwrap().active, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_lease_is_recovered() {
        let queue = InMemoryTaskQueue::new(Duration::from_secs(30));
        let id = queue.enqueue(task(1)).await.unwrap();

        let stale = queue.dequeue(Duration::ZERO).await.unwrap().unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;

        let report = queue.run_maintenance().await.unwrap();
        assert_eq!(report.recovered, 1);

        let again = queue.dequeue(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(again.task.id, id);

        queue.ack(&again).await.unwrap();
        queue.ack(&stale).await.unwrap();
        assert_eq!(queue.stats().await.unwrap(), QueueStats::default());
    }

    #[tokio::test]
    async fn test_malformed_receipt() {
        let queue = InMemoryTaskQueue::default();
        let delivery = TaskDelivery::new(task(1), "not-a-uuid");
        assert!(queue.ack(&delivery).await.is_err());
    }
}
