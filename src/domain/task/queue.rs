//! Durable queue trait definition

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::envelope::{TaskDelivery, TaskEnvelope};
use crate::domain::DomainError;

/// What one maintenance pass moved back into the pending list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Scheduled retries whose run-at time has passed
    pub promoted: usize,
    /// Active deliveries whose lease expired (crashed or stalled worker)
    pub recovered: usize,
}

/// Queue depth snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub active: usize,
    pub scheduled: usize,
    pub dead: usize,
}

/// At-least-once job broker
///
/// A delivered job is held by one worker at a time until it is acked, retried or
/// archived. Deliveries that are never released return to pending once their lease
/// expires.
#[async_trait]
pub trait TaskQueue: Send + Sync + Debug {
    /// Durably enqueue a job, returning its id
    async fn enqueue(&self, task: TaskEnvelope) -> Result<Uuid, DomainError>;

    /// Wait up to `wait` for the next pending job
    async fn dequeue(&self, wait: Duration) -> Result<Option<TaskDelivery>, DomainError>;

    /// Job finished; drop it
    async fn ack(&self, delivery: &TaskDelivery) -> Result<(), DomainError>;

    /// Release the job and schedule it again after `delay` with its retry counter bumped
    async fn retry(&self, delivery: &TaskDelivery, delay: Duration) -> Result<(), DomainError>;

    /// Release the job into the dead list
    async fn archive(&self, delivery: &TaskDelivery, reason: &str) -> Result<(), DomainError>;

    /// Promote due retries and recover expired leases
    async fn run_maintenance(&self) -> Result<MaintenanceReport, DomainError>;

    async fn stats(&self) -> Result<QueueStats, DomainError>;
}
