//! Consumer side of the task pipeline - worker pool and queue maintenance

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::domain::task::{TaskDelivery, TaskError, TaskHandler, TaskQueue};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_task_processed;

/// Worker pool settings
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Number of concurrent workers
    pub concurrency: usize,
    /// Retryable failures beyond this count are archived
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// How long one dequeue waits before re-checking for shutdown
    pub poll_timeout: Duration,
    pub maintenance_interval: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_retries: 25,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(600),
            poll_timeout: Duration::from_secs(2),
            maintenance_interval: Duration::from_secs(5),
        }
    }
}

impl ProcessorConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    /// Clamp values that would stall the pool
    fn normalize(mut self) -> Self {
        self.concurrency = self.concurrency.max(1);
        self.poll_timeout = self.poll_timeout.max(Duration::from_millis(10));
        self.maintenance_interval = self.maintenance_interval.max(Duration::from_millis(100));
        self.backoff_max = self.backoff_max.max(self.backoff_base);
        self
    }
}

/// Exponential backoff, `min(base * 2^attempt, max)` plus up to 50% jitter
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    let capped = base.saturating_mul(factor).min(max);

    let jitter_range = capped.as_millis() as u64 / 2;
    if jitter_range > 0 {
        capped + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_range))
    } else {
        capped
    }
}

/// What happened to one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Retried,
    Archived,
}

impl TaskOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            TaskOutcome::Succeeded => "success",
            TaskOutcome::Retried => "retry",
            TaskOutcome::Archived => "archived",
        }
    }
}

/// Dispatches deliveries to the handler registered for their task type
pub struct TaskProcessor {
    queue: Arc<dyn TaskQueue>,
    handlers: HashMap<&'static str, Arc<dyn TaskHandler>>,
    config: ProcessorConfig,
}

impl std::fmt::Debug for TaskProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskProcessor")
            .field("queue", &self.queue)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

impl TaskProcessor {
    pub fn new(queue: Arc<dyn TaskQueue>, config: ProcessorConfig) -> Self {
        Self {
            queue,
            handlers: HashMap::new(),
            config: config.normalize(),
        }
    }

    /// Register a handler, replacing any previous one for the same task type
    pub fn register(mut self, handler: Arc<dyn TaskHandler>) -> Self {
        self.handlers.insert(handler.task_type(), handler);
        self
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Dequeue and settle at most one job. Returns whether a job was taken.
    pub async fn process_one(&self) -> Result<bool, DomainError> {
        match self.queue.dequeue(self.config.poll_timeout).await? {
            Some(delivery) => {
                self.execute(delivery).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Run the handler and ack, retry or archive the delivery
    pub async fn execute(&self, delivery: TaskDelivery) -> Result<TaskOutcome, DomainError> {
        let task = &delivery.task;

        let Some(handler) = self.handlers.get(task.task_type.as_str()) else {
            warn!(task_id = %task.id, task_type = %task.task_type, "No handler registered");
            self.queue
                .archive(&delivery, &format!("no handler for task type '{}'", task.task_type))
                .await?;
            record_task_processed(&task.task_type, TaskOutcome::Archived.as_str());
            return Ok(TaskOutcome::Archived);
        };

        let outcome = match handler.handle(task).await {
            Ok(()) => {
                self.queue.ack(&delivery).await?;
                debug!(task_id = %task.id, task_type = %task.task_type, "Task succeeded");
                TaskOutcome::Succeeded
            }
            Err(TaskError::Fatal(reason)) => {
                error!(
                    task_id = %task.id,
                    task_type = %task.task_type,
                    %reason,
                    "Task failed permanently"
                );
                self.queue.archive(&delivery, &reason).await?;
                TaskOutcome::Archived
            }
            Err(TaskError::Retryable(reason)) if task.retried >= self.config.max_retries => {
                error!(
                    task_id = %task.id,
                    task_type = %task.task_type,
                    retried = task.retried,
                    %reason,
                    "Task exhausted retries"
                );
                self.queue
                    .archive(&delivery, &format!("retries exhausted: {}", reason))
                    .await?;
                TaskOutcome::Archived
            }
            Err(TaskError::Retryable(reason)) => {
                let delay = backoff_delay(
                    task.retried,
                    self.config.backoff_base,
                    self.config.backoff_max,
                );
                warn!(
                    task_id = %task.id,
                    task_type = %task.task_type,
                    retried = task.retried,
                    delay_ms = delay.as_millis() as u64,
                    %reason,
                    "Task failed, scheduling retry"
                );
                self.queue.retry(&delivery, delay).await?;
                TaskOutcome::Retried
            }
        };

        record_task_processed(&task.task_type, outcome.as_str());
        Ok(outcome)
    }

    /// Run the worker pool and the maintenance loop until `shutdown` flips to true
    ///
    /// Shutdown only interrupts waiting for work. A handler already running finishes
    /// and its delivery is settled before the worker exits.
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        let mut workers = JoinSet::new();

        for worker_id in 0..self.config.concurrency {
            let processor = self.clone();
            let shutdown = shutdown.clone();
            workers.spawn(async move { processor.worker_loop(worker_id, shutdown).await });
        }

        {
            let processor = self.clone();
            let shutdown = shutdown.clone();
            workers.spawn(async move { processor.maintenance_loop(shutdown).await });
        }

        info!(
            concurrency = self.config.concurrency,
            handlers = self.handlers.len(),
            "Task processor started"
        );

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Task worker terminated abnormally");
            }
        }

        info!("Task processor stopped");
    }

    async fn worker_loop(&self, worker_id: usize, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                result = self.queue.dequeue(self.config.poll_timeout) => match result {
                    Ok(Some(delivery)) => {
                        if let Err(e) = self.execute(delivery).await {
                            error!(worker_id, error = %e, "Failed to settle task");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!(worker_id, error = %e, "Failed to dequeue task");
                        tokio::time::sleep(self.config.poll_timeout).await;
                    }
                },
            }
        }

        debug!(worker_id, "Task worker stopped");
    }

    async fn maintenance_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.maintenance_interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => match self.queue.run_maintenance().await {
                    Ok(report) if report.promoted > 0 || report.recovered > 0 => {
                        info!(
                            promoted = report.promoted,
                            recovered = report.recovered,
                            "Queue maintenance"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "Queue maintenance failed"),
                },
            }
        }
    }
}
