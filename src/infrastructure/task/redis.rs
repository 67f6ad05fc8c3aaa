//! Redis task queue implementation
//!
//! Layout, per queue name:
//!
//! - `tasks:<queue>:pending` list, LPUSH on enqueue, consumed from the right
//! - `tasks:<queue>:active` list of deliveries currently held by a worker
//! - `tasks:<queue>:leases` sorted set, active payload scored by lease deadline (ms)
//! - `tasks:<queue>:scheduled` sorted set, retries scored by run-at time (ms)
//! - `tasks:<queue>:dead` list of archived jobs
//!
//! Every state transition is a Lua script so a job is never in two lists at once.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{RedisResult, Script};
use serde_json::json;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::domain::task::{MaintenanceReport, QueueStats, TaskDelivery, TaskEnvelope, TaskQueue};
use crate::domain::DomainError;
use crate::infrastructure::kv::{connect_redis, RedisStoreConfig};

const DEQUEUE_SCRIPT: &str = r#"
local raw = redis.call('LMOVE', KEYS[1], KEYS[2], 'RIGHT', 'LEFT')
if raw then
    redis.call('ZADD', KEYS[3], ARGV[1], raw)
end
return raw
"#;

const ACK_SCRIPT: &str = r#"
local removed = redis.call('LREM', KEYS[1], 1, ARGV[1])
redis.call('ZREM', KEYS[2], ARGV[1])
return removed
"#;

const RETRY_SCRIPT: &str = r#"
local removed = redis.call('LREM', KEYS[1], 1, ARGV[1])
redis.call('ZREM', KEYS[2], ARGV[1])
if removed > 0 then
    redis.call('ZADD', KEYS[3], ARGV[3], ARGV[2])
end
return removed
"#;

const ARCHIVE_SCRIPT: &str = r#"
local removed = redis.call('LREM', KEYS[1], 1, ARGV[1])
redis.call('ZREM', KEYS[2], ARGV[1])
if removed > 0 then
    redis.call('LPUSH', KEYS[3], ARGV[2])
end
return removed
"#;

const MAINTENANCE_SCRIPT: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
for _, raw in ipairs(due) do
    redis.call('ZREM', KEYS[1], raw)
    redis.call('LPUSH', KEYS[2], raw)
end
local expired = redis.call('ZRANGEBYSCORE', KEYS[4], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
local recovered = 0
for _, raw in ipairs(expired) do
    redis.call('ZREM', KEYS[4], raw)
    if redis.call('LREM', KEYS[3], 1, raw) > 0 then
        redis.call('LPUSH', KEYS[2], raw)
        recovered = recovered + 1
    end
end
return {#due, recovered}
"#;

/// Configuration for the Redis task queue
#[derive(Debug, Clone)]
pub struct RedisTaskQueueConfig {
    pub redis: RedisStoreConfig,
    pub queue_name: String,
    /// How long a delivery may stay unacknowledged before it is redelivered
    pub lease: Duration,
    /// Sleep between empty polls while waiting in `dequeue`
    pub poll_interval: Duration,
    /// Upper bound on jobs moved per maintenance pass and per set
    pub maintenance_batch: usize,
}

impl Default for RedisTaskQueueConfig {
    fn default() -> Self {
        Self {
            redis: RedisStoreConfig::default(),
            queue_name: "default".to_string(),
            lease: Duration::from_secs(300),
            poll_interval: Duration::from_millis(200),
            maintenance_batch: 100,
        }
    }
}

struct QueueKeys {
    pending: String,
    active: String,
    leases: String,
    scheduled: String,
    dead: String,
}

impl QueueKeys {
    fn new(prefix: Option<&str>, queue: &str) -> Self {
        let base = match prefix {
            Some(prefix) => format!("{}:tasks:{}", prefix, queue),
            None => format!("tasks:{}", queue),
        };

        Self {
            pending: format!("{}:pending", base),
            active: format!("{}:active", base),
            leases: format!("{}:leases", base),
            scheduled: format!("{}:scheduled", base),
            dead: format!("{}:dead", base),
        }
    }
}

struct QueueScripts {
    dequeue: Script,
    ack: Script,
    retry: Script,
    archive: Script,
    maintenance: Script,
}

impl QueueScripts {
    fn new() -> Self {
        Self {
            dequeue: Script::new(DEQUEUE_SCRIPT),
            ack: Script::new(ACK_SCRIPT),
            retry: Script::new(RETRY_SCRIPT),
            archive: Script::new(ARCHIVE_SCRIPT),
            maintenance: Script::new(MAINTENANCE_SCRIPT),
        }
    }
}

/// Durable at-least-once queue on Redis lists and sorted sets
///
/// The delivery receipt is the exact JSON stored in the active list.
pub struct RedisTaskQueue {
    connection: ConnectionManager,
    config: RedisTaskQueueConfig,
    keys: QueueKeys,
    scripts: QueueScripts,
}

impl fmt::Debug for RedisTaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisTaskQueue")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisTaskQueue {
    pub async fn new(config: RedisTaskQueueConfig) -> Result<Self, DomainError> {
        let connection = connect_redis(&config.redis).await.map_err(|e| {
            DomainError::queue(format!("Failed to connect task queue: {}", e))
        })?;
        Ok(Self::with_connection(connection, config))
    }

    pub fn with_connection(connection: ConnectionManager, config: RedisTaskQueueConfig) -> Self {
        let keys = QueueKeys::new(config.redis.key_prefix.as_deref(), &config.queue_name);
        Self {
            connection,
            config,
            keys,
            scripts: QueueScripts::new(),
        }
    }

    async fn bounded<T, F>(&self, op: &str, fut: F) -> Result<T, DomainError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.config.redis.command_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(DomainError::queue(format!(
                "Failed to {} on queue '{}': {}",
                op, self.config.queue_name, e
            ))),
            Err(_) => Err(DomainError::queue(format!(
                "Timed out after {:?} trying to {} on queue '{}'",
                self.config.redis.command_timeout, op, self.config.queue_name
            ))),
        }
    }

    fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn millis_after(delay: Duration) -> i64 {
        let delay = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        Self::now_millis().saturating_add(delay)
    }

    fn encode(task: &TaskEnvelope) -> Result<String, DomainError> {
        serde_json::to_string(task)
            .map_err(|e| DomainError::queue(format!("Failed to serialize task: {}", e)))
    }

    fn dead_record(raw: &str, reason: &str) -> String {
        let task = serde_json::from_str::<serde_json::Value>(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));

        json!({
            "task": task,
            "reason": reason,
            "archived_at": Utc::now(),
        })
        .to_string()
    }

    async fn try_dequeue(&self) -> Result<Option<String>, DomainError> {
        let mut conn = self.connection.clone();
        let lease_until = Self::millis_after(self.config.lease);

        let mut invocation = self.scripts.dequeue.prepare_invoke();
        invocation
            .key(&self.keys.pending)
            .key(&self.keys.active)
            .key(&self.keys.leases)
            .arg(lease_until);

        self.bounded("dequeue", invocation.invoke_async(&mut conn))
            .await
    }

    async fn archive_raw(&self, raw: &str, reason: &str) -> Result<bool, DomainError> {
        let mut conn = self.connection.clone();

        let mut invocation = self.scripts.archive.prepare_invoke();
        invocation
            .key(&self.keys.active)
            .key(&self.keys.leases)
            .key(&self.keys.dead)
            .arg(raw)
            .arg(Self::dead_record(raw, reason));

        let removed: i64 = self
            .bounded("archive", invocation.invoke_async(&mut conn))
            .await?;
        Ok(removed > 0)
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn enqueue(&self, task: TaskEnvelope) -> Result<Uuid, DomainError> {
        let id = task.id;
        let raw = Self::encode(&task)?;
        let mut conn = self.connection.clone();

        let _: i64 = self
            .bounded(
                "enqueue",
                redis::cmd("LPUSH")
                    .arg(&self.keys.pending)
                    .arg(raw)
                    .query_async(&mut conn),
            )
            .await?;

        debug!(task_id = %id, task_type = %task.task_type, "Enqueued task");
        Ok(id)
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<TaskDelivery>, DomainError> {
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            if let Some(raw) = self.try_dequeue().await? {
                match serde_json::from_str::<TaskEnvelope>(&raw) {
                    Ok(task) => return Ok(Some(TaskDelivery::new(task, raw))),
                    Err(e) => {
                        error!(error = %e, "Undecodable task moved to dead list");
                        self.archive_raw(&raw, &format!("undecodable task: {}", e))
                            .await?;
                        continue;
                    }
                }
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }

    async fn ack(&self, delivery: &TaskDelivery) -> Result<(), DomainError> {
        let mut conn = self.connection.clone();

        let mut invocation = self.scripts.ack.prepare_invoke();
        invocation
            .key(&self.keys.active)
            .key(&self.keys.leases)
            .arg(delivery.receipt());

        let removed: i64 = self.bounded("ack", invocation.invoke_async(&mut conn)).await?;
        if removed == 0 {
            warn!(task_id = %delivery.task.id, "Ack for a delivery that is no longer active");
        }
        Ok(())
    }

    async fn retry(&self, delivery: &TaskDelivery, delay: Duration) -> Result<(), DomainError> {
        let mut next = delivery.task.clone();
        next.retried += 1;
        let raw = Self::encode(&next)?;
        let mut conn = self.connection.clone();

        let mut invocation = self.scripts.retry.prepare_invoke();
        invocation
            .key(&self.keys.active)
            .key(&self.keys.leases)
            .key(&self.keys.scheduled)
            .arg(delivery.receipt())
            .arg(raw)
            .arg(Self::millis_after(delay));

        let removed: i64 = self
            .bounded("retry", invocation.invoke_async(&mut conn))
            .await?;
        if removed == 0 {
            warn!(task_id = %delivery.task.id, "Retry for a delivery that is no longer active");
        }
        Ok(())
    }

    async fn archive(&self, delivery: &TaskDelivery, reason: &str) -> Result<(), DomainError> {
        if !self.archive_raw(delivery.receipt(), reason).await? {
            warn!(task_id = %delivery.task.id, "Archive for a delivery that is no longer active");
        }
        Ok(())
    }

    async fn run_maintenance(&self) -> Result<MaintenanceReport, DomainError> {
        let mut conn = self.connection.clone();

        let mut invocation = self.scripts.maintenance.prepare_invoke();
        invocation
            .key(&self.keys.scheduled)
            .key(&self.keys.pending)
            .key(&self.keys.active)
            .key(&self.keys.leases)
            .arg(Self::now_millis())
            .arg(self.config.maintenance_batch);

        let (promoted, recovered): (usize, usize) = self
            .bounded("run maintenance", invocation.invoke_async(&mut conn))
            .await?;

        Ok(MaintenanceReport {
            promoted,
            recovered,
        })
    }

    async fn stats(&self) -> Result<QueueStats, DomainError> {
        let mut conn = self.connection.clone();

        let (pending, active, scheduled, dead): (usize, usize, usize, usize) = self
            .bounded(
                "read stats",
                redis::pipe()
                    .cmd("LLEN")
                    .arg(&self.keys.pending)
                    .cmd("LLEN")
                    .arg(&self.keys.active)
                    .cmd("ZCARD")
                    .arg(&self.keys.scheduled)
                    .cmd("LLEN")
                    .arg(&self.keys.dead)
                    .query_async(&mut conn),
            )
            .await?;

        Ok(QueueStats {
            pending,
            active,
            scheduled,
            dead,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_keys() {
        let keys = QueueKeys::new(None, "default");
        assert_eq!(keys.pending, "tasks:default:pending");
        assert_eq!(keys.leases, "tasks:default:leases");

        let keys = QueueKeys::new(Some("bookshare"), "mail");
        assert_eq!(keys.dead, "bookshare:tasks:mail:dead");
    }

    #[test]
    fn test_dead_record_keeps_undecodable_raw() {
        let record: serde_json::Value =
            serde_json::from_str(&RedisTaskQueue::dead_record("{not json", "undecodable")).unwrap();
        assert_eq!(record["task"], "{not json");
        assert_eq!(record["reason"], "undecodable");
    }

    fn unique_config() -> RedisTaskQueueConfig {
        RedisTaskQueueConfig {
            redis: RedisStoreConfig::default().with_key_prefix(format!("test:{}", Uuid::new_v4())),
            lease: Duration::from_secs(1),
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        }
    }

    fn task() -> TaskEnvelope {
        TaskEnvelope::new("test:task", &json!({ "n": 1 })).unwrap()
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_enqueue_dequeue_ack() {
        let queue = RedisTaskQueue::new(unique_config()).await.unwrap();
        let id = queue.enqueue(task()).await.unwrap();

        let delivery = queue
            .dequeue(Duration::from_millis(100))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivery.task.id, id);
        assert_eq!(queue.stats().await.unwrap().active, 1);

        queue.ack(&delivery).await.unwrap();
        assert_eq!(queue.stats().await.unwrap(), QueueStats::default());
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_retry_and_promote() {
        let queue = RedisTaskQueue::new(unique_config()).await.unwrap();
        queue.enqueue(task()).await.unwrap();

        let delivery = queue.dequeue(Duration::ZERO).await.unwrap().unwrap();
        queue.retry(&delivery, Duration::ZERO).await.unwrap();

        let report = queue.run_maintenance().await.unwrap();
        assert_eq!(report.promoted, 1);

        let again = queue.dequeue(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(again.task.retried, 1);
        queue.archive(&again, "giving up").await.unwrap();
        assert_eq!(queue.stats().await.unwrap().dead, 1);
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_lease_recovery() {
        let queue = RedisTaskQueue::new(unique_config()).await.unwrap();
        let id = queue.enqueue(task()).await.unwrap();

        let _abandoned = queue.dequeue(Duration::ZERO).await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let report = queue.run_maintenance().await.unwrap();
        assert_eq!(report.recovered, 1);

        let again = queue.dequeue(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(again.task.id, id);
    }
}
