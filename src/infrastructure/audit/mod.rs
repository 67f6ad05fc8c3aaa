//! Audit logger implementations

use std::sync::{Arc, Mutex};

use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::audit::{AuditEvent, AuditLogger};

/// Emits audit events as structured log lines
#[derive(Debug, Clone, Default)]
pub struct TracingAuditLogger;

impl AuditLogger for TracingAuditLogger {
    fn log(&self, event: AuditEvent) {
        info!(
            target: "audit",
            actor = ?event.actor,
            action = %event.action,
            metadata = %event.metadata,
            "Audit event"
        );
    }
}

/// Inserts audit events into `audit_logs` on a background task
#[derive(Debug, Clone)]
pub struct PostgresAuditLogger {
    pool: PgPool,
}

impl PostgresAuditLogger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl AuditLogger for PostgresAuditLogger {
    fn log(&self, event: AuditEvent) {
        let pool = self.pool.clone();

        tokio::spawn(async move {
            let result = sqlx::query(
                r#"
                INSERT INTO audit_logs (id, user_id, action, metadata, created_at)
                VALUES ($1, $2, $3, $4, NOW())
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(event.actor)
            .bind(&event.action)
            .bind(&event.metadata)
            .execute(&pool)
            .await;

            if let Err(e) = result {
                error!(action = %event.action, error = %e, "Failed to write audit log");
            }
        });
    }
}

/// Keeps events in memory so callers can assert on them
#[derive(Debug, Clone, Default)]
pub struct RecordingAuditLogger {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl RecordingAuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn actions(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.action).collect()
    }
}

impl AuditLogger for RecordingAuditLogger {
    fn log(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recording_logger() {
        let logger = RecordingAuditLogger::new();
        let actor = Uuid::new_v4();

        logger.log(AuditEvent::new(Some(actor), "login_success", json!({"ip": "1.2.3.4"})));

        let events = logger.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor, Some(actor));
        assert_eq!(events[0].metadata["ip"], "1.2.3.4");
        assert_eq!(logger.actions(), vec!["login_success".to_string()]);
    }

    #[test]
    fn test_tracing_logger_does_not_panic() {
        TracingAuditLogger.log(AuditEvent::new(None, "logout", json!({})));
    }
}
