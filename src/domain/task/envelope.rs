//! Task envelope and delivery types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::domain::DomainError;

/// A job as stored in the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub id: Uuid,
    pub task_type: String,
    pub payload: serde_json::Value,
    /// Number of times this job has been handed back for retry
    #[serde(default)]
    pub retried: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl TaskEnvelope {
    /// Wrap a serializable payload. Only fails if the payload cannot be represented as JSON.
    pub fn new<P: Serialize>(
        task_type: impl Into<String>,
        payload: &P,
    ) -> Result<Self, DomainError> {
        let payload = serde_json::to_value(payload).map_err(|e| {
            DomainError::internal(format!("Failed to serialize task payload: {}", e))
        })?;

        Ok(Self {
            id: Uuid::new_v4(),
            task_type: task_type.into(),
            payload,
            retried: 0,
            enqueued_at: Utc::now(),
        })
    }

    /// Decode the payload into its typed form
    pub fn decode<P: DeserializeOwned>(&self) -> Result<P, serde_json::Error> {
        P::deserialize(&self.payload)
    }
}

/// A dequeued job held by exactly one worker until acked, retried or archived
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDelivery {
    pub task: TaskEnvelope,
    receipt: String,
}

impl TaskDelivery {
    /// `receipt` is the backend's handle for releasing this delivery
    pub fn new(task: TaskEnvelope, receipt: impl Into<String>) -> Self {
        Self {
            task,
            receipt: receipt.into(),
        }
    }

    pub fn receipt(&self) -> &str {
        &self.receipt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::SendVerificationEmailPayload;

    #[test]
    fn test_envelope_decode() {
        let payload = SendVerificationEmailPayload {
            user_id: Uuid::new_v4(),
            email: "reader@example.com".to_string(),
        };

        let envelope = TaskEnvelope::new("email", &payload).unwrap();
        assert_eq!(envelope.retried, 0);

        let decoded: SendVerificationEmailPayload = envelope.decode().unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let envelope = TaskEnvelope::new("email", &serde_json::json!({"unexpected": 1})).unwrap();
        assert!(envelope.decode::<SendVerificationEmailPayload>().is_err());
    }
}
