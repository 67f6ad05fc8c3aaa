//! Outbound email implementations

mod smtp;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::email::{EmailMessage, EmailSender};
use crate::domain::DomainError;

pub use smtp::{SmtpConfig, SmtpEmailSender};

/// Which sender the worker uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailBackend {
    /// Log the message instead of delivering it
    #[default]
    Log,
    Smtp,
}

/// Local dev sender that logs the message instead of sending real email
#[derive(Debug, Clone, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), DomainError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "Email send stub"
        );
        Ok(())
    }
}

/// Keeps every message in memory; optionally fails the first `n` sends
#[derive(Debug, Clone, Default)]
pub struct RecordingEmailSender {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    failures_left: Arc<Mutex<u32>>,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` sends with an internal error
    pub fn failing(n: u32) -> Self {
        Self {
            failures_left: Arc::new(Mutex::new(n)),
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), DomainError> {
        {
            let mut failures = self.failures_left.lock().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(DomainError::internal("simulated delivery failure"));
            }
        }

        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

/// Builds the configured sender
pub fn create_email_sender(
    backend: EmailBackend,
    smtp: &SmtpConfig,
) -> Result<Arc<dyn EmailSender>, DomainError> {
    match backend {
        EmailBackend::Log => Ok(Arc::new(LogEmailSender)),
        EmailBackend::Smtp => Ok(Arc::new(SmtpEmailSender::new(smtp)?)),
    }
}
