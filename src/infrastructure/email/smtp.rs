//! SMTP sender using lettre

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::domain::email::{EmailMessage, EmailSender};
use crate::domain::DomainError;

/// SMTP connection settings
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sender address, e.g. `BookShare <noreply@bookshare.local>`
    pub from: String,
    /// Upgrade the connection with STARTTLS
    pub starttls: bool,
    pub timeout: Duration,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[hidden]"))
            .field("from", &self.from)
            .field("starttls", &self.starttls)
            .finish()
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1025,
            username: None,
            password: None,
            from: "BookShare <noreply@bookshare.local>".to_string(),
            starttls: false,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Sends HTML email through an SMTP relay
#[derive(Clone)]
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl fmt::Debug for SmtpEmailSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpEmailSender")
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

impl SmtpEmailSender {
    pub fn new(config: &SmtpConfig) -> Result<Self, DomainError> {
        let from: Mailbox = config.from.parse().map_err(|e| {
            DomainError::configuration(format!("Invalid sender address '{}': {}", config.from, e))
        })?;

        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host).map_err(|e| {
                DomainError::configuration(format!("Invalid SMTP relay '{}': {}", config.host, e))
            })?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        builder = builder.port(config.port).timeout(Some(config.timeout));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

fn build_message(from: &Mailbox, message: &EmailMessage) -> Result<Message, DomainError> {
    let to: Mailbox = message
        .to
        .parse()
        .map_err(|e| DomainError::invalid(format!("Invalid recipient '{}': {}", message.to, e)))?;

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(message.subject.as_str())
        .header(ContentType::TEXT_HTML)
        .body(message.body.clone())
        .map_err(|e| DomainError::internal(format!("Failed to build email: {}", e)))
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), DomainError> {
        let email = build_message(&self.from, message)?;

        self.transport
            .send(email)
            .await
            .map_err(|e| DomainError::internal(format!("SMTP delivery failed: {}", e)))?;

        info!(to = %message.to, subject = %message.subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_sender() {
        let config = SmtpConfig {
            from: "not an address".to_string(),
            ..Default::default()
        };

        assert!(matches!(
            SmtpEmailSender::new(&config),
            Err(DomainError::Configuration { .. })
        ));
    }

    fn sender_mailbox() -> Mailbox {
        SmtpConfig::default().from.parse().unwrap()
    }

    #[test]
    fn test_build_html_message() {
        let message = EmailMessage::new("reader@example.com", "Hello", "<p>hi</p>");

        let built = build_message(&sender_mailbox(), &message).unwrap();
        let raw = String::from_utf8(built.formatted()).unwrap();

        assert!(raw.contains("Subject: Hello"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn test_rejects_bad_recipient() {
        let message = EmailMessage::new("nope", "Hello", "body");

        assert!(matches!(
            build_message(&sender_mailbox(), &message),
            Err(DomainError::Invalid { .. })
        ));
    }

    #[tokio::test]
    async fn test_sender_builds_inside_runtime() {
        assert!(SmtpEmailSender::new(&SmtpConfig::default()).is_ok());
    }

    #[test]
    fn test_debug_hides_password() {
        let config = SmtpConfig {
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
