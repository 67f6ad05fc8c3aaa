//! Handler for `task:send_verification_email`

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::email::{EmailMessage, EmailSender};
use crate::domain::task::{
    SendVerificationEmailPayload, TaskEnvelope, TaskError, TaskHandler,
    TASK_SEND_VERIFICATION_EMAIL,
};
use crate::domain::user::UserRepository;
use crate::infrastructure::observability::record_token_issued;
use crate::infrastructure::verification::VerificationService;

const SUBJECT: &str = "Verify your BookShare account";

fn verification_body(link: &str) -> String {
    format!(
        "<h1>Verify your email</h1>\
         <p>Click <a href=\"{}\">here</a> to verify your account.</p>\
         <p>If you did not request this, please ignore.</p>",
        link
    )
}

/// Issues a verification token and mails its link to the new account
pub struct SendVerificationEmailHandler {
    users: Arc<dyn UserRepository>,
    verification: VerificationService,
    sender: Arc<dyn EmailSender>,
}

impl std::fmt::Debug for SendVerificationEmailHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendVerificationEmailHandler")
            .field("verification", &self.verification)
            .finish_non_exhaustive()
    }
}

impl SendVerificationEmailHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        verification: VerificationService,
        sender: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            users,
            verification,
            sender,
        }
    }
}

#[async_trait]
impl TaskHandler for SendVerificationEmailHandler {
    fn task_type(&self) -> &'static str {
        TASK_SEND_VERIFICATION_EMAIL
    }

    async fn handle(&self, task: &TaskEnvelope) -> Result<(), TaskError> {
        let payload: SendVerificationEmailPayload = task
            .decode()
            .map_err(|e| TaskError::fatal(format!("invalid payload: {}", e)))?;

        let user = self
            .users
            .get(payload.user_id)
            .await
            .map_err(|e| TaskError::retryable(format!("failed to load user: {}", e)))?
            .ok_or_else(|| TaskError::fatal(format!("user {} not found", payload.user_id)))?;

        if user.is_verified() {
            info!(user_id = %payload.user_id, "User already verified, skipping email");
            return Ok(());
        }

        let token = self
            .verification
            .issue(payload.user_id)
            .await
            .map_err(|e| TaskError::retryable(format!("failed to issue token: {}", e)))?;
        record_token_issued("verification");

        let link = self.verification.verification_link(&token);
        let message = EmailMessage::new(&payload.email, SUBJECT, verification_body(&link));

        self.sender
            .send(&message)
            .await
            .map_err(|e| TaskError::retryable(format!("failed to send email: {}", e)))?;

        info!(user_id = %payload.user_id, "Verification email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::email::MockEmailSender;
    use crate::domain::user::User;
    use crate::domain::DomainError;
    use crate::infrastructure::email::RecordingEmailSender;
    use crate::infrastructure::user::InMemoryUserRepository;
    use crate::infrastructure::verification::{
        InMemoryVerificationTokenRepository, VerificationConfig,
    };
    use uuid::Uuid;

    struct Fixture {
        users: Arc<InMemoryUserRepository>,
        tokens: Arc<InMemoryVerificationTokenRepository>,
        verification: VerificationService,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(InMemoryUserRepository::new());
        let tokens = Arc::new(InMemoryVerificationTokenRepository::new());
        let verification = VerificationService::new(
            tokens.clone(),
            users.clone(),
            VerificationConfig::new("https://bookshare.test/"),
        );
        Fixture {
            users,
            tokens,
            verification,
        }
    }

    fn envelope(user_id: Uuid, email: &str) -> TaskEnvelope {
        TaskEnvelope::new(
            TASK_SEND_VERIFICATION_EMAIL,
            &SendVerificationEmailPayload {
                user_id,
                email: email.to_string(),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_sends_link_with_fresh_token() {
        let fx = fixture();
        let user = fx
            .users
            .create(User::new("reader@example.com", "hash"))
            .await
            .unwrap();
        let sender = RecordingEmailSender::new();
        let handler = SendVerificationEmailHandler::new(
            fx.users.clone(),
            fx.verification.clone(),
            Arc::new(sender.clone()),
        );

        handler
            .handle(&envelope(user.id(), "reader@example.com"))
            .await
            .unwrap();

        let tokens = fx.tokens.tokens_for(user.id()).await;
        assert_eq!(tokens.len(), 1);

        let sent = sender.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "reader@example.com");
        assert_eq!(sent[0].subject, SUBJECT);
        assert!(sent[0].body.contains(&format!(
            "https://bookshare.test/api/v1/verify?token={}&uid={}",
            tokens[0].token,
            user.id()
        )));
    }

    #[tokio::test]
    async fn test_bad_payload_is_fatal() {
        let fx = fixture();
        let handler = SendVerificationEmailHandler::new(
            fx.users.clone(),
            fx.verification.clone(),
            Arc::new(RecordingEmailSender::new()),
        );
        let task =
            TaskEnvelope::new(TASK_SEND_VERIFICATION_EMAIL, &serde_json::json!({"x": 1})).unwrap();

        let err = handler.handle(&task).await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_user_is_fatal() {
        let fx = fixture();
        let handler = SendVerificationEmailHandler::new(
            fx.users.clone(),
            fx.verification.clone(),
            Arc::new(RecordingEmailSender::new()),
        );

        let err = handler
            .handle(&envelope(Uuid::new_v4(), "ghost@example.com"))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_send_failure_is_retryable() {
        let fx = fixture();
        let user = fx
            .users
            .create(User::new("reader@example.com", "hash"))
            .await
            .unwrap();

        let mut sender = MockEmailSender::new();
        sender
            .expect_send()
            .times(1)
            .returning(|_| Err(DomainError::internal("connection refused")));

        let handler = SendVerificationEmailHandler::new(
            fx.users.clone(),
            fx.verification.clone(),
            Arc::new(sender),
        );

        let err = handler
            .handle(&envelope(user.id(), "reader@example.com"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_verified_user_is_skipped() {
        let fx = fixture();
        let user = fx
            .users
            .create(User::new("reader@example.com", "hash"))
            .await
            .unwrap();
        fx.users.set_verified(user.id()).await.unwrap();

        let sender = RecordingEmailSender::new();
        let handler = SendVerificationEmailHandler::new(
            fx.users.clone(),
            fx.verification.clone(),
            Arc::new(sender.clone()),
        );

        handler
            .handle(&envelope(user.id(), "reader@example.com"))
            .await
            .unwrap();
        assert!(sender.sent().await.is_empty());
        assert!(fx.tokens.tokens_for(user.id()).await.is_empty());
    }
}
