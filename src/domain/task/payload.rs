use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task type for sending the email verification link after registration
pub const TASK_SEND_VERIFICATION_EMAIL: &str = "task:send_verification_email";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendVerificationEmailPayload {
    pub user_id: Uuid,
    pub email: String,
}
