//! Audit trail capability

use std::fmt::Debug;

use serde::Serialize;
use uuid::Uuid;

/// Well-known audit actions
pub mod actions {
    pub const REGISTRATION_SUCCESS: &str = "registration_success";
    pub const LOGIN_SUCCESS: &str = "login_success";
    pub const LOGIN_FAILED: &str = "login_failed";
    pub const TOKEN_REFRESHED: &str = "token_refreshed";
    pub const LOGOUT: &str = "logout";
    pub const EMAIL_VERIFIED: &str = "email_verified";
}

/// One audit record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub actor: Option<Uuid>,
    pub action: String,
    pub metadata: serde_json::Value,
}

impl AuditEvent {
    pub fn new(
        actor: Option<Uuid>,
        action: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            actor,
            action: action.into(),
            metadata,
        }
    }
}

/// Fire-and-forget audit sink. Implementations never block the caller on I/O and
/// never report failures back; they log them instead.
pub trait AuditLogger: Send + Sync + Debug {
    fn log(&self, event: AuditEvent);
}
