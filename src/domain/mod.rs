//! Domain layer - Core entities, value types and capability traits

pub mod audit;
pub mod email;
pub mod error;
pub mod kv;
pub mod rate_limit;
pub mod task;
pub mod token;
pub mod user;
pub mod verification;

pub use audit::{AuditEvent, AuditLogger};
pub use email::{EmailMessage, EmailSender};
pub use error::DomainError;
pub use kv::{CounterWindow, ExpiringStore};
pub use rate_limit::{RateLimitDecision, RateLimitRule, RateLimitRules};
pub use task::{
    MaintenanceReport, QueueStats, SendVerificationEmailPayload, TaskDelivery, TaskEnvelope,
    TaskError, TaskHandler, TaskQueue, TASK_SEND_VERIFICATION_EMAIL,
};
pub use token::{AccessTokenClaims, AccessTokenCodec, RefreshTokenStore, TokenPair};
pub use user::{User, UserRepository, UserRole};
pub use verification::{VerificationToken, VerificationTokenRepository};
