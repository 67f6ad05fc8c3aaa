//! Email verification infrastructure

mod repository;
mod service;

pub use repository::{InMemoryVerificationTokenRepository, PostgresVerificationTokenRepository};
pub use service::{VerificationConfig, VerificationService};
