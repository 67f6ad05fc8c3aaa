//! Verification domain - durable one-shot email verification tokens

mod entity;
mod repository;

pub use entity::VerificationToken;
pub use repository::VerificationTokenRepository;
