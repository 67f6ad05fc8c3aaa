//! User domain
//!
//! User entities, validation and the repository trait backing registration,
//! login and verification.

mod entity;
mod repository;
mod validation;

pub use entity::{User, UserRole};
pub use repository::UserRepository;
pub use validation::{normalize_email, validate_email, validate_password, UserValidationError};
