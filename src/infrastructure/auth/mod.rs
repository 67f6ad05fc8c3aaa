//! Authentication infrastructure module
//!
//! JWT access token codec and Argon2 password hashing.

mod jwt;
mod password;

pub use jwt::{JwtConfig, JwtService};
pub use password::{Argon2Hasher, PasswordHasher};
