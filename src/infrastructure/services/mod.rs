//! Infrastructure services

mod auth_service;

pub use auth_service::{AuthConfig, AuthService, AuthServiceDeps, ClientInfo};
