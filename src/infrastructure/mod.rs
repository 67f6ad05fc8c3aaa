//! Infrastructure layer - External service implementations

pub mod audit;
pub mod auth;
pub mod email;
pub mod kv;
pub mod logging;
pub mod observability;
pub mod rate_limit;
pub mod refresh_token;
pub mod services;
pub mod storage;
pub mod task;
pub mod user;
pub mod verification;
