//! API middleware components

pub mod auth;
pub mod client;
pub mod logging;
pub mod metrics;
pub mod rate_limit;

pub use auth::{auth_gate, extract_bearer_token, AuthenticatedPrincipal, RequireAdmin};
pub use client::{client_ip, RequestClient};
pub use logging::logging_middleware;
pub use self::metrics::metrics_middleware;
pub use rate_limit::rate_limit_middleware;
