//! Application state shared by handlers and middleware

use std::sync::Arc;

use crate::domain::kv::ExpiringStore;
use crate::domain::task::TaskQueue;
use crate::infrastructure::rate_limit::RateLimiter;
use crate::infrastructure::services::AuthService;

#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub rate_limiter: RateLimiter,
    /// Probed by the readiness check
    pub store: Arc<dyn ExpiringStore>,
    pub queue: Arc<dyn TaskQueue>,
    /// Honour `X-Forwarded-For` when resolving the client address
    pub trust_forwarded_headers: bool,
}

impl AppState {
    pub fn new(
        auth: AuthService,
        rate_limiter: RateLimiter,
        store: Arc<dyn ExpiringStore>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            auth,
            rate_limiter,
            store,
            queue,
            trust_forwarded_headers: false,
        }
    }

    pub fn with_trusted_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_forwarded_headers = trust;
        self
    }
}
