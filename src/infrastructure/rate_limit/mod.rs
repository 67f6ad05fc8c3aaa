//! Fixed-window rate limiter over the shared expiring store

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error};

use crate::domain::kv::{keys, ExpiringStore};
use crate::domain::rate_limit::{RateLimitDecision, RateLimitRules};
use crate::domain::DomainError;

/// Per-route, per-principal admission control
///
/// Counters are never reset explicitly; a window ends when its key expires and the next
/// request starts a fresh one. Store failures are returned to the caller, which must
/// reject the request rather than admit it unmetered.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn ExpiringStore>,
    rules: Arc<RateLimitRules>,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    pub fn new(store: Arc<dyn ExpiringStore>, rules: RateLimitRules) -> Self {
        Self {
            store,
            rules: Arc::new(rules),
        }
    }

    pub fn rules(&self) -> &RateLimitRules {
        &self.rules
    }

    /// Count one request. `None` when the route has no rule (unconditionally allowed).
    pub async fn check(
        &self,
        route: &str,
        principal: &str,
    ) -> Result<Option<RateLimitDecision>, DomainError> {
        let Some(rule) = self.rules.get(route) else {
            return Ok(None);
        };

        let key = keys::rate_limit_key(route, principal);
        let window = self
            .store
            .increment_window(&key, rule.window)
            .await
            .inspect_err(|e| error!(route = %route, error = %e, "Rate limiter store failure"))?;

        let reset_at = Utc::now()
            + chrono::Duration::from_std(window.ttl_remaining)
                .unwrap_or_else(|_| chrono::Duration::zero());
        let decision = RateLimitDecision::from_count(rule.limit, window.count, reset_at);

        debug!(
            route = %route,
            principal = %principal,
            count = window.count,
            remaining = decision.remaining,
            "Rate limit checked"
        );

        Ok(Some(decision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::kv::MockExpiringStore;
    use crate::domain::rate_limit::RateLimitRule;
    use crate::infrastructure::kv::InMemoryExpiringStore;
    use std::time::Duration;

    const LOGIN: &str = "/api/v1/login";

    fn create_limiter() -> RateLimiter {
        let rules = RateLimitRules::new().with_rule(LOGIN, RateLimitRule::per_minute(5));
        RateLimiter::new(Arc::new(InMemoryExpiringStore::new()), rules)
    }

    #[tokio::test(start_paused = true)]
    async fn test_sixth_request_rejected() {
        let limiter = create_limiter();

        for expected_remaining in (0..5).rev() {
            let decision = limiter.check(LOGIN, "1.2.3.4").await.unwrap().unwrap();
            assert!(decision.is_allowed());
            assert_eq!(decision.remaining, expected_remaining);
            assert_eq!(decision.limit, 5);
        }

        let sixth = limiter.check(LOGIN, "1.2.3.4").await.unwrap().unwrap();
        assert!(!sixth.is_allowed());
        assert_eq!(sixth.remaining, -1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_restarts_after_expiry() {
        let limiter = create_limiter();

        for _ in 0..6 {
            limiter.check(LOGIN, "1.2.3.4").await.unwrap();
        }

        tokio::time::advance(Duration::from_secs(60)).await;

        let decision = limiter.check(LOGIN, "1.2.3.4").await.unwrap().unwrap();
        assert!(decision.is_allowed());
        // Counter restarted at 1
        assert_eq!(decision.remaining, 4);
    }

    #[tokio::test]
    async fn test_principals_are_independent() {
        let limiter = create_limiter();

        for _ in 0..6 {
            limiter.check(LOGIN, "1.2.3.4").await.unwrap();
        }

        let other = limiter.check(LOGIN, "5.6.7.8").await.unwrap().unwrap();
        assert_eq!(other.remaining, 4);
    }

    #[tokio::test]
    async fn test_unruled_route_is_allowed() {
        let mut mock = MockExpiringStore::new();
        mock.expect_increment_window().never();

        let limiter = RateLimiter::new(Arc::new(mock), RateLimitRules::new());
        assert!(limiter.check("/api/v1/books", "p").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let mut mock = MockExpiringStore::new();
        mock.expect_increment_window()
            .returning(|_, _| Err(DomainError::store("timed out")));

        let rules = RateLimitRules::new().with_rule(LOGIN, RateLimitRule::per_minute(5));
        let limiter = RateLimiter::new(Arc::new(mock), rules);

        let result = limiter.check(LOGIN, "p").await;
        assert!(result.unwrap_err().is_internal());
    }

    #[tokio::test]
    async fn test_reset_time_reflects_remaining_ttl() {
        let limiter = create_limiter();
        let before = Utc::now();

        let decision = limiter.check(LOGIN, "p").await.unwrap().unwrap();
        let until_reset = decision.reset_at - before;

        assert!(until_reset <= chrono::Duration::seconds(61));
        assert!(until_reset >= chrono::Duration::seconds(59));
    }

    #[tokio::test]
    async fn test_concurrent_checks_count_exactly() {
        let rules = RateLimitRules::new().with_rule(LOGIN, RateLimitRule::per_minute(1000));
        let store = Arc::new(InMemoryExpiringStore::new());
        let limiter = RateLimiter::new(store.clone(), rules);

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check(LOGIN, "p").await.unwrap() })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        let counter = store
            .get(&keys::rate_limit_key(LOGIN, "p"))
            .await
            .unwrap();
        assert_eq!(counter, Some("100".to_string()));
    }
}
