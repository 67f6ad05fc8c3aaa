//! Rate limit domain - per-route fixed-window rules and admission decisions
//!
//! The window is fixed, not sliding: a counter key lives for exactly one window from its
//! first increment, so a burst straddling a boundary can admit up to twice the limit.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Limit applied to one route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Requests admitted per window
    pub limit: u32,
    /// Window length
    #[serde(rename = "window_secs", with = "window_secs")]
    pub window: Duration,
}

impl RateLimitRule {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }
}

/// Static route identifier to rule mapping, built once at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitRules {
    rules: HashMap<String, RateLimitRule>,
}

impl RateLimitRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style rule registration
    pub fn with_rule(mut self, route: impl Into<String>, rule: RateLimitRule) -> Self {
        self.rules.insert(route.into(), rule);
        self
    }

    /// Rule for a route, `None` when the route is not rate limited
    pub fn get(&self, route: &str) -> Option<&RateLimitRule> {
        self.rules.get(route)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<(String, RateLimitRule)> for RateLimitRules {
    fn from_iter<T: IntoIterator<Item = (String, RateLimitRule)>>(iter: T) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

/// Outcome of one admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub limit: u32,
    /// `limit - count`; negative once the window is exhausted
    pub remaining: i64,
    /// Absolute time the current window ends
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    pub fn from_count(limit: u32, count: i64, reset_at: DateTime<Utc>) -> Self {
        Self {
            limit,
            remaining: i64::from(limit) - count,
            reset_at,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.remaining >= 0
    }

    /// Remaining count for response metadata, never below zero
    pub fn remaining_for_display(&self) -> u64 {
        u64::try_from(self.remaining).unwrap_or(0)
    }
}

mod window_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(window: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(window.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
