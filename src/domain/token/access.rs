//! Access token claims and codec trait

use std::fmt::Debug;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Claims carried by a signed access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (principal identifier)
    pub sub: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: i64,
    /// Expiration timestamp (Unix epoch)
    pub exp: i64,
}

impl AccessTokenClaims {
    /// Create claims for a subject valid for `ttl` from now
    pub fn new(subject: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now().timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);

        Self {
            sub: subject.into(),
            iat: now,
            exp: now.saturating_add(ttl_secs),
        }
    }

    /// Principal identifier
    pub fn subject(&self) -> &str {
        &self.sub
    }
}

/// Access/refresh pair returned by login and refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Stateless signing and verification of short-lived access tokens
pub trait AccessTokenCodec: Send + Sync + Debug {
    /// Sign a token for `subject` valid for `ttl`. Fails only on signing backend errors.
    fn issue(&self, subject: &str, ttl: Duration) -> Result<String, DomainError>;

    /// Verify signature and expiry. `Invalid` on a bad signature or malformed token,
    /// `Expired` once the encoded expiry has passed.
    fn verify(&self, token: &str) -> Result<AccessTokenClaims, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_window() {
        let claims = AccessTokenClaims::new("user-1", Duration::from_secs(900));

        assert_eq!(claims.subject(), "user-1");
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_oversized_ttl_saturates() {
        let claims = AccessTokenClaims::new("user-1", Duration::MAX);
        assert_eq!(claims.exp, i64::MAX);
    }
}
