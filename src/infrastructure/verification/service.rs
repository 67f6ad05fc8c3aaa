//! Verification token issuance and redemption

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::user::UserRepository;
use crate::domain::verification::{VerificationToken, VerificationTokenRepository};
use crate::domain::DomainError;

const TOKEN_BYTES: usize = 32;

/// Configuration for verification tokens and links
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    /// Lifetime of an issued token
    pub token_ttl: Duration,
    /// Public base URL the verification link points at
    pub base_url: String,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(30 * 60),
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl VerificationConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }
}

/// Issues durable one-shot tokens and redeems them against their owner
#[derive(Debug, Clone)]
pub struct VerificationService {
    tokens: Arc<dyn VerificationTokenRepository>,
    users: Arc<dyn UserRepository>,
    config: VerificationConfig,
}

impl VerificationService {
    pub fn new(
        tokens: Arc<dyn VerificationTokenRepository>,
        users: Arc<dyn UserRepository>,
        config: VerificationConfig,
    ) -> Self {
        Self {
            tokens,
            users,
            config,
        }
    }

    /// Persist a fresh random token for `user_id`. Earlier live tokens stay valid.
    pub async fn issue(&self, user_id: Uuid) -> Result<VerificationToken, DomainError> {
        let ttl = chrono::Duration::from_std(self.config.token_ttl)
            .map_err(|e| DomainError::configuration(format!("Invalid token TTL: {}", e)))?;

        let token = self
            .tokens
            .create(VerificationToken::new(user_id, generate_token(), ttl))
            .await?;

        info!(user_id = %user_id, expires_at = %token.expires_at, "Verification token issued");
        Ok(token)
    }

    /// Consume a token. `NotFound` when no row matches both token and user, `Expired`
    /// (after deleting the row) when it is past its expiry.
    pub async fn redeem(&self, token: &str, user_id: Uuid) -> Result<(), DomainError> {
        let Some(row) = self.tokens.find(token, user_id).await? else {
            return Err(DomainError::not_found("verification token not found"));
        };

        if row.is_expired() {
            self.tokens.delete(row.id).await?;
            warn!(user_id = %user_id, "Expired verification token redeemed");
            return Err(DomainError::expired("verification token expired"));
        }

        self.users.set_verified(user_id).await?;
        self.tokens.delete(row.id).await?;

        info!(user_id = %user_id, "Email verified");
        Ok(())
    }

    /// Link embedding the token and its owner
    pub fn verification_link(&self, token: &VerificationToken) -> String {
        format!(
            "{}/api/v1/verify?token={}&uid={}",
            self.config.base_url.trim_end_matches('/'),
            token.token,
            token.user_id
        )
    }
}

/// 256 random bits, base64url without padding (43 characters)
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
