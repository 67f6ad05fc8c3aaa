//! Account and session orchestration
//!
//! Composes the user repository, password hasher, access-token codec, refresh-token
//! store, task distributor and verification service into the register, login,
//! refresh, logout and verify flows.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::audit::{actions, AuditEvent, AuditLogger};
use crate::domain::task::SendVerificationEmailPayload;
use crate::domain::token::{AccessTokenCodec, RefreshTokenStore, TokenPair};
use crate::domain::user::{
    normalize_email, validate_email, validate_password, User, UserRepository,
};
use crate::domain::DomainError;
use crate::infrastructure::auth::PasswordHasher;
use crate::infrastructure::observability::record_token_issued;
use crate::infrastructure::task::TaskDistributor;
use crate::infrastructure::verification::VerificationService;

const INVALID_CREDENTIALS: &str = "invalid email or password";

/// Session lifetimes and login policy
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Refuse tokens to accounts that have not confirmed their email
    pub require_verified_email: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(24 * 60 * 60),
            require_verified_email: true,
        }
    }
}

/// Caller metadata recorded in the audit trail
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    fn audit_metadata(&self) -> serde_json::Value {
        json!({
            "ip": self.ip,
            "user_agent": self.user_agent,
        })
    }
}

/// Dependencies for [`AuthService`]
pub struct AuthServiceDeps {
    pub users: Arc<dyn UserRepository>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub codec: Arc<dyn AccessTokenCodec>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub distributor: TaskDistributor,
    pub verification: VerificationService,
    pub audit: Arc<dyn AuditLogger>,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
    codec: Arc<dyn AccessTokenCodec>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    distributor: TaskDistributor,
    verification: VerificationService,
    audit: Arc<dyn AuditLogger>,
    config: AuthConfig,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("users", &self.users)
            .field("codec", &self.codec)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(deps: AuthServiceDeps, config: AuthConfig) -> Self {
        Self {
            users: deps.users,
            hasher: deps.hasher,
            codec: deps.codec,
            refresh_tokens: deps.refresh_tokens,
            distributor: deps.distributor,
            verification: deps.verification,
            audit: deps.audit,
            config,
        }
    }

    pub fn codec(&self) -> &Arc<dyn AccessTokenCodec> {
        &self.codec
    }

    /// Create an unverified account and queue its verification email
    ///
    /// Fails with `Internal` if the email job cannot be enqueued; the account row is
    /// kept and the client is told registration failed.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<User, DomainError> {
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(password)?;

        let password_hash = self.hasher.hash(password)?;
        let user = self.users.create(User::new(&email, password_hash)).await?;

        let payload = SendVerificationEmailPayload {
            user_id: user.id(),
            email: user.email().to_string(),
        };
        if let Err(e) = self.distributor.distribute_verification_email(&payload).await {
            error!(user_id = %user.id(), error = %e, "Failed to enqueue verification email");
            return Err(DomainError::internal("failed to schedule verification email"));
        }

        self.audit.log(AuditEvent::new(
            Some(user.id()),
            actions::REGISTRATION_SUCCESS,
            client.audit_metadata(),
        ));

        info!(user_id = %user.id(), "User registered");
        Ok(user)
    }

    /// Check credentials and mint a token pair. Rejections write nothing to the store.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<TokenPair, DomainError> {
        let email = normalize_email(email);

        let user = match self.users.get_by_email(&email).await? {
            Some(user) if self.hasher.verify(password, user.password_hash()) => user,
            found => {
                self.audit.log(AuditEvent::new(
                    found.map(|u| u.id()),
                    actions::LOGIN_FAILED,
                    client.audit_metadata(),
                ));
                return Err(DomainError::unauthorized(INVALID_CREDENTIALS));
            }
        };

        if self.config.require_verified_email && !user.is_verified() {
            warn!(user_id = %user.id(), "Login refused for unverified account");
            return Err(DomainError::unauthorized("user is not verified"));
        }

        let principal = user.id().to_string();
        let pair = self.issue_pair(&principal).await?;

        self.audit.log(AuditEvent::new(
            Some(user.id()),
            actions::LOGIN_SUCCESS,
            client.audit_metadata(),
        ));

        info!(user_id = %user.id(), "User logged in");
        Ok(pair)
    }

    /// Rotate a refresh token: verify, delete, reissue, then mint a new access token
    ///
    /// After a successful verify, a failure to delete or reissue is `Internal` and is
    /// not retried; the client has to log in again.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, DomainError> {
        if refresh_token.trim().is_empty() {
            return Err(DomainError::invalid("refresh_token is required"));
        }

        let principal = match self.refresh_tokens.verify(refresh_token).await {
            Ok(principal) => principal,
            Err(DomainError::NotFound { .. }) => {
                return Err(DomainError::unauthorized("invalid refresh token"));
            }
            Err(e) => return Err(e),
        };

        self.refresh_tokens
            .delete(refresh_token)
            .await
            .map_err(|e| {
                error!(
                    principal = %principal,
                    error = %e,
                    "Failed to revoke refresh token during rotation"
                );
                DomainError::internal("failed to rotate refresh token")
            })?;

        let pair = self.issue_pair(&principal).await?;

        self.audit.log(AuditEvent::new(
            Uuid::parse_str(&principal).ok(),
            actions::TOKEN_REFRESHED,
            json!({}),
        ));

        Ok(pair)
    }

    /// Revoke a refresh token. Revoking an unknown token succeeds.
    pub async fn logout(&self, principal: Uuid, refresh_token: &str) -> Result<(), DomainError> {
        if refresh_token.trim().is_empty() {
            return Err(DomainError::invalid("refresh_token is required"));
        }

        self.refresh_tokens.delete(refresh_token).await.map_err(|e| {
            error!(user_id = %principal, error = %e, "Failed to revoke refresh token");
            DomainError::internal("failed to revoke refresh token")
        })?;

        self.audit
            .log(AuditEvent::new(Some(principal), actions::LOGOUT, json!({})));
        Ok(())
    }

    /// Redeem a verification link
    pub async fn verify_email(&self, token: &str, user_id: Uuid) -> Result<(), DomainError> {
        self.verification.redeem(token, user_id).await?;
        self.audit
            .log(AuditEvent::new(Some(user_id), actions::EMAIL_VERIFIED, json!({})));
        Ok(())
    }

    pub async fn me(&self, user_id: Uuid) -> Result<User, DomainError> {
        self.users
            .get(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("user {} not found", user_id)))
    }

    /// Resolve an access-token subject to its account; `Unauthorized` if it does not
    /// name an existing user
    pub async fn principal_user(&self, subject: &str) -> Result<User, DomainError> {
        let id = Uuid::parse_str(subject)
            .map_err(|_| DomainError::unauthorized("invalid token subject"))?;

        self.users
            .get(id)
            .await?
            .ok_or_else(|| DomainError::unauthorized("unknown principal"))
    }

    /// All users, newest first
    pub async fn list_users(&self) -> Result<Vec<User>, DomainError> {
        self.users.list().await
    }

    async fn issue_pair(&self, principal: &str) -> Result<TokenPair, DomainError> {
        let refresh_token = self
            .refresh_tokens
            .create(principal, self.config.refresh_token_ttl)
            .await
            .map_err(|e| {
                error!(principal = %principal, error = %e, "Failed to create refresh token");
                DomainError::internal("failed to create refresh token")
            })?;
        record_token_issued("refresh");

        let access_token = self.codec.issue(principal, self.config.access_token_ttl)?;
        record_token_issued("access");

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}
