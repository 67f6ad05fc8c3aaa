//! BookShare Gate
//!
//! Identity and traffic-control core of the BookShare API:
//! - Signed short-lived access tokens and rotating refresh tokens
//! - Fixed-window per-route rate limiting over an expiring key-value store
//! - One-shot email verification tokens
//! - A durable task pipeline that delivers verification email

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use self::config::AppConfig;

use std::sync::Arc;

use tracing::info;

use api::state::AppState;
use domain::task::TaskQueue;
use domain::DomainError;
use infrastructure::{
    auth::{Argon2Hasher, JwtConfig, JwtService},
    email::create_email_sender,
    kv::create_expiring_store,
    rate_limit::RateLimiter,
    refresh_token::create_refresh_token_store,
    services::{AuthService, AuthServiceDeps},
    storage::{create_relational_backends, RelationalBackends},
    task::{create_task_queue, SendVerificationEmailHandler, TaskDistributor, TaskProcessor},
    verification::VerificationService,
};

/// Backends shared by the API server and the worker
#[derive(Debug, Clone)]
pub struct AppComponents {
    pub relational: RelationalBackends,
    pub queue: Arc<dyn TaskQueue>,
    pub verification: VerificationService,
}

/// Connect the relational store and the task queue
pub async fn create_components(config: &AppConfig) -> Result<AppComponents, DomainError> {
    info!(backend = ?config.database.backend, "Relational storage backend");
    let relational =
        create_relational_backends(config.database.backend, &config.database.postgres_config())
            .await?;

    info!(
        backend = %config.tasks.queue_backend,
        queue = %config.tasks.queue_name,
        "Task queue backend"
    );
    let queue = create_task_queue(
        config.tasks.queue_backend,
        config.tasks.queue_config(&config.redis),
    )
    .await?;

    let verification = VerificationService::new(
        relational.verification_tokens.clone(),
        relational.users.clone(),
        config.verification.verification_config(),
    );

    Ok(AppComponents {
        relational,
        queue,
        verification,
    })
}

/// Build the HTTP application state
pub async fn create_app_state(
    config: &AppConfig,
    components: &AppComponents,
) -> Result<AppState, DomainError> {
    info!(backend = %config.kv.backend, "Expiring store backend");
    let store = create_expiring_store(config.kv.backend, &config.redis.store_config()).await?;

    let codec = JwtService::new(JwtConfig::new(&config.auth.jwt_secret))?;
    let refresh_tokens =
        create_refresh_token_store(config.auth.refresh_token_backend, store.clone());

    let auth = AuthService::new(
        AuthServiceDeps {
            users: components.relational.users.clone(),
            hasher: Arc::new(Argon2Hasher::new()),
            codec: Arc::new(codec),
            refresh_tokens,
            distributor: TaskDistributor::new(components.queue.clone()),
            verification: components.verification.clone(),
            audit: components.relational.audit.clone(),
        },
        config.auth.auth_config(),
    );

    let rules = config.rate_limit.rules();
    info!(rules = rules.len(), "Rate limit rules loaded");

    Ok(AppState::new(
        auth,
        RateLimiter::new(store.clone(), rules),
        store,
        components.queue.clone(),
    )
    .with_trusted_forwarded_headers(config.server.trust_forwarded_headers))
}

/// Build the task processor with every handler registered
pub fn create_task_processor(
    config: &AppConfig,
    components: &AppComponents,
) -> Result<TaskProcessor, DomainError> {
    let sender = create_email_sender(config.email.backend, &config.email.smtp_config())?;
    info!(backend = ?config.email.backend, "Email sender ready");

    let handler = SendVerificationEmailHandler::new(
        components.relational.users.clone(),
        components.verification.clone(),
        sender,
    );

    Ok(
        TaskProcessor::new(components.queue.clone(), config.tasks.processor_config())
            .register(Arc::new(handler)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, KvConfig, TaskSettings};
    use crate::infrastructure::kv::StoreType;
    use crate::infrastructure::storage::StorageType;

    fn in_memory_config() -> AppConfig {
        let mut config = AppConfig {
            kv: KvConfig {
                backend: StoreType::InMemory,
            },
            database: DatabaseConfig {
                backend: StorageType::InMemory,
                ..DatabaseConfig::default()
            },
            tasks: TaskSettings {
                queue_backend: StoreType::InMemory,
                ..TaskSettings::default()
            },
            ..AppConfig::default()
        };
        config.auth.jwt_secret = "bootstrap-secret".to_string();
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_memory_wiring() {
        let config = in_memory_config();
        let components = create_components(&config).await.unwrap();

        let state = create_app_state(&config, &components).await.unwrap();
        assert_eq!(state.rate_limiter.rules().len(), 3);

        let processor = create_task_processor(&config, &components).unwrap();
        assert!(!processor.process_one().await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_jwt_secret_is_rejected() {
        let mut config = in_memory_config();
        config.auth.jwt_secret.clear();
        let components = create_components(&config).await.unwrap();

        let result = create_app_state(&config, &components).await;
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }
}
