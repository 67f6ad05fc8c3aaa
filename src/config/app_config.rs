use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::rate_limit::{RateLimitRule, RateLimitRules};
use crate::infrastructure::email::{EmailBackend, SmtpConfig};
use crate::infrastructure::kv::{RedisStoreConfig, StoreType};
use crate::infrastructure::observability::MetricsConfig;
use crate::infrastructure::services::AuthConfig;
use crate::infrastructure::storage::{PostgresConfig, StorageType};
use crate::infrastructure::task::{ProcessorConfig, RedisTaskQueueConfig};
use crate::infrastructure::verification::VerificationConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub kv: KvConfig,
    pub redis: RedisConfig,
    pub database: DatabaseConfig,
    pub auth: AuthSettings,
    pub rate_limit: RateLimitConfig,
    pub verification: VerificationSettings,
    pub tasks: TaskSettings,
    pub email: EmailSettings,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Only enable behind a proxy that overwrites `X-Forwarded-For`
    pub trust_forwarded_headers: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Backend of the expiring store used by rate limiting and refresh tokens
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KvConfig {
    pub backend: StoreType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    pub key_prefix: Option<String>,
    pub command_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: StorageType,
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    pub refresh_token_backend: StoreType,
    pub require_verified_email: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Route template (as matched by the router) to rule
    pub rules: HashMap<String, RateLimitRule>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerificationSettings {
    pub token_ttl_secs: u64,
    /// Public origin used to build verification links
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    pub queue_backend: StoreType,
    pub queue_name: String,
    pub concurrency: usize,
    pub max_retries: u32,
    pub backoff_base_secs: u64,
    pub backoff_max_secs: u64,
    pub poll_timeout_secs: u64,
    pub lease_secs: u64,
    pub maintenance_interval_secs: u64,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub backend: EmailBackend,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_starttls: bool,
    pub from: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            trust_forwarded_headers: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: None,
            command_timeout_ms: 500,
        }
    }
}

impl RedisConfig {
    pub fn store_config(&self) -> RedisStoreConfig {
        let config = RedisStoreConfig::new(&self.url)
            .with_command_timeout(Duration::from_millis(self.command_timeout_ms));

        match &self.key_prefix {
            Some(prefix) if !prefix.is_empty() => config.with_key_prefix(prefix),
            _ => config,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageType::default(),
            url: "postgres://localhost/bookshare".to_string(),
            max_connections: 10,
            connect_timeout_secs: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig::new(&self.url)
            .with_max_connections(self.max_connections)
            .with_connect_timeout(self.connect_timeout_secs)
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 86_400,
            refresh_token_backend: StoreType::default(),
            require_verified_email: true,
        }
    }
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &"[hidden]")
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .field("refresh_token_backend", &self.refresh_token_backend)
            .field("require_verified_email", &self.require_verified_email)
            .finish()
    }
}

impl AuthSettings {
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            access_token_ttl: Duration::from_secs(self.access_token_ttl_secs),
            refresh_token_ttl: Duration::from_secs(self.refresh_token_ttl_secs),
            require_verified_email: self.require_verified_email,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let rules = [
            ("/api/v1/login", RateLimitRule::per_minute(5)),
            ("/api/v1/register", RateLimitRule::per_minute(5)),
            ("/api/v1/me", RateLimitRule::per_minute(100)),
        ]
        .into_iter()
        .map(|(route, rule)| (route.to_string(), rule))
        .collect();

        Self { rules }
    }
}

impl RateLimitConfig {
    pub fn rules(&self) -> RateLimitRules {
        self.rules
            .iter()
            .map(|(route, rule)| (route.clone(), *rule))
            .collect()
    }
}

impl Default for VerificationSettings {
    fn default() -> Self {
        let defaults = VerificationConfig::default();
        Self {
            token_ttl_secs: defaults.token_ttl.as_secs(),
            base_url: defaults.base_url,
        }
    }
}

impl VerificationSettings {
    pub fn verification_config(&self) -> VerificationConfig {
        VerificationConfig::new(&self.base_url)
            .with_token_ttl(Duration::from_secs(self.token_ttl_secs))
    }
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            queue_backend: StoreType::default(),
            queue_name: "default".to_string(),
            concurrency: 5,
            max_retries: 25,
            backoff_base_secs: 1,
            backoff_max_secs: 600,
            poll_timeout_secs: 2,
            lease_secs: 300,
            maintenance_interval_secs: 5,
        }
    }
}

impl TaskSettings {
    pub fn queue_config(&self, redis: &RedisConfig) -> RedisTaskQueueConfig {
        RedisTaskQueueConfig {
            redis: redis.store_config(),
            queue_name: self.queue_name.clone(),
            lease: Duration::from_secs(self.lease_secs),
            ..RedisTaskQueueConfig::default()
        }
    }

    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            poll_timeout: Duration::from_secs(self.poll_timeout_secs),
            maintenance_interval: Duration::from_secs(self.maintenance_interval_secs),
            ..ProcessorConfig::default()
        }
        .with_concurrency(self.concurrency)
        .with_max_retries(self.max_retries)
        .with_backoff(
            Duration::from_secs(self.backoff_base_secs),
            Duration::from_secs(self.backoff_max_secs),
        )
    }
}

impl Default for EmailSettings {
    fn default() -> Self {
        let smtp = SmtpConfig::default();
        Self {
            backend: EmailBackend::default(),
            smtp_host: smtp.host,
            smtp_port: smtp.port,
            smtp_username: None,
            smtp_password: None,
            smtp_starttls: smtp.starttls,
            from: smtp.from,
        }
    }
}

impl std::fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailSettings")
            .field("backend", &self.backend)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &self.smtp_password.as_ref().map(|_| "[hidden]"))
            .field("from", &self.from)
            .finish()
    }
}

impl EmailSettings {
    pub fn smtp_config(&self) -> SmtpConfig {
        SmtpConfig {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            username: self.smtp_username.clone(),
            password: self.smtp_password.clone(),
            from: self.from.clone(),
            starttls: self.smtp_starttls,
            ..SmtpConfig::default()
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
