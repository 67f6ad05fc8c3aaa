//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, AuthSettings, DatabaseConfig, EmailSettings, KvConfig, LogFormat, LoggingConfig,
    RateLimitConfig, RedisConfig, ServerConfig, TaskSettings, VerificationSettings,
};
