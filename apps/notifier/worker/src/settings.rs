//! Worker configuration, loaded once at startup from the environment.

use core_config::database::DatabaseConfig;
use core_config::redis::RedisConfig;
use core_config::server::ServerConfig;
use core_config::{ConfigError, FromEnv, env_flag, env_or_default, env_parse};
use domain_notifications::{EventStreams, ProcessorConfig};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Which email provider the worker sends through (`EMAIL_PROVIDER`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmailProviderKind {
    #[default]
    Smtp,
    /// Keeps messages in memory; development only.
    Capture,
}

impl FromStr for EmailProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smtp" => Ok(Self::Smtp),
            "capture" => Ok(Self::Capture),
            other => Err(ConfigError::ParseError {
                key: "EMAIL_PROVIDER".to_string(),
                details: format!("unknown provider '{other}', expected smtp or capture"),
            }),
        }
    }
}

/// Tuning for one stream consumer loop.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub consumer_group: String,
    /// Unique per process unless `EVENTS_CONSUMER_ID` pins it.
    pub consumer_id: String,
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub max_concurrent_events: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            consumer_group: domain_notifications::streams::CONSUMER_GROUP.to_string(),
            consumer_id: format!("notifier-{}", Uuid::new_v4()),
            batch_size: 10,
            poll_interval: Duration::from_millis(500),
            max_concurrent_events: 8,
        }
    }
}

impl ConsumerConfig {
    fn from_env(consumer_group: String) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let max_concurrent_events: usize =
            env_parse("EVENTS_MAX_CONCURRENT", defaults.max_concurrent_events)?;
        Ok(Self {
            consumer_group,
            consumer_id: env_or_default("EVENTS_CONSUMER_ID", &defaults.consumer_id),
            batch_size: env_parse("EVENTS_BATCH_SIZE", defaults.batch_size)?.max(1),
            poll_interval: Duration::from_millis(env_parse("EVENTS_POLL_INTERVAL_MS", 500u64)?),
            max_concurrent_events: max_concurrent_events.max(1),
        })
    }
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub redis: RedisConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub streams: EventStreams,
    pub consumer: ConsumerConfig,
    pub processor: ProcessorConfig,
    pub email_provider: EmailProviderKind,
    /// Apply pending migrations before consuming.
    pub run_migrations: bool,
}

impl FromEnv for WorkerSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let streams = EventStreams::from_env()?;
        Ok(Self {
            redis: RedisConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            server: ServerConfig::from_env()?,
            consumer: ConsumerConfig::from_env(streams.consumer_group.clone())?,
            streams,
            processor: ProcessorConfig::from_env()?,
            email_provider: env_or_default("EMAIL_PROVIDER", "smtp").parse()?,
            run_migrations: env_flag("RUN_MIGRATIONS", true),
        })
    }
}
