//! Configuration management for Notification Service
//!
//! Loads settings from environment variables, with a `.env` file honoured in
//! development builds.

use anyhow::{Context, Result};
use directory_client::DirectoryConfig;
use event_consumer::ConsumerConfig;
use resilience::RetryConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Settings {
    pub redis: RedisSettings,
    pub kafka: KafkaSettings,
    pub smtp: SmtpSettings,
    pub directory: DirectorySettings,
    pub delivery: DeliverySettings,
    pub server: ServerSettings,
}

impl Settings {
    pub fn load() -> Result<Self> {
        if cfg!(debug_assertions) && dotenvy::dotenv().is_ok() {
            info!("Loaded .env file for development");
        }

        Ok(Settings {
            redis: RedisSettings::from_env()?,
            kafka: KafkaSettings::from_env()?,
            smtp: SmtpSettings::from_env()?,
            directory: DirectorySettings::from_env()?,
            delivery: DeliverySettings::from_env()?,
            server: ServerSettings::from_env()?,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().with_context(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}

/// Redis holds the delivery receipts
#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub url: String,
}

impl RedisSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("REDIS_URL").context("REDIS_URL must be set")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct KafkaSettings {
    pub brokers: String,
    pub group_id: String,
    pub dead_letter: bool,
}

impl KafkaSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            brokers: env::var("KAFKA_BROKERS").context("KAFKA_BROKERS must be set")?,
            group_id: env::var("KAFKA_GROUP_ID").unwrap_or_else(|_| "notification-service".to_string()),
            dead_letter: parse_var("KAFKA_DEAD_LETTER", true)?,
        })
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        let mut config = ConsumerConfig::new(self.brokers.clone(), self.group_id.clone());
        config.dead_letter = self.dead_letter;
        config
    }
}

/// SMTP relay; an empty host turns the mailer into a logger
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub starttls: bool,
    pub timeout_secs: u64,
}

impl SmtpSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("SMTP_HOST").unwrap_or_default(),
            port: parse_var("SMTP_PORT", 587)?,
            username: env::var("SMTP_USERNAME").ok().filter(|v| !v.is_empty()),
            password: env::var("SMTP_PASSWORD").ok().filter(|v| !v.is_empty()),
            from: env::var("SMTP_FROM")
                .unwrap_or_else(|_| "Spectra <no-reply@spectra.dev>".to_string()),
            starttls: parse_var("SMTP_STARTTLS", true)?,
            timeout_secs: parse_var("SMTP_TIMEOUT_SECS", 10)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DirectorySettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl DirectorySettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            base_url: env::var("DIRECTORY_URL")
                .unwrap_or_else(|_| "http://localhost:8081".to_string()),
            api_key: env::var("INTERNAL_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout_secs: parse_var("DIRECTORY_TIMEOUT_SECS", 5)?,
        })
    }

    pub fn client_config(&self) -> DirectoryConfig {
        let mut config = DirectoryConfig::new(self.base_url.clone());
        config.api_key = self.api_key.clone();
        config.timeout = Duration::from_secs(self.timeout_secs);
        config
    }
}

/// Per-recipient retry and receipt retention
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    pub max_retries: u32,
    pub receipt_ttl_secs: u64,
}

impl DeliverySettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            max_retries: parse_var("NOTIFY_MAX_RETRIES", 3)?,
            receipt_ttl_secs: parse_var("NOTIFY_RECEIPT_TTL_SECS", 7 * 24 * 60 * 60)?,
        })
    }

    pub fn receipt_ttl(&self) -> Duration {
        Duration::from_secs(self.receipt_ttl_secs)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            ..RetryConfig::default()
        }
    }
}

/// Bind address of the health probe
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("SERVER_PORT", 8083)?,
        })
    }
}
