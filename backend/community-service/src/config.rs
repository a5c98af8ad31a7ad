//! Configuration management for Community Service
//!
//! Loads settings from environment variables, with a `.env` file honoured in
//! development builds.

use anyhow::{Context, Result};
use crypto_core::{JwtCodec, JwtConfig, JwtKeys};
use directory_client::DirectoryConfig;
use event_consumer::ConsumerConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub kafka: KafkaSettings,
    pub jwt: JwtSettings,
    pub server: ServerSettings,
    pub directory: DirectorySettings,
    pub content: ContentSettings,
}

impl Settings {
    pub fn load() -> Result<Self> {
        if cfg!(debug_assertions) && dotenvy::dotenv().is_ok() {
            info!("Loaded .env file for development");
        }

        Ok(Settings {
            database: DatabaseSettings::from_env()?,
            redis: RedisSettings::from_env()?,
            kafka: KafkaSettings::from_env()?,
            jwt: JwtSettings::from_env()?,
            server: ServerSettings::from_env()?,
            directory: DirectorySettings::from_env()?,
            content: ContentSettings::from_env()?,
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

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: u64,
}

impl DatabaseSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 20)?,
            acquire_timeout: parse_var("DATABASE_ACQUIRE_TIMEOUT", 5)?,
        })
    }
}

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

/// Kafka settings for the outbox publisher and the `user-delete` consumer
#[derive(Debug, Clone)]
pub struct KafkaSettings {
    pub brokers: String,
    pub group_id: String,
    pub dead_letter: bool,
    pub outbox_batch_size: i32,
    pub outbox_poll_interval_ms: u64,
    pub outbox_max_retries: i32,
}

impl KafkaSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            brokers: env::var("KAFKA_BROKERS").unwrap_or_default(),
            group_id: env::var("KAFKA_GROUP_ID").unwrap_or_else(|_| "community-service".to_string()),
            dead_letter: parse_var("KAFKA_DEAD_LETTER", true)?,
            outbox_batch_size: parse_var("OUTBOX_BATCH_SIZE", 100)?,
            outbox_poll_interval_ms: parse_var("OUTBOX_POLL_INTERVAL_MS", 1000)?,
            outbox_max_retries: parse_var("OUTBOX_MAX_RETRIES", 10)?,
        })
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        let mut config = ConsumerConfig::new(self.brokers.clone(), self.group_id.clone());
        config.dead_letter = self.dead_letter;
        config
    }
}

/// Token verification settings
///
/// `JWT_PUBLIC_KEY` selects RS256 verification; otherwise `JWT_SECRET`
/// selects HS512. Must match what identity-service signs with.
#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret: Option<String>,
    pub public_key: Option<String>,
    pub issuer: String,
}

impl JwtSettings {
    fn from_env() -> Result<Self> {
        let settings = Self {
            secret: env::var("JWT_SECRET").ok(),
            public_key: env::var("JWT_PUBLIC_KEY").ok(),
            issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "spectra".to_string()),
        };

        if settings.secret.is_none() && settings.public_key.is_none() {
            anyhow::bail!("JWT_SECRET or JWT_PUBLIC_KEY must be set");
        }
        Ok(settings)
    }

    pub fn codec(&self) -> Result<JwtCodec> {
        let keys = match (&self.public_key, &self.secret) {
            (Some(public), _) => JwtKeys::rsa_public_pem(public),
            (None, Some(secret)) => JwtKeys::hmac(secret.as_bytes()),
            (None, None) => anyhow::bail!("no JWT key material configured"),
        }
        .context("Invalid JWT key material")?;

        let config = JwtConfig {
            issuer: self.issuer.clone(),
            ..JwtConfig::default()
        };

        JwtCodec::new(keys, config).context("Invalid JWT configuration")
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("SERVER_PORT", 8082)?,
        })
    }
}

/// Where the Directory API (identity-service) lives
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

#[derive(Debug, Clone)]
pub struct ContentSettings {
    /// Prefix of links placed in notifications; the message id is appended
    pub message_link_base: String,
    pub message_cache_ttl_secs: u64,
}

impl ContentSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            message_link_base: env::var("MESSAGE_LINK_BASE")
                .unwrap_or_else(|_| "http://localhost:8080/api/messages".to_string()),
            message_cache_ttl_secs: parse_var("MESSAGE_CACHE_TTL_SECS", 600)?,
        })
    }

    pub fn message_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.message_cache_ttl_secs)
    }
}
