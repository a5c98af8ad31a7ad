//! Configuration management for Identity Service
//!
//! Loads settings from environment variables, with a `.env` file honoured in
//! development builds.
//!
//! # Example
//!
//! ```no_run
//! use identity_service::config::Settings;
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     println!("JWT issuer: {}", settings.jwt.issuer);
//!     Ok(())
//! }
//! ```

use anyhow::{Context, Result};
use crypto_core::{JwtCodec, JwtConfig, JwtKeys};
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
    pub registration: RegistrationSettings,
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
            registration: RegistrationSettings::from_env()?,
        })
    }
}

/// Parse an optional variable, falling back to `default`
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

/// Database connection settings
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

/// Kafka settings for the outbox publisher
#[derive(Debug, Clone)]
pub struct KafkaSettings {
    pub brokers: String,
    pub outbox_batch_size: i32,
    pub outbox_poll_interval_ms: u64,
    pub outbox_max_retries: i32,
}

impl KafkaSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            brokers: env::var("KAFKA_BROKERS").unwrap_or_default(),
            outbox_batch_size: parse_var("OUTBOX_BATCH_SIZE", 100)?,
            outbox_poll_interval_ms: parse_var("OUTBOX_POLL_INTERVAL_MS", 1000)?,
            outbox_max_retries: parse_var("OUTBOX_MAX_RETRIES", 10)?,
        })
    }
}

/// JWT settings
///
/// `JWT_PRIVATE_KEY` + `JWT_PUBLIC_KEY` select RS256; otherwise `JWT_SECRET`
/// selects HS512.
#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret: Option<String>,
    pub private_key: Option<String>,
    pub public_key: Option<String>,
    pub issuer: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
}

impl JwtSettings {
    fn from_env() -> Result<Self> {
        let settings = Self {
            secret: env::var("JWT_SECRET").ok(),
            private_key: env::var("JWT_PRIVATE_KEY").ok(),
            public_key: env::var("JWT_PUBLIC_KEY").ok(),
            issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "spectra".to_string()),
            access_ttl_secs: parse_var("JWT_ACCESS_TTL_SECS", 15 * 60)?,
            refresh_ttl_secs: parse_var("JWT_REFRESH_TTL_SECS", 7 * 24 * 60 * 60)?,
        };

        if settings.secret.is_none() && settings.private_key.is_none() {
            anyhow::bail!("JWT_SECRET or JWT_PRIVATE_KEY/JWT_PUBLIC_KEY must be set");
        }
        Ok(settings)
    }

    pub fn codec(&self) -> Result<JwtCodec> {
        let keys = match (&self.private_key, &self.public_key, &self.secret) {
            (Some(private), Some(public), _) => JwtKeys::rsa_pem(private, public),
            (_, _, Some(secret)) => JwtKeys::hmac(secret.as_bytes()),
            _ => anyhow::bail!("JWT_PUBLIC_KEY must accompany JWT_PRIVATE_KEY"),
        }
        .context("Invalid JWT key material")?;

        let config = JwtConfig {
            issuer: self.issuer.clone(),
            access_ttl: Duration::from_secs(self.access_ttl_secs),
            refresh_ttl: Duration::from_secs(self.refresh_ttl_secs),
        };

        JwtCodec::new(keys, config).context("Invalid JWT configuration")
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Shared key required on `/internal` routes; open when unset
    pub internal_api_key: Option<String>,
}

impl ServerSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("SERVER_PORT", 8081)?,
            internal_api_key: env::var("INTERNAL_API_KEY").ok().filter(|k| !k.is_empty()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RegistrationSettings {
    /// Lifetime of pending registrations and their codes
    pub ttl_secs: u64,
}

impl RegistrationSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            ttl_secs: parse_var("REGISTRATION_TTL_SECS", 5 * 60)?,
        })
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}
