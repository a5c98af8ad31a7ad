//! Mail transport
//!
//! [`SmtpMailer`] sends through lettre's async SMTP transport and falls back to
//! logging when no SMTP host is configured. [`MemoryMailer`] records mail for
//! tests and can be told to fail for specific addresses.

use crate::config::SmtpSettings;
use crate::error::{NotificationError, Result};
use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// One plain-text message to one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<()>;
}

pub struct SmtpMailer {
    transport: Option<Arc<AsyncSmtpTransport<Tokio1Executor>>>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build the transport. An empty SMTP host yields a no-op mailer that only logs.
    pub fn new(config: &SmtpSettings) -> Result<Self> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| NotificationError::Config(format!("Invalid SMTP_FROM address: {}", e)))?;

        let transport = if config.host.trim().is_empty() {
            warn!("SMTP host not configured; mailer will operate in no-op mode");
            None
        } else {
            let builder = if config.starttls {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            } else {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            }
            .map_err(|e| {
                NotificationError::Config(format!("Failed to configure SMTP transport: {}", e))
            })?
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

            let builder = if let (Some(username), Some(password)) =
                (&config.username, &config.password)
            {
                builder.credentials(Credentials::new(username.to_string(), password.to_string()))
            } else {
                builder
            };

            Some(Arc::new(builder.build()))
        };

        Ok(Self { transport, from })
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        let Some(transport) = &self.transport else {
            info!(
                subject = %email.subject,
                recipient = %email.to,
                "Mailer running in no-op mode; skipping actual send"
            );
            return Ok(());
        };

        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|e| NotificationError::InvalidAddress {
                address: email.to.clone(),
                reason: e.to_string(),
            })?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.as_str())
            .header(header::ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| NotificationError::Transport(format!("Failed to build email: {}", e)))?;

        transport
            .send(message)
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;
        info!(subject = %email.subject, "Email sent");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    /// Fail this many more times, then deliver
    Transient(usize),
    Always,
}

/// Records delivered mail in memory
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<Email>>,
    failures: Mutex<HashMap<String, Failure>>,
    attempts: Mutex<HashMap<String, usize>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send to `address` fails with a transport error.
    pub async fn fail_always(&self, address: &str) {
        self.failures
            .lock()
            .await
            .insert(address.to_string(), Failure::Always);
    }

    /// The next `times` sends to `address` fail with a transport error.
    pub async fn fail_times(&self, address: &str, times: usize) {
        self.failures
            .lock()
            .await
            .insert(address.to_string(), Failure::Transient(times));
    }

    pub async fn sent(&self) -> Vec<Email> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_to(&self) -> Vec<String> {
        self.sent.lock().await.iter().map(|e| e.to.clone()).collect()
    }

    /// Delivery attempts made for `address`, failed ones included
    pub async fn attempts(&self, address: &str) -> usize {
        self.attempts.lock().await.get(address).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        *self
            .attempts
            .lock()
            .await
            .entry(email.to.clone())
            .or_default() += 1;

        if !email.to.contains('@') {
            return Err(NotificationError::InvalidAddress {
                address: email.to.clone(),
                reason: "missing domain part".to_string(),
            });
        }

        let mut failures = self.failures.lock().await;
        match failures.get_mut(&email.to) {
            Some(Failure::Always) => {
                return Err(NotificationError::Transport("550 mailbox unavailable".into()))
            }
            Some(Failure::Transient(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                return Err(NotificationError::Transport("421 try again later".into()));
            }
            _ => {}
        }
        drop(failures);

        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}
