//! Event to email fan-out
//!
//! Recipients are resolved through the Directory API, then each one gets its
//! own send with its own retries. A failure for one address never stops the
//! others. Every successful send leaves a receipt keyed by (event, address),
//! so when the bus redelivers an event only the addresses that failed are
//! tried again.

use crate::error::{NotificationError, Result};
use crate::mailer::Mailer;
use crate::templates::{self, Template};
use async_trait::async_trait;
use directory_client::{Directory, DirectoryError};
use event_consumer::{EventHandler, HandlerError};
use event_schema::{DomainEvent, EventEnvelope};
use redis_utils::EphemeralStore;
use resilience::{with_retry_if, RetryConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Name used when the reacting user can no longer be resolved
const UNKNOWN_REACTOR: &str = "Someone";

pub fn receipt_key(event_id: Uuid, address: &str) -> String {
    format!("notify:sent:{}:{}", event_id, address)
}

/// What happened to each recipient of one event
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub sent: Vec<String>,
    /// Delivered by an earlier attempt of the same event
    pub skipped: Vec<String>,
    pub failed: Vec<(String, NotificationError)>,
}

impl DeliveryReport {
    /// Retryable when any failure may clear up later, permanent otherwise
    pub fn into_result(self) -> std::result::Result<(), HandlerError> {
        if self.failed.is_empty() {
            return Ok(());
        }

        let total = self.sent.len() + self.skipped.len() + self.failed.len();
        let summary = format!(
            "{} of {} recipients failed: {}",
            self.failed.len(),
            total,
            self.failed
                .iter()
                .map(|(address, e)| format!("{} ({})", address, e))
                .collect::<Vec<_>>()
                .join(", ")
        );

        if self.failed.iter().any(|(_, e)| e.is_retryable()) {
            Err(HandlerError::Retryable(summary))
        } else {
            Err(HandlerError::Permanent(summary))
        }
    }
}

pub struct NotificationDispatcher {
    directory: Arc<dyn Directory>,
    mailer: Arc<dyn Mailer>,
    receipts: Arc<dyn EphemeralStore>,
    receipt_ttl: Duration,
    retry: RetryConfig,
}

impl NotificationDispatcher {
    pub fn new(
        directory: Arc<dyn Directory>,
        mailer: Arc<dyn Mailer>,
        receipts: Arc<dyn EphemeralStore>,
        receipt_ttl: Duration,
    ) -> Self {
        Self {
            directory,
            mailer,
            receipts,
            receipt_ttl,
            retry: RetryConfig::default(),
        }
    }

    /// Backoff policy for directory lookups and each individual send
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Render the event and resolve who gets it. `None` for events that send no mail.
    pub async fn prepare(&self, event: &DomainEvent) -> Result<Option<(Template, Vec<String>)>> {
        let prepared = match event {
            DomainEvent::NewPost(e) => (templates::new_post(e), self.emails(&e.subscriber_ids).await?),
            DomainEvent::NewComment(e) => (
                templates::new_comment(e),
                self.emails(&[e.author_user_id]).await?,
            ),
            DomainEvent::NewReaction(e) => {
                let reactor = self.reactor_name(e.reacting_user_id).await?;
                (
                    templates::new_reaction(e, &reactor),
                    self.emails(&[e.target_user_id]).await?,
                )
            }
            DomainEvent::RegistrationCode(e) => {
                (templates::registration_code(e), vec![e.email.clone()])
            }
            DomainEvent::UserDeleted(_) => return Ok(None),
        };
        Ok(Some(prepared))
    }

    /// Send `template` to every address, isolating failures per address.
    pub async fn deliver(
        &self,
        event_id: Uuid,
        template: &Template,
        recipients: &[String],
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for address in recipients {
            let key = receipt_key(event_id, address);
            match self.receipts.exists(&key).await {
                Ok(true) => {
                    debug!(event_id = %event_id, recipient = %address, "Already delivered");
                    report.skipped.push(address.clone());
                    continue;
                }
                Ok(false) => {}
                Err(e) => warn!(event_id = %event_id, error = %e, "Receipt lookup failed; sending anyway"),
            }

            let email = template.to(address);
            let sent = with_retry_if(
                self.retry.clone(),
                NotificationError::is_retryable,
                || self.mailer.send(&email),
            )
            .await;

            match sent {
                Ok(()) => {
                    if let Err(e) = self.receipts.set_ex(&key, "1", self.receipt_ttl).await {
                        warn!(event_id = %event_id, recipient = %address, error = %e, "Failed to record delivery receipt");
                    }
                    report.sent.push(address.clone());
                }
                Err(e) => {
                    let e = e.into_inner();
                    error!(event_id = %event_id, recipient = %address, error = %e, "Notification delivery failed");
                    report.failed.push((address.clone(), e));
                }
            }
        }

        report
    }

    async fn emails(&self, ids: &[Uuid]) -> Result<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        with_retry_if(self.retry.clone(), DirectoryError::is_retryable, || {
            self.directory.batch_resolve_emails(ids)
        })
        .await
        .map_err(|e| NotificationError::from(e.into_inner()))
    }

    async fn reactor_name(&self, id: Uuid) -> Result<String> {
        let resolved = with_retry_if(self.retry.clone(), DirectoryError::is_retryable, || {
            self.directory.resolve(id)
        })
        .await;

        match resolved {
            Ok(user) => Ok(user.name),
            Err(e) => match e.into_inner() {
                DirectoryError::NotFound(_) => {
                    warn!(user_id = %id, "Reacting user not found; using placeholder name");
                    Ok(UNKNOWN_REACTOR.to_string())
                }
                other => Err(other.into()),
            },
        }
    }
}

#[async_trait]
impl EventHandler for NotificationDispatcher {
    async fn handle(&self, envelope: &EventEnvelope<DomainEvent>) -> std::result::Result<(), HandlerError> {
        let prepared = self.prepare(&envelope.data).await.map_err(|e| {
            if e.is_retryable() {
                HandlerError::Retryable(e.to_string())
            } else {
                HandlerError::Permanent(e.to_string())
            }
        })?;

        let Some((template, recipients)) = prepared else {
            debug!(kind = envelope.data.kind(), "No notification for event");
            return Ok(());
        };

        let report = self.deliver(envelope.event_id, &template, &recipients).await;
        info!(
            event_id = %envelope.event_id,
            kind = envelope.data.kind(),
            sent = report.sent.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Notification fan-out finished"
        );
        report.into_result()
    }
}
