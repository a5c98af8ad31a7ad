//! At-least-once Kafka consumption for Spectra domain events
//!
//! One [`TopicConsumer`] runs per topic. Each record is decoded into an
//! `EventEnvelope<DomainEvent>`, handed to the service's [`EventHandler`], and its
//! offset is committed only once the record is settled:
//!
//! - success: commit
//! - undecodable payload or [`HandlerError::Permanent`]: forward to `<topic>.dlq`
//!   (when a dead-letter producer is configured), then commit
//! - [`HandlerError::Retryable`]: retry in-process with exponential backoff; when
//!   retries run out, seek the partition back so the broker redelivers the record
//!
//! Handlers must therefore be idempotent.

use async_trait::async_trait;
use event_schema::{decode_envelope, DomainEvent, EventEnvelope};
use resilience::{with_retry_if, RetryConfig, RetryError};

mod consumer;

pub use consumer::{spawn_consumers, ConsumerConfig, ConsumerError, TopicConsumer};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// Transient failure (timeouts, unavailable collaborators); worth retrying
    #[error("retryable: {0}")]
    Retryable(String),

    /// Retrying cannot help (e.g. the event references nothing we know about)
    #[error("permanent: {0}")]
    Permanent(String),
}

impl HandlerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, HandlerError::Retryable(_))
    }
}

/// Side effect a service attaches to inbound domain events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, envelope: &EventEnvelope<DomainEvent>) -> Result<(), HandlerError>;
}

/// How a single record was settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Handled,
    /// Commit after forwarding to the dead-letter topic
    DeadLetter(String),
    /// Leave uncommitted and let the broker deliver it again
    Redeliver(String),
}

/// Decode and handle one record received on `topic`.
pub async fn process_payload<H>(
    handler: &H,
    topic: &str,
    payload: Option<&[u8]>,
    retry: &RetryConfig,
) -> Outcome
where
    H: EventHandler + ?Sized,
{
    let Some(payload) = payload else {
        return Outcome::DeadLetter("empty payload".to_string());
    };

    let envelope = match decode_envelope(topic, payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(topic, error = %e, "Undecodable event");
            return Outcome::DeadLetter(e.to_string());
        }
    };

    let result = with_retry_if(retry.clone(), HandlerError::is_retryable, || {
        handler.handle(&envelope)
    })
    .await;

    match result {
        Ok(()) => {
            tracing::debug!(
                topic,
                event_id = %envelope.event_id,
                kind = envelope.data.kind(),
                "Event handled"
            );
            Outcome::Handled
        }
        Err(RetryError::Aborted(e)) => {
            tracing::error!(topic, event_id = %envelope.event_id, error = %e, "Event failed permanently");
            Outcome::DeadLetter(e.to_string())
        }
        Err(RetryError::Exhausted { attempts, last }) => {
            tracing::error!(
                topic,
                event_id = %envelope.event_id,
                attempts,
                error = %last,
                "Event still failing, leaving it for redelivery"
            );
            Outcome::Redeliver(last.to_string())
        }
    }
}
