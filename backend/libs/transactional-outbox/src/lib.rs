//! # Transactional Outbox
//!
//! Domain events are written to an `outbox_events` table in the same database
//! transaction as the state change that produced them. A background
//! [`OutboxProcessor`] drains unpublished rows to Kafka and marks them published
//! only after the broker acknowledged delivery.
//!
//! This gives **at-least-once delivery**: a crash after commit but before publish
//! leaves the row pending, and it is picked up on the next poll. Consumers must
//! therefore be idempotent.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use event_schema::{DomainEvent, UserDeletedEvent};
//! use transactional_outbox::{insert_in_tx, OutboxEvent};
//! use sqlx::PgPool;
//! use uuid::Uuid;
//!
//! async fn delete_user(pool: &PgPool, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
//!     let event = OutboxEvent::from_domain_event(
//!         "identity-service",
//!         user_id,
//!         &DomainEvent::UserDeleted(UserDeletedEvent { user_id }),
//!     )?;
//!
//!     let mut tx = pool.begin().await?;
//!     sqlx::query("DELETE FROM users WHERE id = $1")
//!         .bind(user_id)
//!         .execute(&mut *tx)
//!         .await?;
//!     insert_in_tx(&mut tx, &event).await?;
//!     tx.commit().await?;
//!
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_schema::{DomainEvent, EventEnvelope};
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

mod error;
mod memory;

pub use error::{OutboxError, OutboxResult};
pub use memory::MemoryOutbox;

/// Kafka delivery timeout for a single record
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for the per-event publish backoff
const MAX_BACKOFF_SECS: u64 = 300;

/// Represents an event stored in the outbox table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    /// Unique identifier for this event (equals the envelope's `event_id`)
    pub id: Uuid,

    /// Kind of the domain event (e.g. "new_post", "user_deleted")
    pub aggregate_type: String,

    /// Entity the event relates to; used as the Kafka record key
    pub aggregate_id: Uuid,

    /// Topic the event is routed to (e.g. "new-post")
    pub event_type: String,

    /// Serialized `EventEnvelope<DomainEvent>`
    pub payload: serde_json::Value,

    /// Optional metadata (correlation_id)
    pub metadata: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,

    /// None while unpublished
    pub published_at: Option<DateTime<Utc>>,

    /// Number of failed publish attempts
    pub retry_count: i32,

    /// Last error message from failed publish attempt
    pub last_error: Option<String>,

    /// Earliest time of the next publish attempt; None means due now
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl OutboxEvent {
    /// Wrap a domain event in a fresh envelope and build the outbox row for it.
    pub fn from_domain_event(
        source: &str,
        aggregate_id: Uuid,
        event: &DomainEvent,
    ) -> OutboxResult<Self> {
        Self::from_envelope(aggregate_id, &EventEnvelope::new(source, event.clone()))
    }

    pub fn from_envelope(
        aggregate_id: Uuid,
        envelope: &EventEnvelope<DomainEvent>,
    ) -> OutboxResult<Self> {
        let metadata = envelope
            .correlation_id
            .map(|cid| serde_json::json!({ "correlation_id": cid }));

        Ok(Self {
            id: envelope.event_id,
            aggregate_type: envelope.data.kind().to_string(),
            aggregate_id,
            event_type: envelope.data.topic().as_str().to_string(),
            payload: serde_json::to_value(envelope)?,
            metadata,
            created_at: envelope.timestamp,
            published_at: None,
            retry_count: 0,
            last_error: None,
            next_attempt_at: None,
        })
    }

    /// Decode the stored payload back into its envelope.
    pub fn envelope(&self) -> OutboxResult<EventEnvelope<DomainEvent>> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Enqueue an event outside of any caller-owned transaction.
///
/// Used where the triggering state change is not in the database (e.g. a
/// registration code kept in the ephemeral store).
#[async_trait]
pub trait OutboxWriter: Send + Sync {
    async fn enqueue(&self, event: &OutboxEvent) -> OutboxResult<()>;
}

/// Processor-side access to the outbox table.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Unpublished events that are due at `now` and still below
    /// `max_retries`, oldest first.
    async fn get_unpublished(
        &self,
        limit: i32,
        max_retries: i32,
        now: DateTime<Utc>,
    ) -> OutboxResult<Vec<OutboxEvent>>;

    async fn mark_published(&self, event_id: Uuid) -> OutboxResult<()>;

    /// Increment the retry count, record the error and defer the event until
    /// `next_attempt_at`.
    async fn mark_failed(
        &self,
        event_id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> OutboxResult<()>;

    /// Pending count and oldest pending age in seconds (age = 0 if none pending).
    async fn pending_stats(&self) -> OutboxResult<(i64, i64)>;
}

/// Insert an event within the caller's transaction.
///
/// Must be called before the transaction commits so the row becomes visible
/// atomically with the business change.
pub async fn insert_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    event: &OutboxEvent,
) -> OutboxResult<()> {
    sqlx::query(
        r#"
        INSERT INTO outbox_events (
            id,
            aggregate_type,
            aggregate_id,
            event_type,
            payload,
            metadata,
            created_at,
            published_at,
            retry_count,
            last_error,
            next_attempt_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(event.id)
    .bind(&event.aggregate_type)
    .bind(event.aggregate_id)
    .bind(&event.event_type)
    .bind(&event.payload)
    .bind(&event.metadata)
    .bind(event.created_at)
    .bind(event.published_at)
    .bind(event.retry_count)
    .bind(&event.last_error)
    .bind(event.next_attempt_at)
    .execute(&mut **tx)
    .await?;

    debug!(
        event_id = %event.id,
        event_type = %event.event_type,
        aggregate_id = %event.aggregate_id,
        "Event inserted into outbox"
    );

    Ok(())
}

/// PostgreSQL-backed outbox.
#[derive(Clone)]
pub struct SqlxOutboxRepository {
    pool: PgPool,
}

impl SqlxOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxWriter for SqlxOutboxRepository {
    async fn enqueue(&self, event: &OutboxEvent) -> OutboxResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_in_tx(&mut tx, event).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl OutboxRepository for SqlxOutboxRepository {
    async fn get_unpublished(
        &self,
        limit: i32,
        max_retries: i32,
        now: DateTime<Utc>,
    ) -> OutboxResult<Vec<OutboxEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                aggregate_type,
                aggregate_id,
                event_type,
                payload,
                metadata,
                created_at,
                published_at,
                retry_count,
                last_error,
                next_attempt_at
            FROM outbox_events
            WHERE published_at IS NULL
              AND retry_count < $2
              AND (next_attempt_at IS NULL OR next_attempt_at <= $3)
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .bind(max_retries)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let events = rows
            .into_iter()
            .map(|row| {
                Ok(OutboxEvent {
                    id: row.try_get("id")?,
                    aggregate_type: row.try_get("aggregate_type")?,
                    aggregate_id: row.try_get("aggregate_id")?,
                    event_type: row.try_get("event_type")?,
                    payload: row.try_get("payload")?,
                    metadata: row.try_get("metadata")?,
                    created_at: row.try_get("created_at")?,
                    published_at: row.try_get("published_at")?,
                    retry_count: row.try_get("retry_count")?,
                    last_error: row.try_get("last_error")?,
                    next_attempt_at: row.try_get("next_attempt_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        debug!(count = events.len(), "Fetched unpublished events");

        Ok(events)
    }

    async fn mark_published(&self, event_id: Uuid) -> OutboxResult<()> {
        let result = sqlx::query("UPDATE outbox_events SET published_at = NOW() WHERE id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!(event_id = %event_id, "Event not found when marking as published");
            return Err(OutboxError::EventNotFound(event_id));
        }

        Ok(())
    }

    async fn mark_failed(
        &self,
        event_id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> OutboxResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_events
            SET
                retry_count = retry_count + 1,
                last_error = $2,
                next_attempt_at = $3
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .bind(error)
        .bind(next_attempt_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(event_id = %event_id, "Event not found when marking as failed");
            return Err(OutboxError::EventNotFound(event_id));
        }

        warn!(event_id = %event_id, error = %error, "Event marked as failed");

        Ok(())
    }

    async fn pending_stats(&self) -> OutboxResult<(i64, i64)> {
        let rec = sqlx::query(
            r#"
            SELECT
                COUNT(*)::BIGINT AS pending,
                COALESCE(EXTRACT(EPOCH FROM (NOW() - MIN(created_at)))::BIGINT, 0) AS age_seconds
            FROM outbox_events
            WHERE published_at IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok((rec.try_get("pending")?, rec.try_get("age_seconds")?))
    }
}

/// Sends an outbox event to the message broker.
///
/// Implementations should be idempotent to handle retries safely.
#[async_trait]
pub trait OutboxPublisher: Send + Sync {
    async fn publish(&self, event: &OutboxEvent) -> OutboxResult<()>;
}

/// Kafka publisher.
///
/// The topic is the event's `event_type` and the record key its
/// `aggregate_id`, so events for one entity stay on one partition.
///
/// The producer should be configured with `enable.idempotence = true` and
/// `acks = all`.
pub struct KafkaOutboxPublisher {
    producer: FutureProducer,
}

impl KafkaOutboxPublisher {
    pub fn new(producer: FutureProducer) -> Self {
        Self { producer }
    }

    /// Build an idempotent producer for `brokers` (comma separated).
    pub fn connect(brokers: &str) -> OutboxResult<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("message.timeout.ms", DELIVERY_TIMEOUT.as_millis().to_string())
            .create()
            .map_err(|e| OutboxError::PublishFailed(format!("Kafka producer: {}", e)))?;
        Ok(Self::new(producer))
    }
}

#[async_trait]
impl OutboxPublisher for KafkaOutboxPublisher {
    async fn publish(&self, event: &OutboxEvent) -> OutboxResult<()> {
        let payload_str = serde_json::to_string(&event.payload)?;

        let event_id_str = event.id.to_string();
        let aggregate_id_str = event.aggregate_id.to_string();

        let mut headers = OwnedHeaders::new()
            .insert(Header {
                key: "event_type",
                value: Some(event.aggregate_type.as_bytes()),
            })
            .insert(Header {
                key: "event_id",
                value: Some(event_id_str.as_bytes()),
            });

        if let Some(cid) = event
            .metadata
            .as_ref()
            .and_then(|m| m.get("correlation_id"))
            .and_then(|v| v.as_str())
        {
            headers = headers.insert(Header {
                key: "correlation_id",
                value: Some(cid.as_bytes()),
            });
        }

        let record = FutureRecord::to(&event.event_type)
            .key(&aggregate_id_str)
            .payload(&payload_str)
            .headers(headers);

        self.producer
            .send(record, DELIVERY_TIMEOUT)
            .await
            .map_err(|(err, _)| OutboxError::PublishFailed(format!("Kafka publish failed: {}", err)))?;

        info!(
            event_id = %event.id,
            topic = %event.event_type,
            "Event published to Kafka"
        );

        Ok(())
    }
}

/// Background processor for publishing outbox events.
///
/// - Polls for due, unpublished events at a fixed interval
/// - Publishes each event, marking it published or failed
/// - A failed event is deferred by 2^retry_count seconds (capped at 5 minutes)
///   through its `next_attempt_at`, so it never delays the rest of the batch
/// - Events that reached `max_retries` are no longer fetched; they stay in the
///   table for manual intervention
pub struct OutboxProcessor<R: OutboxRepository, P: OutboxPublisher> {
    repository: Arc<R>,
    publisher: Arc<P>,
    batch_size: i32,
    poll_interval: Duration,
    max_retries: i32,
}

impl<R: OutboxRepository, P: OutboxPublisher> OutboxProcessor<R, P> {
    pub fn new(
        repository: Arc<R>,
        publisher: Arc<P>,
        batch_size: i32,
        poll_interval: Duration,
        max_retries: i32,
    ) -> Self {
        Self {
            repository,
            publisher,
            batch_size,
            poll_interval,
            max_retries,
        }
    }

    /// Run the polling loop forever. Spawn it as a background task.
    pub async fn start(&self) {
        info!(
            batch_size = self.batch_size,
            poll_interval_secs = self.poll_interval.as_secs(),
            max_retries = self.max_retries,
            "Outbox processor starting"
        );

        loop {
            match self.process_batch().await {
                Ok(count) if count > 0 => {
                    info!(published_count = count, "Published events from outbox")
                }
                Ok(_) => debug!("No events to publish"),
                Err(e) => error!(error = ?e, "Outbox processor error"),
            }

            if let Ok((pending, age)) = self.repository.pending_stats().await {
                if pending > 0 {
                    debug!(pending, oldest_age_secs = age, "Outbox backlog");
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Process a single batch and return the number of published events.
    pub async fn process_batch(&self) -> OutboxResult<usize> {
        self.process_batch_at(Utc::now()).await
    }

    /// Same as [`process_batch`](Self::process_batch) with an explicit clock.
    pub async fn process_batch_at(&self, now: DateTime<Utc>) -> OutboxResult<usize> {
        let events = self
            .repository
            .get_unpublished(self.batch_size, self.max_retries, now)
            .await?;
        let mut published_count = 0;

        for event in events {
            match self.publisher.publish(&event).await {
                Ok(()) => {
                    if let Err(e) = self.repository.mark_published(event.id).await {
                        // Delivered but still pending: it will be published again
                        error!(
                            event_id = %event.id,
                            error = ?e,
                            "Failed to mark event as published (event was delivered to Kafka)"
                        );
                    } else {
                        published_count += 1;
                    }
                }
                Err(e) => {
                    let attempts = event.retry_count + 1;
                    let backoff = calculate_backoff(attempts);
                    error!(
                        event_id = %event.id,
                        event_type = %event.event_type,
                        retry_count = attempts,
                        backoff_secs = backoff.as_secs(),
                        error = ?e,
                        "Failed to publish event"
                    );
                    if attempts >= self.max_retries {
                        warn!(
                            event_id = %event.id,
                            event_type = %event.event_type,
                            "Event exceeded max retries (requires manual intervention)"
                        );
                    }

                    let next_attempt_at = now + chrono::Duration::seconds(backoff.as_secs() as i64);
                    if let Err(mark_err) = self
                        .repository
                        .mark_failed(event.id, &e.to_string(), next_attempt_at)
                        .await
                    {
                        error!(event_id = %event.id, error = ?mark_err, "Failed to mark event as failed");
                    }
                }
            }
        }

        Ok(published_count)
    }
}

/// 2^retry_count seconds, capped at 5 minutes
fn calculate_backoff(retry_count: i32) -> Duration {
    let exp = retry_count.clamp(0, 16) as u32;
    Duration::from_secs(2u64.pow(exp).min(MAX_BACKOFF_SECS))
}
