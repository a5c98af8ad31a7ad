//! Kafka side of the consumer: one `StreamConsumer` per topic, manual commits.

use crate::{process_payload, EventHandler, Outcome};
use event_schema::Topic;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Header, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::Offset;
use resilience::RetryConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Pause before a record left for redelivery is fetched again
const REDELIVERY_DELAY: Duration = Duration::from_secs(5);
const SEEK_TIMEOUT: Duration = Duration::from_secs(10);
const DLQ_SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),
}

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub brokers: String,
    pub group_id: String,
    pub retry: RetryConfig,
    /// Forward poison and permanently failing records to `<topic>.dlq`
    pub dead_letter: bool,
}

impl ConsumerConfig {
    pub fn new(brokers: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            group_id: group_id.into(),
            retry: RetryConfig::default(),
            dead_letter: true,
        }
    }
}

pub struct TopicConsumer<H: EventHandler + ?Sized> {
    consumer: StreamConsumer,
    topic: Topic,
    handler: Arc<H>,
    retry: RetryConfig,
    dead_letter: Option<FutureProducer>,
}

impl<H: EventHandler + ?Sized + 'static> TopicConsumer<H> {
    pub fn new(config: &ConsumerConfig, topic: Topic, handler: Arc<H>) -> Result<Self, ConsumerError> {
        // Offsets are committed by hand once a record is settled
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .set("session.timeout.ms", "30000")
            .set("heartbeat.interval.ms", "10000")
            .create()?;

        consumer.subscribe(&[topic.as_str()])?;

        let dead_letter = if config.dead_letter {
            Some(
                ClientConfig::new()
                    .set("bootstrap.servers", &config.brokers)
                    .set("message.timeout.ms", "5000")
                    .create::<FutureProducer>()?,
            )
        } else {
            None
        };

        Ok(Self {
            consumer,
            topic,
            handler,
            retry: config.retry.clone(),
            dead_letter,
        })
    }

    /// Consume until the task is aborted.
    pub async fn run(self) {
        info!(topic = %self.topic, "Consumer started");

        loop {
            let message = match self.consumer.recv().await {
                Ok(message) => message,
                Err(e) => {
                    warn!(topic = %self.topic, error = %e, "Kafka consumer error");
                    continue;
                }
            };

            let outcome = process_payload(
                self.handler.as_ref(),
                message.topic(),
                message.payload(),
                &self.retry,
            )
            .await;

            match outcome {
                Outcome::Handled => self.commit(&message),
                Outcome::DeadLetter(reason) => match self.forward_to_dlq(&message, &reason).await {
                    Ok(()) => self.commit(&message),
                    Err(e) => {
                        error!(topic = %self.topic, error = %e, "Dead-letter publish failed");
                        self.rewind(&message).await;
                    }
                },
                Outcome::Redeliver(_) => self.rewind(&message).await,
            }
        }
    }

    fn commit(&self, message: &BorrowedMessage<'_>) {
        if let Err(e) = self.consumer.commit_message(message, CommitMode::Async) {
            warn!(topic = %self.topic, offset = message.offset(), error = %e, "Failed to commit Kafka offset");
        }
    }

    async fn rewind(&self, message: &BorrowedMessage<'_>) {
        tokio::time::sleep(REDELIVERY_DELAY).await;
        if let Err(e) = self.consumer.seek(
            message.topic(),
            message.partition(),
            Offset::Offset(message.offset()),
            SEEK_TIMEOUT,
        ) {
            error!(
                topic = %self.topic,
                partition = message.partition(),
                offset = message.offset(),
                error = %e,
                "Failed to seek back; record will be redelivered after rebalance"
            );
        }
    }

    async fn forward_to_dlq(&self, message: &BorrowedMessage<'_>, reason: &str) -> Result<(), KafkaError> {
        let Some(producer) = &self.dead_letter else {
            warn!(topic = %self.topic, offset = message.offset(), reason, "Dropping unprocessable record");
            return Ok(());
        };

        let dlq_topic = self.topic.dead_letter();
        let mut record = FutureRecord::to(&dlq_topic)
            .payload(message.payload().unwrap_or_default())
            .headers(OwnedHeaders::new().insert(Header {
                key: "error",
                value: Some(reason.as_bytes()),
            }));
        if let Some(key) = message.key() {
            record = record.key(key);
        }

        producer
            .send(record, DLQ_SEND_TIMEOUT)
            .await
            .map_err(|(e, _)| e)?;

        warn!(topic = %self.topic, dlq_topic = %dlq_topic, reason, "Record forwarded to dead-letter topic");
        Ok(())
    }
}

/// Spawn one consumer task per topic, all sharing `handler`.
pub fn spawn_consumers<H>(
    config: &ConsumerConfig,
    topics: &[Topic],
    handler: Arc<H>,
) -> Result<Vec<JoinHandle<()>>, ConsumerError>
where
    H: EventHandler + ?Sized + 'static,
{
    topics
        .iter()
        .map(|topic| {
            let consumer = TopicConsumer::new(config, *topic, handler.clone())?;
            Ok(tokio::spawn(consumer.run()))
        })
        .collect()
}
