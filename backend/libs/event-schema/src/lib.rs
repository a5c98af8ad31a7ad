use chrono::{DateTime, Utc};
/// Event schemas for the Kafka topics shared by the Spectra services
///
/// Every record on the bus is an [`EventEnvelope`] wrapping one [`DomainEvent`].
/// The envelope carries a `schema_version` so consumers can reject payloads
/// produced by an incompatible publisher.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod events;
pub mod topics;

pub use events::{
    DomainEvent, NewCommentEvent, NewPostEvent, NewReactionEvent, RegistrationCodeEvent,
    UserDeletedEvent,
};
pub use topics::Topic;

/// Current schema version for all events
pub const SCHEMA_VERSION: u32 = 1;

/// Base event envelope for all Kafka messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    /// Unique event ID for idempotency and tracing
    pub event_id: Uuid,
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
    /// Schema version for compatibility checking
    pub schema_version: u32,
    /// Source service that generated the event
    pub source: String,
    /// Correlation ID for distributed tracing
    pub correlation_id: Option<Uuid>,
    /// Actual event payload
    pub data: T,
}

impl<T> EventEnvelope<T> {
    pub fn new(source: impl Into<String>, data: T) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            schema_version: SCHEMA_VERSION,
            source: source.into(),
            correlation_id: None,
            data,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// Reasons an inbound record cannot be turned into a [`DomainEvent`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported schema version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("event kind {kind} does not belong on topic {topic}")]
    TopicMismatch { topic: String, kind: &'static str },

    #[error("unknown topic {0}")]
    UnknownTopic(String),
}

/// Serialize an envelope to the JSON wire format
pub fn encode_envelope(envelope: &EventEnvelope<DomainEvent>) -> serde_json::Result<String> {
    serde_json::to_string(envelope)
}

/// Decode a record received on `topic`.
///
/// The envelope must parse, carry a compatible schema version, and hold an
/// event whose kind is routed to `topic`.
pub fn decode_envelope(
    topic: &str,
    payload: &[u8],
) -> Result<EventEnvelope<DomainEvent>, DecodeError> {
    let expected = Topic::parse(topic).ok_or_else(|| DecodeError::UnknownTopic(topic.to_string()))?;
    let envelope: EventEnvelope<DomainEvent> = serde_json::from_slice(payload)?;

    if !is_compatible(SCHEMA_VERSION, envelope.schema_version) {
        return Err(DecodeError::UnsupportedVersion {
            found: envelope.schema_version,
            expected: SCHEMA_VERSION,
        });
    }

    if envelope.data.topic() != expected {
        return Err(DecodeError::TopicMismatch {
            topic: topic.to_string(),
            kind: envelope.data.kind(),
        });
    }

    Ok(envelope)
}

pub fn is_compatible(current_version: u32, message_version: u32) -> bool {
    // Exact match until a second schema version exists
    current_version == message_version
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration_code() -> DomainEvent {
        DomainEvent::RegistrationCode(RegistrationCodeEvent {
            email: "a@x.com".to_string(),
            code: 482913,
        })
    }

    #[test]
    fn test_event_envelope_creation() {
        let envelope = EventEnvelope::new("identity-service", registration_code());
        assert_eq!(envelope.schema_version, SCHEMA_VERSION);
        assert_eq!(envelope.source, "identity-service");
        assert!(envelope.correlation_id.is_none());
    }

    #[test]
    fn test_decode_accepts_matching_topic() {
        let envelope = EventEnvelope::new("identity-service", registration_code());
        let wire = encode_envelope(&envelope).unwrap();

        let decoded = decode_envelope("registration-code", wire.as_bytes()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_decode_rejects_event_on_wrong_topic() {
        let envelope = EventEnvelope::new("identity-service", registration_code());
        let wire = encode_envelope(&envelope).unwrap();

        let err = decode_envelope("new-post", wire.as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::TopicMismatch { .. }));
    }

    #[test]
    fn test_decode_rejects_future_schema_version() {
        let mut envelope = EventEnvelope::new("identity-service", registration_code());
        envelope.schema_version = SCHEMA_VERSION + 1;
        let wire = encode_envelope(&envelope).unwrap();

        let err = decode_envelope("registration-code", wire.as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedVersion { .. }));
    }

    #[test]
    fn test_decode_rejects_garbage_and_unknown_topics() {
        assert!(matches!(
            decode_envelope("new-post", b"not json"),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            decode_envelope("user.events", b"{}"),
            Err(DecodeError::UnknownTopic(_))
        ));
    }

    #[test]
    fn test_version_compatibility() {
        assert!(is_compatible(SCHEMA_VERSION, SCHEMA_VERSION));
        assert!(!is_compatible(1, 2));
    }
}
