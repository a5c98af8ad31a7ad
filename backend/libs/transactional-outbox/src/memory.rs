//! In-process outbox used by tests and local runs without Postgres.

use crate::{OutboxError, OutboxEvent, OutboxRepository, OutboxResult, OutboxWriter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_schema::{DomainEvent, EventEnvelope};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryOutbox {
    events: Mutex<Vec<OutboxEvent>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored event, published or not.
    pub async fn events(&self) -> Vec<OutboxEvent> {
        self.events.lock().await.clone()
    }

    /// Remove and return every unpublished event's envelope, oldest first.
    pub async fn drain(&self) -> OutboxResult<Vec<EventEnvelope<DomainEvent>>> {
        let mut events = self.events.lock().await;
        let (pending, published): (Vec<_>, Vec<_>) =
            events.drain(..).partition(|e| e.published_at.is_none());
        *events = published;
        pending.iter().map(OutboxEvent::envelope).collect()
    }
}

#[async_trait]
impl OutboxWriter for MemoryOutbox {
    async fn enqueue(&self, event: &OutboxEvent) -> OutboxResult<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

#[async_trait]
impl OutboxRepository for MemoryOutbox {
    async fn get_unpublished(
        &self,
        limit: i32,
        max_retries: i32,
        now: DateTime<Utc>,
    ) -> OutboxResult<Vec<OutboxEvent>> {
        let events = self.events.lock().await;
        Ok(events
            .iter()
            .filter(|e| e.published_at.is_none() && e.retry_count < max_retries)
            .filter(|e| e.next_attempt_at.map_or(true, |at| at <= now))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn mark_published(&self, event_id: Uuid) -> OutboxResult<()> {
        let mut events = self.events.lock().await;
        let event = events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or(OutboxError::EventNotFound(event_id))?;
        event.published_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_failed(
        &self,
        event_id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> OutboxResult<()> {
        let mut events = self.events.lock().await;
        let event = events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or(OutboxError::EventNotFound(event_id))?;
        event.retry_count += 1;
        event.last_error = Some(error.to_string());
        event.next_attempt_at = Some(next_attempt_at);
        Ok(())
    }

    async fn pending_stats(&self) -> OutboxResult<(i64, i64)> {
        let events = self.events.lock().await;
        let pending: Vec<_> = events.iter().filter(|e| e.published_at.is_none()).collect();
        let age = pending
            .iter()
            .map(|e| e.created_at)
            .min()
            .map(|oldest| (Utc::now() - oldest).num_seconds())
            .unwrap_or(0);
        Ok((pending.len() as i64, age))
    }
}
