//! Cache-aside wrapper for single-message reads
//!
//! Cache failures never fail a request: a broken store degrades to a miss.

use crate::models::MessageResponse;
use redis_utils::EphemeralStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

pub fn message_key(id: Uuid) -> String {
    format!("messages:{}", id)
}

pub struct MessageCache {
    store: Arc<dyn EphemeralStore>,
    ttl: Duration,
}

impl MessageCache {
    pub fn new(store: Arc<dyn EphemeralStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn get(&self, id: Uuid) -> Option<MessageResponse> {
        let raw = match self.store.get(&message_key(id)).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(message_id = %id, error = %e, "Message cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(message) => {
                debug!(message_id = %id, "Message cache hit");
                Some(message)
            }
            Err(e) => {
                warn!(message_id = %id, error = %e, "Dropping undecodable cache entry");
                self.evict(id).await;
                None
            }
        }
    }

    pub async fn put(&self, message: &MessageResponse) {
        let raw = match serde_json::to_string(message) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "Failed to encode message for cache");
                return;
            }
        };

        if let Err(e) = self.store.set_ex(&message_key(message.id), &raw, self.ttl).await {
            warn!(message_id = %message.id, error = %e, "Message cache write failed");
        }
    }

    pub async fn evict(&self, id: Uuid) {
        if let Err(e) = self.store.delete(&message_key(id)).await {
            warn!(message_id = %id, error = %e, "Message cache eviction failed");
        }
    }

    pub async fn evict_all(&self, ids: &[Uuid]) {
        for id in ids {
            self.evict(*id).await;
        }
    }
}
