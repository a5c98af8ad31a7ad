use crate::db::CommunityRepository;
use async_trait::async_trait;
use event_consumer::{EventHandler, HandlerError};
use event_schema::{DomainEvent, EventEnvelope};
use std::sync::Arc;
use tracing::{debug, info};

/// Removes a deleted account's memberships from every spector.
///
/// Deleting by user id is idempotent: a redelivered event removes nothing.
pub struct MembershipCleanup {
    repo: Arc<dyn CommunityRepository>,
}

impl MembershipCleanup {
    pub fn new(repo: Arc<dyn CommunityRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl EventHandler for MembershipCleanup {
    async fn handle(&self, envelope: &EventEnvelope<DomainEvent>) -> Result<(), HandlerError> {
        let DomainEvent::UserDeleted(event) = &envelope.data else {
            debug!(kind = envelope.data.kind(), "Ignoring event");
            return Ok(());
        };

        let removed = self
            .repo
            .remove_user_everywhere(event.user_id)
            .await
            .map_err(|e| HandlerError::Retryable(e.to_string()))?;

        info!(
            event_id = %envelope.event_id,
            user_id = %event.user_id,
            removed,
            "Removed memberships of deleted user"
        );
        Ok(())
    }
}
