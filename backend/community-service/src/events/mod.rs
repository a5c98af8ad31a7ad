//! Outbound domain events and the inbound `UserDeleted` consumer

pub mod membership_cleanup;

pub use membership_cleanup::MembershipCleanup;

use crate::error::Result;
use crate::models::{Message, Reaction, Spector};
use crate::SERVICE_NAME;
use event_schema::{DomainEvent, NewCommentEvent, NewPostEvent, NewReactionEvent};
use transactional_outbox::OutboxEvent;
use uuid::Uuid;

/// Builds the links and outbox rows for community events
#[derive(Debug, Clone)]
pub struct EventFactory {
    message_link_base: String,
}

impl EventFactory {
    pub fn new(message_link_base: impl Into<String>) -> Self {
        Self {
            message_link_base: message_link_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn message_link(&self, id: Uuid) -> String {
        format!("{}/{}", self.message_link_base, id)
    }

    /// `NewPost` for every member except the author
    pub fn new_post(&self, spector: &Spector, post: &Message, members: &[Uuid]) -> Result<OutboxEvent> {
        let event = DomainEvent::NewPost(NewPostEvent {
            spector_name: spector.name.clone(),
            post_link: self.message_link(post.id),
            subscriber_ids: members
                .iter()
                .copied()
                .filter(|id| *id != post.author_id)
                .collect(),
        });
        Ok(OutboxEvent::from_domain_event(SERVICE_NAME, spector.id, &event)?)
    }

    /// `NewComment` addressed to the parent's author, or `None` on a self-reply
    pub fn new_comment(
        &self,
        spector: &Spector,
        parent: &Message,
        reply: &Message,
    ) -> Result<Option<OutboxEvent>> {
        if parent.author_id == reply.author_id {
            return Ok(None);
        }
        let event = DomainEvent::NewComment(NewCommentEvent {
            spector_name: spector.name.clone(),
            message_link: self.message_link(parent.id),
            comment_link: self.message_link(reply.id),
            author_user_id: parent.author_id,
        });
        Ok(Some(OutboxEvent::from_domain_event(
            SERVICE_NAME,
            spector.id,
            &event,
        )?))
    }

    pub fn new_reaction(&self, message: &Message, reaction: &Reaction) -> Result<OutboxEvent> {
        let event = DomainEvent::NewReaction(NewReactionEvent {
            message_link: self.message_link(message.id),
            reaction_type: reaction.reaction_type.to_string(),
            target_user_id: message.author_id,
            reacting_user_id: reaction.author_id,
        });
        Ok(OutboxEvent::from_domain_event(SERVICE_NAME, message.id, &event)?)
    }
}
