use crate::db::CommunityRepository;
use crate::error::{CommunityError, Result};
use crate::events::EventFactory;
use crate::models::{CreateMessageRequest, Message, MessageResponse, SubscriberRole};
use crate::services::MessageCache;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct MessageService {
    repo: Arc<dyn CommunityRepository>,
    cache: Arc<MessageCache>,
    events: EventFactory,
}

impl MessageService {
    pub fn new(
        repo: Arc<dyn CommunityRepository>,
        cache: Arc<MessageCache>,
        events: EventFactory,
    ) -> Self {
        Self {
            repo,
            cache,
            events,
        }
    }

    /// Post or reply.
    ///
    /// Only the spector's owner may start a thread; anyone authenticated may
    /// reply to a message of the same spector. The notification for the post or
    /// reply is written together with the message.
    pub async fn create(
        &self,
        user_id: Uuid,
        request: CreateMessageRequest,
    ) -> Result<MessageResponse> {
        let spector = self
            .repo
            .find_spector(request.spector_id)
            .await?
            .ok_or_else(|| CommunityError::spector_not_found(request.spector_id))?;

        let parent = match request.parent_message_id {
            Some(parent_id) => {
                let parent = self.repo.find_message(parent_id).await?.ok_or_else(|| {
                    CommunityError::NotFound(format!(
                        "Parent message with id \"{}\" doesn't exist",
                        parent_id
                    ))
                })?;
                if parent.spector_id != spector.id {
                    return Err(CommunityError::BadRequest(
                        "There is no parent message with this id in this spector".to_string(),
                    ));
                }
                Some(parent)
            }
            None => {
                if self.repo.role_of(spector.id, user_id).await? != Some(SubscriberRole::Owner) {
                    return Err(CommunityError::not_owner(user_id, spector.id));
                }
                None
            }
        };

        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4(),
            spector_id: spector.id,
            parent_id: parent.as_ref().map(|p| p.id),
            author_id: user_id,
            body: request.body,
            created_at: now,
            updated_at: now,
        };

        let event = match &parent {
            None => {
                let members = self.repo.member_ids(spector.id).await?;
                Some(self.events.new_post(&spector, &message, &members)?)
            }
            Some(parent) => self.events.new_comment(&spector, parent, &message)?,
        };

        self.repo.insert_message(&message, event.as_ref()).await?;
        info!(
            message_id = %message.id,
            spector_id = %spector.id,
            reply = parent.is_some(),
            notified = event.is_some(),
            "Message created"
        );
        Ok(MessageResponse::from(&message))
    }

    pub async fn list(
        &self,
        spector_id: Option<Uuid>,
        parent_id: Option<Uuid>,
    ) -> Result<Vec<MessageResponse>> {
        let messages = self.repo.list_messages(spector_id, parent_id).await?;
        Ok(messages.iter().map(MessageResponse::from).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<MessageResponse> {
        if let Some(cached) = self.cache.get(id).await {
            return Ok(cached);
        }

        let message = self.find(id).await?;
        let response = MessageResponse::from(&message);
        self.cache.put(&response).await;
        Ok(response)
    }

    pub async fn update(&self, user_id: Uuid, id: Uuid, body: String) -> Result<MessageResponse> {
        let message = self.find(id).await?;
        if message.author_id != user_id {
            return Err(CommunityError::BadRequest(
                "Only creator can edit a message".to_string(),
            ));
        }

        let updated = self
            .repo
            .update_message_body(id, &body)
            .await?
            .ok_or_else(|| CommunityError::message_not_found(id))?;

        // Evict rather than overwrite: concurrent edits may finish out of order
        self.cache.evict(id).await;
        info!(message_id = %id, "Message updated");
        Ok(MessageResponse::from(&updated))
    }

    /// Delete a message together with its replies.
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        let message = self.find(id).await?;
        if message.author_id != user_id {
            return Err(CommunityError::BadRequest(
                "Only creator can delete a message".to_string(),
            ));
        }

        let removed = self.repo.delete_message(id).await?;
        if removed.is_empty() {
            return Err(CommunityError::message_not_found(id));
        }
        self.cache.evict_all(&removed).await;

        info!(message_id = %id, removed = removed.len(), "Message deleted");
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Message> {
        self.repo
            .find_message(id)
            .await?
            .ok_or_else(|| CommunityError::message_not_found(id))
    }
}
