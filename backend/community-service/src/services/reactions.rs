use crate::db::CommunityRepository;
use crate::error::{CommunityError, Result};
use crate::events::EventFactory;
use crate::models::{Reaction, ReactionResponse, ReactionType};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct ReactionService {
    repo: Arc<dyn CommunityRepository>,
    events: EventFactory,
}

impl ReactionService {
    pub fn new(repo: Arc<dyn CommunityRepository>, events: EventFactory) -> Self {
        Self { repo, events }
    }

    /// React to a message; the message author is notified.
    pub async fn create(
        &self,
        user_id: Uuid,
        message_id: Uuid,
        reaction_type: ReactionType,
    ) -> Result<ReactionResponse> {
        let message = self
            .repo
            .find_message(message_id)
            .await?
            .ok_or_else(|| CommunityError::message_not_found(message_id))?;

        let reaction = Reaction {
            id: Uuid::new_v4(),
            message_id,
            author_id: user_id,
            reaction_type,
            created_at: Utc::now(),
        };
        let event = self.events.new_reaction(&message, &reaction)?;

        self.repo.insert_reaction(&reaction, &event).await?;
        info!(reaction_id = %reaction.id, message_id = %message_id, %reaction_type, "Reaction created");
        Ok(ReactionResponse::from(&reaction))
    }

    pub async fn list(&self, message_id: Uuid) -> Result<Vec<ReactionResponse>> {
        self.ensure_message(message_id).await?;
        let reactions = self.repo.list_reactions(message_id).await?;
        Ok(reactions.iter().map(ReactionResponse::from).collect())
    }

    pub async fn delete(&self, user_id: Uuid, message_id: Uuid, reaction_id: Uuid) -> Result<()> {
        self.ensure_message(message_id).await?;

        let reaction = self
            .repo
            .find_reaction(reaction_id)
            .await?
            .filter(|r| r.message_id == message_id)
            .ok_or_else(|| CommunityError::reaction_not_found(reaction_id))?;

        if reaction.author_id != user_id {
            return Err(CommunityError::BadRequest(
                "Only creator can delete a reaction".to_string(),
            ));
        }

        if !self.repo.delete_reaction(reaction_id).await? {
            return Err(CommunityError::reaction_not_found(reaction_id));
        }
        info!(reaction_id = %reaction_id, message_id = %message_id, "Reaction deleted");
        Ok(())
    }

    async fn ensure_message(&self, message_id: Uuid) -> Result<()> {
        match self.repo.find_message(message_id).await? {
            Some(_) => Ok(()),
            None => Err(CommunityError::message_not_found(message_id)),
        }
    }
}
