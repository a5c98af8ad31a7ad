use crate::db::CommunityRepository;
use crate::error::{CommunityError, Result};
use crate::models::{Spector, SpectorRequest, SubscriberRole};
use crate::services::MessageCache;
use chrono::Utc;
use directory_client::{Directory, DirectoryError, UserName};
use resilience::{with_retry_if, RetryConfig};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct SpectorService {
    repo: Arc<dyn CommunityRepository>,
    directory: Arc<dyn Directory>,
    cache: Arc<MessageCache>,
}

impl SpectorService {
    pub fn new(
        repo: Arc<dyn CommunityRepository>,
        directory: Arc<dyn Directory>,
        cache: Arc<MessageCache>,
    ) -> Self {
        Self {
            repo,
            directory,
            cache,
        }
    }

    /// Create a spector owned by `owner_id`.
    pub async fn create(&self, owner_id: Uuid, request: SpectorRequest) -> Result<Spector> {
        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                CommunityError::BadRequest("Property \"name\" must be specified".to_string())
            })?;

        let spector = Spector {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: request
                .description
                .map(|d| d.trim().to_string())
                .unwrap_or_default(),
            created_at: Utc::now(),
        };

        let spector = self.repo.create_spector(&spector, owner_id).await?;
        info!(spector_id = %spector.id, owner_id = %owner_id, "Spector created");
        Ok(spector)
    }

    pub async fn list(&self, name: Option<&str>) -> Result<Vec<Spector>> {
        self.repo.list_spectors(name.map(str::trim)).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Spector> {
        self.repo
            .find_spector(id)
            .await?
            .ok_or_else(|| CommunityError::spector_not_found(id))
    }

    pub async fn update(&self, user_id: Uuid, id: Uuid, request: SpectorRequest) -> Result<Spector> {
        let mut spector = self.get(id).await?;
        self.require_owner(user_id, id).await?;

        if request.name.is_none() && request.description.is_none() {
            return Err(CommunityError::BadRequest(
                "At least one property must be changed".to_string(),
            ));
        }

        if let Some(name) = request.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(CommunityError::BadRequest(
                    "Property \"name\" cannot be empty string".to_string(),
                ));
            }
            spector.name = name.to_string();
        }
        if let Some(description) = request.description {
            spector.description = description.trim().to_string();
        }

        let spector = self.repo.update_spector(&spector).await?;
        info!(spector_id = %id, "Spector updated");
        Ok(spector)
    }

    /// Delete a spector with everything in it. Only its owner may do this.
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        self.get(id).await?;
        self.require_owner(user_id, id).await?;

        let messages = self.repo.list_messages(Some(id), None).await?;
        if !self.repo.delete_spector(id).await? {
            return Err(CommunityError::spector_not_found(id));
        }

        let ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();
        self.cache.evict_all(&ids).await;

        info!(spector_id = %id, messages = ids.len(), "Spector deleted");
        Ok(())
    }

    /// Join as SUBSCRIBER. Joining twice is not an error.
    pub async fn subscribe(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        self.get(id).await?;
        if self.repo.add_subscriber(id, user_id).await? {
            info!(spector_id = %id, user_id = %user_id, "Subscribed");
        }
        Ok(())
    }

    pub async fn unsubscribe(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        self.get(id).await?;
        if self.repo.remove_subscriber(id, user_id).await? {
            info!(spector_id = %id, user_id = %user_id, "Unsubscribed");
        }
        Ok(())
    }

    /// Members of the spector with their display names.
    pub async fn subscribers(&self, id: Uuid) -> Result<Vec<UserName>> {
        self.get(id).await?;
        let ids = self.repo.member_ids(id).await?;

        let names = with_retry_if(
            RetryConfig::default(),
            DirectoryError::is_retryable,
            || self.directory.batch_resolve_names(&ids),
        )
        .await
        .map_err(|e| CommunityError::from(e.into_inner()))?;

        Ok(names)
    }

    async fn require_owner(&self, user_id: Uuid, spector_id: Uuid) -> Result<()> {
        match self.repo.role_of(spector_id, user_id).await? {
            Some(SubscriberRole::Owner) => Ok(()),
            _ => Err(CommunityError::not_owner(user_id, spector_id)),
        }
    }
}
