use super::CommunityRepository;
use crate::error::{CommunityError, Result};
use crate::models::{Message, Reaction, Spector, SubscriberRole};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use transactional_outbox::{MemoryOutbox, OutboxEvent, OutboxWriter};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    spectors: HashMap<Uuid, Spector>,
    members: HashMap<(Uuid, Uuid), SubscriberRole>,
    messages: HashMap<Uuid, Message>,
    reactions: HashMap<Uuid, Reaction>,
    deleted_users: HashSet<Uuid>,
}

impl Tables {
    /// `root` and every transitive reply to it
    fn thread(&self, root: Uuid) -> Vec<Uuid> {
        if !self.messages.contains_key(&root) {
            return Vec::new();
        }
        let mut ids = vec![root];
        let mut cursor = 0;
        while cursor < ids.len() {
            let parent = ids[cursor];
            ids.extend(
                self.messages
                    .values()
                    .filter(|m| m.parent_id == Some(parent))
                    .map(|m| m.id),
            );
            cursor += 1;
        }
        ids
    }

    fn remove_messages(&mut self, ids: &[Uuid]) {
        let doomed: HashSet<&Uuid> = ids.iter().collect();
        self.messages.retain(|id, _| !doomed.contains(id));
        self.reactions.retain(|_, r| !doomed.contains(&r.message_id));
    }
}

/// In-process repository mirroring the Postgres cascades. Backs tests and
/// local runs.
pub struct InMemoryCommunityRepository {
    tables: RwLock<Tables>,
    outbox: Arc<MemoryOutbox>,
}

impl InMemoryCommunityRepository {
    pub fn new(outbox: Arc<MemoryOutbox>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            outbox,
        }
    }

    /// Every (spector, role) the user belongs to
    pub async fn memberships_of(&self, user_id: Uuid) -> Vec<(Uuid, SubscriberRole)> {
        let tables = self.tables.read().await;
        tables
            .members
            .iter()
            .filter(|((_, user), _)| *user == user_id)
            .map(|((spector, _), role)| (*spector, *role))
            .collect()
    }

    pub async fn reaction_count(&self) -> usize {
        self.tables.read().await.reactions.len()
    }
}

#[async_trait]
impl CommunityRepository for InMemoryCommunityRepository {
    async fn create_spector(&self, spector: &Spector, owner_id: Uuid) -> Result<Spector> {
        let mut tables = self.tables.write().await;
        if tables.deleted_users.contains(&owner_id) {
            return Err(CommunityError::account_deleted(owner_id));
        }
        if tables.spectors.values().any(|s| s.name == spector.name) {
            return Err(CommunityError::spector_name_taken(&spector.name));
        }
        tables.spectors.insert(spector.id, spector.clone());
        tables
            .members
            .insert((spector.id, owner_id), SubscriberRole::Owner);
        Ok(spector.clone())
    }

    async fn find_spector(&self, id: Uuid) -> Result<Option<Spector>> {
        Ok(self.tables.read().await.spectors.get(&id).cloned())
    }

    async fn list_spectors(&self, name: Option<&str>) -> Result<Vec<Spector>> {
        let tables = self.tables.read().await;
        let mut spectors: Vec<Spector> = tables
            .spectors
            .values()
            .filter(|s| name.map_or(true, |n| s.name == n))
            .cloned()
            .collect();
        spectors.sort_by_key(|s| s.created_at);
        Ok(spectors)
    }

    async fn update_spector(&self, spector: &Spector) -> Result<Spector> {
        let mut tables = self.tables.write().await;
        if tables
            .spectors
            .values()
            .any(|s| s.name == spector.name && s.id != spector.id)
        {
            return Err(CommunityError::spector_name_taken(&spector.name));
        }
        let slot = tables
            .spectors
            .get_mut(&spector.id)
            .ok_or_else(|| CommunityError::spector_not_found(spector.id))?;
        *slot = spector.clone();
        Ok(spector.clone())
    }

    async fn delete_spector(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.spectors.remove(&id).is_none() {
            return Ok(false);
        }
        tables.members.retain(|(spector, _), _| *spector != id);
        let doomed: Vec<Uuid> = tables
            .messages
            .values()
            .filter(|m| m.spector_id == id)
            .map(|m| m.id)
            .collect();
        tables.remove_messages(&doomed);
        Ok(true)
    }

    async fn role_of(&self, spector_id: Uuid, user_id: Uuid) -> Result<Option<SubscriberRole>> {
        Ok(self
            .tables
            .read()
            .await
            .members
            .get(&(spector_id, user_id))
            .copied())
    }

    async fn add_subscriber(&self, spector_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if !tables.spectors.contains_key(&spector_id) {
            return Err(CommunityError::spector_not_found(spector_id));
        }
        if tables.deleted_users.contains(&user_id) {
            return Err(CommunityError::account_deleted(user_id));
        }
        match tables.members.entry((spector_id, user_id)) {
            std::collections::hash_map::Entry::Occupied(_) => Ok(false),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(SubscriberRole::Subscriber);
                Ok(true)
            }
        }
    }

    async fn remove_subscriber(&self, spector_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self
            .tables
            .write()
            .await
            .members
            .remove(&(spector_id, user_id))
            .is_some())
    }

    async fn member_ids(&self, spector_id: Uuid) -> Result<Vec<Uuid>> {
        let tables = self.tables.read().await;
        Ok(tables
            .members
            .keys()
            .filter(|(spector, _)| *spector == spector_id)
            .map(|(_, user)| *user)
            .collect())
    }

    async fn remove_user_everywhere(&self, user_id: Uuid) -> Result<u64> {
        let mut tables = self.tables.write().await;
        tables.deleted_users.insert(user_id);
        let before = tables.members.len();
        tables.members.retain(|(_, user), _| *user != user_id);
        Ok((before - tables.members.len()) as u64)
    }

    async fn insert_message(&self, message: &Message, event: Option<&OutboxEvent>) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.spectors.contains_key(&message.spector_id) {
            return Err(CommunityError::spector_not_found(message.spector_id));
        }
        if let Some(event) = event {
            self.outbox.enqueue(event).await?;
        }
        tables.messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn find_message(&self, id: Uuid) -> Result<Option<Message>> {
        Ok(self.tables.read().await.messages.get(&id).cloned())
    }

    async fn list_messages(
        &self,
        spector_id: Option<Uuid>,
        parent_id: Option<Uuid>,
    ) -> Result<Vec<Message>> {
        let tables = self.tables.read().await;
        let mut messages: Vec<Message> = tables
            .messages
            .values()
            .filter(|m| {
                (spector_id.is_none() && parent_id.is_none())
                    || spector_id == Some(m.spector_id)
                    || (parent_id.is_some() && parent_id == m.parent_id)
            })
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn update_message_body(&self, id: Uuid, body: &str) -> Result<Option<Message>> {
        let mut tables = self.tables.write().await;
        Ok(tables.messages.get_mut(&id).map(|message| {
            message.body = body.to_string();
            message.updated_at = Utc::now();
            message.clone()
        }))
    }

    async fn delete_message(&self, id: Uuid) -> Result<Vec<Uuid>> {
        let mut tables = self.tables.write().await;
        let ids = tables.thread(id);
        tables.remove_messages(&ids);
        Ok(ids)
    }

    async fn insert_reaction(&self, reaction: &Reaction, event: &OutboxEvent) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.messages.contains_key(&reaction.message_id) {
            return Err(CommunityError::message_not_found(reaction.message_id));
        }
        self.outbox.enqueue(event).await?;
        tables.reactions.insert(reaction.id, reaction.clone());
        Ok(())
    }

    async fn find_reaction(&self, id: Uuid) -> Result<Option<Reaction>> {
        Ok(self.tables.read().await.reactions.get(&id).cloned())
    }

    async fn list_reactions(&self, message_id: Uuid) -> Result<Vec<Reaction>> {
        let tables = self.tables.read().await;
        let mut reactions: Vec<Reaction> = tables
            .reactions
            .values()
            .filter(|r| r.message_id == message_id)
            .cloned()
            .collect();
        reactions.sort_by_key(|r| r.created_at);
        Ok(reactions)
    }

    async fn delete_reaction(&self, id: Uuid) -> Result<bool> {
        Ok(self.tables.write().await.reactions.remove(&id).is_some())
    }
}
