use super::{NewUser, UserRepository};
use crate::error::{IdentityError, Result};
use crate::models::User;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use transactional_outbox::{MemoryOutbox, OutboxWriter};
use uuid::Uuid;

/// In-process user store. The email index enforces uniqueness atomically.
pub struct InMemoryUserRepository {
    users: DashMap<Uuid, User>,
    emails: DashMap<String, Uuid>,
    outbox: Arc<MemoryOutbox>,
}

impl InMemoryUserRepository {
    pub fn new(outbox: Arc<MemoryOutbox>) -> Self {
        Self {
            users: DashMap::new(),
            emails: DashMap::new(),
            outbox,
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn sorted(mut users: Vec<User>) -> Vec<User> {
        users.sort_by_key(|u| u.created_at);
        users
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, new_user: NewUser) -> Result<User> {
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            created_at: Utc::now(),
        };

        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => return Err(IdentityError::email_taken(&user.email)),
            Entry::Vacant(slot) => {
                slot.insert(user.id);
            }
        }
        self.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let Some(id) = self.emails.get(email).map(|id| *id) else {
            return Ok(None);
        };
        self.find_by_id(id).await
    }

    async fn search(&self, name: Option<&str>, email: Option<&str>) -> Result<Vec<User>> {
        let users = self
            .users
            .iter()
            .filter(|u| {
                (name.is_none() && email.is_none())
                    || name == Some(u.name.as_str())
                    || email == Some(u.email.as_str())
            })
            .map(|u| u.clone())
            .collect();

        Ok(Self::sorted(users))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|u| u.clone()))
            .collect())
    }

    async fn update(&self, user: &User) -> Result<User> {
        let current = self
            .users
            .get(&user.id)
            .map(|u| u.clone())
            .ok_or_else(|| IdentityError::user_not_found(user.id))?;

        if current.email != user.email {
            match self.emails.entry(user.email.clone()) {
                Entry::Occupied(_) => return Err(IdentityError::email_taken(&user.email)),
                Entry::Vacant(slot) => {
                    slot.insert(user.id);
                }
            }
            self.emails.remove(&current.email);
        }
        self.users.insert(user.id, user.clone());

        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid, event: &transactional_outbox::OutboxEvent) -> Result<bool> {
        let Some((_, user)) = self.users.remove(&id) else {
            return Ok(false);
        };
        self.emails.remove(&user.email);
        self.outbox.enqueue(event).await?;
        Ok(true)
    }
}
