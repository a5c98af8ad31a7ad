use crate::{Directory, DirectoryError, DirectoryUser, UserName};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Directory backed by a map; can be told to fail its next calls.
#[derive(Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<Uuid, DirectoryUser>>,
    failures: AtomicUsize,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: Uuid, name: &str, email: &str) {
        self.users.write().await.insert(
            id,
            DirectoryUser {
                id,
                name: name.to_string(),
                email: email.to_string(),
                created_at: Utc::now(),
            },
        );
    }

    /// Make the next `n` calls fail with a 503.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), DirectoryError> {
        match self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            Ok(_) => Err(DirectoryError::Status(503)),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn batch_resolve_names(&self, ids: &[Uuid]) -> Result<Vec<UserName>, DirectoryError> {
        self.check_available()?;
        let users = self.users.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| users.get(id))
            .map(|u| UserName {
                id: u.id,
                name: u.name.clone(),
            })
            .collect())
    }

    async fn batch_resolve_emails(&self, ids: &[Uuid]) -> Result<Vec<String>, DirectoryError> {
        self.check_available()?;
        let users = self.users.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| users.get(id))
            .map(|u| u.email.clone())
            .collect())
    }

    async fn resolve(&self, id: Uuid) -> Result<DirectoryUser, DirectoryError> {
        self.check_available()?;
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(DirectoryError::NotFound(id))
    }
}
