use crate::db::UserRepository;
use crate::error::{IdentityError, Result};
use crate::models::{
    AuthenticateRequest, SearchQuery, UpdateUserRequest, UserInternalResponse, UserResponse,
};
use crate::security::{hash_password, verify_password};
use crate::services::TokenService;
use crate::SERVICE_NAME;
use crypto_core::TokenPair;
use event_schema::{DomainEvent, UserDeletedEvent};
use std::sync::Arc;
use tracing::info;
use transactional_outbox::OutboxEvent;
use uuid::Uuid;

fn invalid_credentials() -> IdentityError {
    IdentityError::NotFound("invalid credentials".to_string())
}

/// Reject a present-but-blank property
fn non_blank(property: &str, value: Option<&str>) -> Result<Option<String>> {
    match value.map(str::trim) {
        Some("") => Err(IdentityError::BadRequest(format!(
            "Property \"{}\" cannot be empty string",
            property
        ))),
        other => Ok(other.map(str::to_string)),
    }
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<TokenService>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, tokens: Arc<TokenService>) -> Self {
        Self { users, tokens }
    }

    pub async fn authenticate(&self, request: AuthenticateRequest) -> Result<TokenPair> {
        let user = self
            .users
            .find_by_email(request.email.trim())
            .await?
            .ok_or_else(invalid_credentials)?;

        if !verify_password(request.password.trim(), &user.password_hash)? {
            return Err(invalid_credentials());
        }

        info!(user_id = %user.id, "User authenticated");
        self.tokens.issue(&user.email, user.id)
    }

    pub async fn find(&self, id: Uuid) -> Result<UserResponse> {
        self.users
            .find_by_id(id)
            .await?
            .map(|u| UserResponse::from(&u))
            .ok_or_else(|| IdentityError::user_not_found(id))
    }

    pub async fn search(&self, query: SearchQuery) -> Result<Vec<UserResponse>> {
        let users = self
            .users
            .search(query.name.as_deref(), query.email.as_deref())
            .await?;
        Ok(users.iter().map(UserResponse::from).collect())
    }

    pub async fn update(&self, id: Uuid, request: UpdateUserRequest) -> Result<UserResponse> {
        if request.name.is_none() && request.email.is_none() && request.password.is_none() {
            return Err(IdentityError::BadRequest(
                "At least one property must be specified".to_string(),
            ));
        }

        let name = non_blank("name", request.name.as_deref())?;
        let email = non_blank("email", request.email.as_deref())?;
        let password = non_blank("password", request.password.as_deref())?;

        let mut user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| IdentityError::user_not_found(id))?;

        if let Some(email) = email {
            if email != user.email {
                if let Some(owner) = self.users.find_by_email(&email).await? {
                    if owner.id != id {
                        return Err(IdentityError::email_taken(&email));
                    }
                }
                user.email = email;
            }
        }
        if let Some(name) = name {
            user.name = name;
        }
        if let Some(password) = password {
            user.password_hash = hash_password(&password)?;
        }

        let updated = self.users.update(&user).await?;
        info!(user_id = %id, "User updated");
        Ok(UserResponse::from(&updated))
    }

    /// Delete the account and enqueue `UserDeleted` in the same unit of work.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let event = DomainEvent::UserDeleted(UserDeletedEvent { user_id: id });
        let outbox_event = OutboxEvent::from_domain_event(SERVICE_NAME, id, &event)?;

        if !self.users.delete(id, &outbox_event).await? {
            return Err(IdentityError::user_not_found(id));
        }

        info!(user_id = %id, "User deleted");
        Ok(())
    }

    pub async fn batch(&self, ids: &[Uuid]) -> Result<Vec<UserInternalResponse>> {
        let users = self.users.find_by_ids(ids).await?;
        Ok(users
            .into_iter()
            .map(|u| UserInternalResponse {
                id: u.id,
                name: u.name,
            })
            .collect())
    }

    pub async fn batch_email(&self, ids: &[Uuid]) -> Result<Vec<String>> {
        let users = self.users.find_by_ids(ids).await?;
        Ok(users.into_iter().map(|u| u.email).collect())
    }
}
