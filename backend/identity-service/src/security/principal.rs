use crate::db::UserRepository;
use actix_middleware::PrincipalLoader;
use async_trait::async_trait;
use crypto_core::Claims;
use std::sync::Arc;
use uuid::Uuid;

/// Caller identity resolved from a verified access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPrincipal {
    pub id: Uuid,
    pub email: String,
}

/// Loads the principal from the user store so that deleted or re-keyed
/// accounts stop authenticating before their tokens expire.
pub struct UserPrincipalLoader {
    users: Arc<dyn UserRepository>,
}

impl UserPrincipalLoader {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl PrincipalLoader for UserPrincipalLoader {
    type Principal = UserPrincipal;

    async fn load_principal(&self, claims: &Claims) -> Option<UserPrincipal> {
        match self.users.find_by_email(&claims.sub).await {
            Ok(Some(user)) if user.id == claims.id => Some(UserPrincipal {
                id: user.id,
                email: user.email,
            }),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Principal lookup failed");
                None
            }
        }
    }
}
