use actix_middleware::PrincipalLoader;
use async_trait::async_trait;
use crypto_core::Claims;
use uuid::Uuid;

/// Caller identity taken from verified access-token claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
}

/// Builds the principal from the claims alone; this service keeps no user store.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimsPrincipalLoader;

#[async_trait]
impl PrincipalLoader for ClaimsPrincipalLoader {
    type Principal = Principal;

    async fn load_principal(&self, claims: &Claims) -> Option<Principal> {
        Some(Principal {
            id: claims.id,
            email: claims.sub.clone(),
        })
    }
}
