//! Token lifecycle: issue, verify, revoke, rotate
//!
//! Tokens are stateless. The only server-side state is a revocation marker
//! per refresh token, keyed by the SHA-256 of the raw token and living as
//! long as a refresh token can.

use crate::db::UserRepository;
use crate::error::{IdentityError, Result};
use crypto_core::hash::sha256_hex;
use crypto_core::{Claims, JwtCodec, JwtError, TokenPair, TokenType};
use redis_utils::EphemeralStore;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const BLACKLIST_PREFIX: &str = "blacklist:token:";

pub fn revocation_key(token: &str) -> String {
    format!("{}{}", BLACKLIST_PREFIX, sha256_hex(token))
}

fn invalid_refresh_token() -> IdentityError {
    IdentityError::BadRequest("Invalid refresh token".to_string())
}

fn blacklisted() -> IdentityError {
    IdentityError::BadRequest("Token is in blacklist".to_string())
}

pub struct TokenService {
    codec: Arc<JwtCodec>,
    store: Arc<dyn EphemeralStore>,
    users: Arc<dyn UserRepository>,
}

impl TokenService {
    pub fn new(
        codec: Arc<JwtCodec>,
        store: Arc<dyn EphemeralStore>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            codec,
            store,
            users,
        }
    }

    pub fn codec(&self) -> Arc<JwtCodec> {
        self.codec.clone()
    }

    pub fn issue(&self, email: &str, user_id: Uuid) -> Result<TokenPair> {
        Ok(self.codec.issue_pair(email, user_id)?)
    }

    pub fn verify(&self, token: &str) -> std::result::Result<Claims, JwtError> {
        self.codec.decode(token)
    }

    pub async fn revoke(&self, token: &str) -> Result<()> {
        let ttl = self.codec.config().refresh_ttl;
        self.store.set_ex(&revocation_key(token), "1", ttl).await?;
        debug!(ttl_secs = ttl.as_secs(), "Refresh token revoked");
        Ok(())
    }

    pub async fn is_revoked(&self, token: &str) -> Result<bool> {
        Ok(self.store.exists(&revocation_key(token)).await?)
    }

    fn verify_refresh(&self, token: &str) -> Result<Claims> {
        match self.verify(token) {
            Ok(claims) if claims.token_type == TokenType::Refresh => Ok(claims),
            Ok(_) => Err(invalid_refresh_token()),
            Err(e) => {
                debug!(error = %e, "Refresh token rejected");
                Err(invalid_refresh_token())
            }
        }
    }

    /// Exchange a refresh token for a new pair, revoking the one presented.
    pub async fn refresh(&self, token: &str) -> Result<TokenPair> {
        let claims = self.verify_refresh(token)?;

        if self.is_revoked(token).await? {
            return Err(blacklisted());
        }

        match self.users.find_by_email(&claims.sub).await? {
            Some(user) if user.id == claims.id => {}
            _ => return Err(invalid_refresh_token()),
        }

        // Claiming the marker atomically lets only one concurrent refresh win
        let ttl = self.codec.config().refresh_ttl;
        if !self.store.set_nx_ex(&revocation_key(token), "1", ttl).await? {
            return Err(blacklisted());
        }

        info!(user_id = %claims.id, "Refresh token rotated");
        self.issue(&claims.sub, claims.id)
    }

    pub async fn logout(&self, token: &str) -> Result<()> {
        let claims = self.verify_refresh(token)?;
        self.revoke(token).await?;
        info!(user_id = %claims.id, "User logged out");
        Ok(())
    }
}
