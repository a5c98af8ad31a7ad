//! Two-phase registration
//!
//! `register` parks the request and a six-digit code in the ephemeral store
//! under per-email keys and enqueues a `RegistrationCode` event. `confirm`
//! checks the code, persists the user and deletes both keys. Two concurrent
//! registrations for one email race last-write-wins on each key.

use crate::db::{NewUser, UserRepository};
use crate::error::{IdentityError, Result};
use crate::models::{PendingRegistration, UserResponse};
use crate::security::hash_password;
use crate::SERVICE_NAME;
use event_schema::{DomainEvent, RegistrationCodeEvent};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use redis_utils::EphemeralStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};
use transactional_outbox::{OutboxEvent, OutboxWriter};
use uuid::Uuid;

const PENDING_PREFIX: &str = "pending:user:";
const CODE_PREFIX: &str = "verify:email:";

pub fn pending_key(email: &str) -> String {
    format!("{}{}", PENDING_PREFIX, email)
}

pub fn code_key(email: &str) -> String {
    format!("{}{}", CODE_PREFIX, email)
}

/// Source of verification codes
pub trait CodeGenerator: Send + Sync {
    /// A code in `100000..=999999`
    fn next_code(&self) -> u32;
}

/// Uniform codes from a seedable RNG
pub struct RandomCodeGenerator {
    rng: Mutex<StdRng>,
}

impl RandomCodeGenerator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomCodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGenerator for RandomCodeGenerator {
    fn next_code(&self) -> u32 {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rng.gen_range(100_000..1_000_000)
    }
}

pub struct RegistrationService {
    users: Arc<dyn UserRepository>,
    store: Arc<dyn EphemeralStore>,
    outbox: Arc<dyn OutboxWriter>,
    codes: Arc<dyn CodeGenerator>,
    ttl: Duration,
}

impl RegistrationService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        store: Arc<dyn EphemeralStore>,
        outbox: Arc<dyn OutboxWriter>,
        codes: Arc<dyn CodeGenerator>,
        ttl: Duration,
    ) -> Self {
        Self {
            users,
            store,
            outbox,
            codes,
            ttl,
        }
    }

    /// Start a registration; the code is delivered out of band.
    pub async fn register(&self, request: PendingRegistration) -> Result<()> {
        let email = request.email.trim().to_string();

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(IdentityError::email_taken(&email));
        }

        let code = self.codes.next_code();
        let pending = PendingRegistration {
            email: email.clone(),
            ..request
        };

        self.store
            .set_ex(&pending_key(&email), &serde_json::to_string(&pending)?, self.ttl)
            .await?;
        self.store
            .set_ex(&code_key(&email), &code.to_string(), self.ttl)
            .await?;

        let event = DomainEvent::RegistrationCode(RegistrationCodeEvent {
            email: email.clone(),
            code,
        });
        let aggregate_id = Uuid::new_v5(&Uuid::NAMESPACE_URL, email.as_bytes());
        let outbox_event = OutboxEvent::from_domain_event(SERVICE_NAME, aggregate_id, &event)?;

        if let Err(e) = self.outbox.enqueue(&outbox_event).await {
            error!(email = %email, error = %e, "Failed to enqueue registration code event");
            return Err(e.into());
        }

        info!(email = %email, "Registration pending verification");
        Ok(())
    }

    /// Finish a registration with the emailed code.
    pub async fn confirm(&self, email: &str, code: u32) -> Result<UserResponse> {
        let email = email.trim();

        let stored = self.store.get(&code_key(email)).await?;
        if stored.and_then(|c| c.trim().parse::<u32>().ok()) != Some(code) {
            return Err(IdentityError::BadRequest("Invalid code".to_string()));
        }

        let payload = self
            .store
            .get(&pending_key(email))
            .await?
            .ok_or_else(|| IdentityError::BadRequest("Registration data missing".to_string()))?;
        let pending: PendingRegistration = serde_json::from_str(&payload)?;

        let user = self
            .users
            .create(NewUser {
                name: pending.name.trim().to_string(),
                email: pending.email.trim().to_string(),
                password_hash: hash_password(pending.password.trim())?,
            })
            .await?;

        // The user is committed; a failed delete only leaves keys for the TTL to reap
        for key in [code_key(email), pending_key(email)] {
            if let Err(e) = self.store.delete(&key).await {
                warn!(key = %key, error = %e, "Failed to delete registration key");
            }
        }

        info!(user_id = %user.id, "Registration confirmed");
        Ok(UserResponse::from(&user))
    }
}
