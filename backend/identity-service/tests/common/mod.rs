#![allow(dead_code)]

use crypto_core::{JwtCodec, JwtConfig, JwtKeys};
use event_schema::{DomainEvent, RegistrationCodeEvent};
use identity_service::db::InMemoryUserRepository;
use identity_service::services::CodeGenerator;
use identity_service::state::Dependencies;
use identity_service::AppState;
use redis_utils::MemoryStore;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use transactional_outbox::MemoryOutbox;

pub const SECRET: &[u8] = b"identity-tests-secret-that-is-long-enough-for-hs512";
pub const INTERNAL_KEY: &str = "internal-test-key";
pub const REGISTRATION_TTL: Duration = Duration::from_secs(300);

/// Hands out scripted codes, then repeats the last one
pub struct ScriptedCodes(Mutex<VecDeque<u32>>);

impl ScriptedCodes {
    pub fn new(codes: &[u32]) -> Self {
        Self(Mutex::new(codes.iter().copied().collect()))
    }
}

impl CodeGenerator for ScriptedCodes {
    fn next_code(&self) -> u32 {
        let mut codes = self.0.lock().unwrap();
        if codes.len() > 1 {
            codes.pop_front().unwrap()
        } else {
            codes.front().copied().unwrap_or(100_000)
        }
    }
}

pub struct Harness {
    pub users: Arc<InMemoryUserRepository>,
    pub store: Arc<MemoryStore>,
    pub outbox: Arc<MemoryOutbox>,
    pub codec: Arc<JwtCodec>,
    pub state: AppState,
}

impl Harness {
    pub fn new(codes: &[u32]) -> Self {
        let outbox = Arc::new(MemoryOutbox::new());
        let users = Arc::new(InMemoryUserRepository::new(outbox.clone()));
        let store = Arc::new(MemoryStore::new());
        let codec = Arc::new(
            JwtCodec::new(JwtKeys::hmac(SECRET).unwrap(), JwtConfig::default()).unwrap(),
        );

        let state = AppState::new(Dependencies {
            users: users.clone(),
            store: store.clone(),
            outbox: outbox.clone(),
            codes: Arc::new(ScriptedCodes::new(codes)),
            codec: codec.clone(),
            registration_ttl: REGISTRATION_TTL,
            internal_api_key: Some(INTERNAL_KEY.to_string()),
        });

        Self {
            users,
            store,
            outbox,
            codec,
            state,
        }
    }

    /// Registration codes emitted since the last call
    pub async fn emitted_codes(&self) -> Vec<RegistrationCodeEvent> {
        self.outbox
            .drain()
            .await
            .unwrap()
            .into_iter()
            .filter_map(|envelope| match envelope.data {
                DomainEvent::RegistrationCode(event) => Some(event),
                _ => None,
            })
            .collect()
    }
}
