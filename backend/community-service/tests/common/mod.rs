#![allow(dead_code)]

use community_service::db::InMemoryCommunityRepository;
use community_service::state::Dependencies;
use community_service::AppState;
use crypto_core::{JwtCodec, JwtConfig, JwtKeys};
use directory_client::InMemoryDirectory;
use event_schema::DomainEvent;
use redis_utils::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use transactional_outbox::MemoryOutbox;
use uuid::Uuid;

pub const SECRET: &[u8] = b"community-tests-secret-that-is-long-enough-for-hs512";
pub const LINK_BASE: &str = "http://localhost:8080/api/messages";

pub struct Harness {
    pub repo: Arc<InMemoryCommunityRepository>,
    pub store: Arc<MemoryStore>,
    pub outbox: Arc<MemoryOutbox>,
    pub directory: Arc<InMemoryDirectory>,
    pub codec: Arc<JwtCodec>,
    pub state: AppState,
}

impl Harness {
    pub fn new() -> Self {
        let outbox = Arc::new(MemoryOutbox::new());
        let repo = Arc::new(InMemoryCommunityRepository::new(outbox.clone()));
        let store = Arc::new(MemoryStore::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let codec = Arc::new(
            JwtCodec::new(JwtKeys::hmac(SECRET).unwrap(), JwtConfig::default()).unwrap(),
        );

        let state = AppState::new(Dependencies {
            repo: repo.clone(),
            store: store.clone(),
            directory: directory.clone(),
            codec: codec.clone(),
            message_link_base: LINK_BASE.to_string(),
            message_cache_ttl: Duration::from_secs(600),
        });

        Self {
            repo,
            store,
            outbox,
            directory,
            codec,
            state,
        }
    }

    /// Bearer header value for a user
    pub fn bearer(&self, user_id: Uuid) -> String {
        let pair = self
            .codec
            .issue_pair(&format!("{}@x.com", user_id.simple()), user_id)
            .unwrap();
        format!("Bearer {}", pair.access_token)
    }

    /// Events written to the outbox since the last call
    pub async fn events(&self) -> Vec<DomainEvent> {
        self.outbox
            .drain()
            .await
            .unwrap()
            .into_iter()
            .map(|envelope| envelope.data)
            .collect()
    }
}

pub fn link(id: Uuid) -> String {
    format!("{}/{}", LINK_BASE, id)
}
