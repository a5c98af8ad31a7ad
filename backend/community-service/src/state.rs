use crate::auth::ClaimsPrincipalLoader;
use crate::db::CommunityRepository;
use crate::events::{EventFactory, MembershipCleanup};
use crate::handlers;
use crate::services::{MessageCache, MessageService, ReactionService, SpectorService};
use actix_middleware::JwtAuth;
use actix_web::web;
use crypto_core::JwtCodec;
use directory_client::Directory;
use redis_utils::EphemeralStore;
use std::sync::Arc;
use std::time::Duration;

/// Services behind the HTTP surface and the event consumer
#[derive(Clone)]
pub struct AppState {
    pub spectors: Arc<SpectorService>,
    pub messages: Arc<MessageService>,
    pub reactions: Arc<ReactionService>,
    pub membership_cleanup: Arc<MembershipCleanup>,
    codec: Arc<JwtCodec>,
}

/// Collaborators injected into [`AppState::new`]
pub struct Dependencies {
    pub repo: Arc<dyn CommunityRepository>,
    pub store: Arc<dyn EphemeralStore>,
    pub directory: Arc<dyn Directory>,
    pub codec: Arc<JwtCodec>,
    pub message_link_base: String,
    pub message_cache_ttl: Duration,
}

impl AppState {
    pub fn new(deps: Dependencies) -> Self {
        let cache = Arc::new(MessageCache::new(deps.store, deps.message_cache_ttl));
        let events = EventFactory::new(deps.message_link_base);

        Self {
            spectors: Arc::new(SpectorService::new(
                deps.repo.clone(),
                deps.directory,
                cache.clone(),
            )),
            messages: Arc::new(MessageService::new(
                deps.repo.clone(),
                cache,
                events.clone(),
            )),
            reactions: Arc::new(ReactionService::new(deps.repo.clone(), events)),
            membership_cleanup: Arc::new(MembershipCleanup::new(deps.repo)),
            codec: deps.codec,
        }
    }

    pub fn auth(&self) -> JwtAuth<ClaimsPrincipalLoader> {
        JwtAuth::new(self.codec.clone(), Arc::new(ClaimsPrincipalLoader))
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.spectors.clone()))
            .app_data(web::Data::new(self.messages.clone()))
            .app_data(web::Data::new(self.reactions.clone()))
            .configure(handlers::register_routes);
    }
}
