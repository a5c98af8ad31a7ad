use crate::db::UserRepository;
use crate::handlers::{self, internal::InternalApiKey};
use crate::security::UserPrincipalLoader;
use crate::services::{CodeGenerator, RegistrationService, TokenService, UserService};
use actix_middleware::JwtAuth;
use actix_web::web;
use crypto_core::JwtCodec;
use redis_utils::EphemeralStore;
use std::sync::Arc;
use std::time::Duration;
use transactional_outbox::OutboxWriter;

/// Services and collaborators behind the HTTP surface
#[derive(Clone)]
pub struct AppState {
    pub registration: Arc<RegistrationService>,
    pub tokens: Arc<TokenService>,
    pub users: Arc<UserService>,
    pub principals: Arc<UserPrincipalLoader>,
    pub internal_api_key: InternalApiKey,
}

/// Collaborators injected into [`AppState::new`]
pub struct Dependencies {
    pub users: Arc<dyn UserRepository>,
    pub store: Arc<dyn EphemeralStore>,
    pub outbox: Arc<dyn OutboxWriter>,
    pub codes: Arc<dyn CodeGenerator>,
    pub codec: Arc<JwtCodec>,
    pub registration_ttl: Duration,
    pub internal_api_key: Option<String>,
}

impl AppState {
    pub fn new(deps: Dependencies) -> Self {
        let tokens = Arc::new(TokenService::new(
            deps.codec,
            deps.store.clone(),
            deps.users.clone(),
        ));
        let registration = Arc::new(RegistrationService::new(
            deps.users.clone(),
            deps.store,
            deps.outbox,
            deps.codes,
            deps.registration_ttl,
        ));
        let users = Arc::new(UserService::new(deps.users.clone(), tokens.clone()));
        let principals = Arc::new(UserPrincipalLoader::new(deps.users));

        Self {
            registration,
            tokens,
            users,
            principals,
            internal_api_key: InternalApiKey(deps.internal_api_key),
        }
    }

    /// Authentication gate for the app built from this state
    pub fn auth(&self) -> JwtAuth<UserPrincipalLoader> {
        JwtAuth::new(self.tokens.codec(), self.principals.clone())
    }

    /// Register app data and routes.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.registration.clone()))
            .app_data(web::Data::new(self.tokens.clone()))
            .app_data(web::Data::new(self.users.clone()))
            .app_data(web::Data::new(self.internal_api_key.clone()))
            .configure(handlers::register_routes);
    }
}
