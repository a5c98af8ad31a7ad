/// HTTP handlers for identity-service
pub mod internal;
pub mod users;

use actix_web::web;

/// Mount every `/api/users` route.
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/users")
            .configure(internal::register_routes)
            .configure(users::register_routes),
    );
}
