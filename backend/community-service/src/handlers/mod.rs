/// HTTP handlers for community-service
pub mod messages;
pub mod reactions;
pub mod spectors;

use actix_web::web;

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api/spectors").configure(spectors::register_routes))
        .service(
            web::scope("/api/messages")
                .configure(reactions::register_routes)
                .configure(messages::register_routes),
        );
}
