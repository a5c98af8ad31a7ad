use crate::auth::Principal;
use crate::error::Result;
use crate::models::{AnswerResponse, ReactionQuery};
use crate::services::ReactionService;
use actix_middleware::Authenticated;
use actix_web::{web, HttpResponse};
use std::sync::Arc;
use uuid::Uuid;

/// POST /api/messages/{id}/reactions?reaction_type=
pub async fn create(
    service: web::Data<Arc<ReactionService>>,
    principal: Authenticated<Principal>,
    path: web::Path<Uuid>,
    query: web::Query<ReactionQuery>,
) -> Result<HttpResponse> {
    let reaction = service
        .create(principal.0.id, path.into_inner(), query.reaction_type)
        .await?;
    Ok(HttpResponse::Created().json(reaction))
}

/// GET /api/messages/{id}/reactions
pub async fn list(
    service: web::Data<Arc<ReactionService>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let reactions = service.list(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(reactions))
}

/// DELETE /api/messages/{id}/reactions/{reaction_id}
pub async fn delete(
    service: web::Data<Arc<ReactionService>>,
    principal: Authenticated<Principal>,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse> {
    let (message_id, reaction_id) = path.into_inner();
    service
        .delete(principal.0.id, message_id, reaction_id)
        .await?;
    Ok(HttpResponse::Ok().json(AnswerResponse::yes()))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/{id}/reactions", web::post().to(create))
        .route("/{id}/reactions", web::get().to(list))
        .route("/{id}/reactions/{reaction_id}", web::delete().to(delete));
}
