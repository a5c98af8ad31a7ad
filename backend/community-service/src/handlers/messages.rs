use crate::auth::Principal;
use crate::error::Result;
use crate::models::{AnswerResponse, CreateMessageRequest, MessageQuery, UpdateMessageRequest};
use crate::services::MessageService;
use actix_middleware::Authenticated;
use actix_web::{web, HttpResponse};
use std::sync::Arc;
use uuid::Uuid;

/// POST /api/messages
pub async fn create(
    service: web::Data<Arc<MessageService>>,
    principal: Authenticated<Principal>,
    body: web::Json<CreateMessageRequest>,
) -> Result<HttpResponse> {
    let message = service.create(principal.0.id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(message))
}

/// GET /api/messages?spector_id=&parent_message_id=
pub async fn list(
    service: web::Data<Arc<MessageService>>,
    query: web::Query<MessageQuery>,
) -> Result<HttpResponse> {
    let messages = service
        .list(query.spector_id, query.parent_message_id)
        .await?;
    Ok(HttpResponse::Ok().json(messages))
}

/// GET /api/messages/{id}
pub async fn get(
    service: web::Data<Arc<MessageService>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let message = service.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(message))
}

/// PATCH /api/messages/{id}
pub async fn update(
    service: web::Data<Arc<MessageService>>,
    principal: Authenticated<Principal>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateMessageRequest>,
) -> Result<HttpResponse> {
    let message = service
        .update(principal.0.id, path.into_inner(), body.into_inner().body)
        .await?;
    Ok(HttpResponse::Ok().json(message))
}

/// DELETE /api/messages/{id}
pub async fn delete(
    service: web::Data<Arc<MessageService>>,
    principal: Authenticated<Principal>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    service.delete(principal.0.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(AnswerResponse::yes()))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/{id}", web::get().to(get))
        .route("/{id}", web::patch().to(update))
        .route("/{id}", web::delete().to(delete))
        .route("", web::post().to(create))
        .route("", web::get().to(list));
}
