use crate::auth::Principal;
use crate::error::Result;
use crate::models::{AnswerResponse, SpectorQuery, SpectorRequest};
use crate::services::SpectorService;
use actix_middleware::Authenticated;
use actix_web::{web, HttpResponse};
use std::sync::Arc;
use uuid::Uuid;

/// POST /api/spectors
pub async fn create(
    service: web::Data<Arc<SpectorService>>,
    principal: Authenticated<Principal>,
    body: web::Json<SpectorRequest>,
) -> Result<HttpResponse> {
    let spector = service.create(principal.0.id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(spector))
}

/// GET /api/spectors?name=
pub async fn list(
    service: web::Data<Arc<SpectorService>>,
    query: web::Query<SpectorQuery>,
) -> Result<HttpResponse> {
    let spectors = service.list(query.name.as_deref()).await?;
    Ok(HttpResponse::Ok().json(spectors))
}

/// GET /api/spectors/{id}
pub async fn get(
    service: web::Data<Arc<SpectorService>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let spector = service.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(spector))
}

/// PATCH /api/spectors/{id}
pub async fn update(
    service: web::Data<Arc<SpectorService>>,
    principal: Authenticated<Principal>,
    path: web::Path<Uuid>,
    body: web::Json<SpectorRequest>,
) -> Result<HttpResponse> {
    let spector = service
        .update(principal.0.id, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(spector))
}

/// DELETE /api/spectors/{id}
pub async fn delete(
    service: web::Data<Arc<SpectorService>>,
    principal: Authenticated<Principal>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    service.delete(principal.0.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(AnswerResponse::yes()))
}

/// POST /api/spectors/{id}/subscribers
pub async fn subscribe(
    service: web::Data<Arc<SpectorService>>,
    principal: Authenticated<Principal>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    service.subscribe(principal.0.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(AnswerResponse::yes()))
}

/// GET /api/spectors/{id}/subscribers
pub async fn subscribers(
    service: web::Data<Arc<SpectorService>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let names = service.subscribers(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(names))
}

/// DELETE /api/spectors/{id}/subscribers
pub async fn unsubscribe(
    service: web::Data<Arc<SpectorService>>,
    principal: Authenticated<Principal>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    service.unsubscribe(principal.0.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(AnswerResponse::yes()))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/{id}/subscribers", web::post().to(subscribe))
        .route("/{id}/subscribers", web::get().to(subscribers))
        .route("/{id}/subscribers", web::delete().to(unsubscribe))
        .route("/{id}", web::get().to(get))
        .route("/{id}", web::patch().to(update))
        .route("/{id}", web::delete().to(delete))
        .route("", web::post().to(create))
        .route("", web::get().to(list));
}
