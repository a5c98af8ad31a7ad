use crate::error::Result;
use crate::models::{
    AnswerResponse, AuthenticateRequest, ConfirmQuery, PendingRegistration, RefreshRequest,
    SearchQuery, UpdateUserRequest,
};
use crate::security::UserPrincipal;
use crate::services::{RegistrationService, TokenService, UserService};
use actix_middleware::Authenticated;
use actix_web::{web, HttpResponse};
use std::sync::Arc;
use uuid::Uuid;

/// POST /api/users
pub async fn register(
    service: web::Data<Arc<RegistrationService>>,
    body: web::Json<PendingRegistration>,
) -> Result<HttpResponse> {
    service.register(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(AnswerResponse::yes()))
}

/// POST /api/users/confirm?email=&code=
pub async fn confirm(
    service: web::Data<Arc<RegistrationService>>,
    query: web::Query<ConfirmQuery>,
) -> Result<HttpResponse> {
    let user = service.confirm(&query.email, query.code).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// POST /api/users/authenticate
pub async fn authenticate(
    service: web::Data<Arc<UserService>>,
    body: web::Json<AuthenticateRequest>,
) -> Result<HttpResponse> {
    let pair = service.authenticate(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(pair))
}

/// POST /api/users/refresh
pub async fn refresh(
    tokens: web::Data<Arc<TokenService>>,
    body: web::Json<RefreshRequest>,
) -> Result<HttpResponse> {
    let pair = tokens.refresh(&body.refresh_token).await?;
    Ok(HttpResponse::Ok().json(pair))
}

/// POST /api/users/logout
pub async fn logout(
    tokens: web::Data<Arc<TokenService>>,
    body: web::Json<RefreshRequest>,
) -> Result<HttpResponse> {
    tokens.logout(&body.refresh_token).await?;
    Ok(HttpResponse::Ok().json(AnswerResponse::yes()))
}

/// GET /api/users?name=&email=
pub async fn search(
    service: web::Data<Arc<UserService>>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse> {
    let users = service.search(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(users))
}

/// GET /api/users/me
pub async fn me(
    service: web::Data<Arc<UserService>>,
    principal: Authenticated<UserPrincipal>,
) -> Result<HttpResponse> {
    let user = service.find(principal.0.id).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// GET /api/users/{id}
pub async fn get_user(
    service: web::Data<Arc<UserService>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let user = service.find(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// PATCH /api/users
pub async fn update(
    service: web::Data<Arc<UserService>>,
    principal: Authenticated<UserPrincipal>,
    body: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse> {
    let user = service.update(principal.0.id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// DELETE /api/users
pub async fn delete(
    service: web::Data<Arc<UserService>>,
    principal: Authenticated<UserPrincipal>,
) -> Result<HttpResponse> {
    service.delete(principal.0.id).await?;
    Ok(HttpResponse::Ok().json(AnswerResponse::yes()))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/confirm", web::post().to(confirm))
        .route("/authenticate", web::post().to(authenticate))
        .route("/refresh", web::post().to(refresh))
        .route("/logout", web::post().to(logout))
        .route("/me", web::get().to(me))
        .route("/{id}", web::get().to(get_user))
        .route("", web::post().to(register))
        .route("", web::get().to(search))
        .route("", web::patch().to(update))
        .route("", web::delete().to(delete));
}
