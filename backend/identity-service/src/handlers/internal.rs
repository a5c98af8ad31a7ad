//! Directory API endpoints for sibling services

use crate::error::{IdentityError, Result};
use crate::services::UserService;
use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use uuid::Uuid;

pub const INTERNAL_API_KEY_HEADER: &str = "x-internal-api-key";

/// Shared key for `/internal` routes; `None` leaves them open
#[derive(Debug, Clone, Default)]
pub struct InternalApiKey(pub Option<String>);

fn check_key(req: &HttpRequest, key: &InternalApiKey) -> Result<()> {
    let Some(expected) = key.0.as_deref() else {
        return Ok(());
    };

    let presented = req
        .headers()
        .get(INTERNAL_API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if presented == Some(expected) {
        Ok(())
    } else {
        tracing::warn!(path = %req.path(), "Internal route called without a valid key");
        Err(IdentityError::Unauthorized)
    }
}

/// POST /api/users/internal/batch
pub async fn batch(
    req: HttpRequest,
    key: web::Data<InternalApiKey>,
    service: web::Data<Arc<UserService>>,
    ids: web::Json<Vec<Uuid>>,
) -> Result<HttpResponse> {
    check_key(&req, &key)?;
    let users = service.batch(&ids).await?;
    Ok(HttpResponse::Ok().json(users))
}

/// POST /api/users/internal/batchEmail
pub async fn batch_email(
    req: HttpRequest,
    key: web::Data<InternalApiKey>,
    service: web::Data<Arc<UserService>>,
    ids: web::Json<Vec<Uuid>>,
) -> Result<HttpResponse> {
    check_key(&req, &key)?;
    let emails = service.batch_email(&ids).await?;
    Ok(HttpResponse::Ok().json(emails))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/internal/batch", web::post().to(batch))
        .route("/internal/batchEmail", web::post().to(batch_email));
}
