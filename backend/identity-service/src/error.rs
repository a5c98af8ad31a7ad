use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use crypto_core::JwtError;
use redis_utils::StoreError;
use thiserror::Error;
use transactional_outbox::OutboxError;

pub type Result<T> = std::result::Result<T, IdentityError>;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Event publish failed: {0}")]
    Publish(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IdentityError {
    pub fn email_taken(email: &str) -> Self {
        IdentityError::Conflict(format!("User with email \"{}\" is already exist!", email))
    }

    pub fn user_not_found(id: impl std::fmt::Display) -> Self {
        IdentityError::NotFound(format!("User with id \"{}\" doesn't exist!", id))
    }
}

impl ResponseError for IdentityError {
    fn status_code(&self) -> StatusCode {
        match self {
            IdentityError::BadRequest(_) => StatusCode::BAD_REQUEST,
            IdentityError::NotFound(_) => StatusCode::NOT_FOUND,
            IdentityError::Conflict(_) => StatusCode::CONFLICT,
            IdentityError::Unauthorized => StatusCode::UNAUTHORIZED,
            IdentityError::Database(_)
            | IdentityError::Store(_)
            | IdentityError::Publish(_)
            | IdentityError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // Don't leak internal details
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status).json(serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        }))
    }
}

// Conversions from external error types
impl From<sqlx::Error> for IdentityError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        IdentityError::Database(err.to_string())
    }
}

impl From<StoreError> for IdentityError {
    fn from(err: StoreError) -> Self {
        tracing::error!("Store error: {}", err);
        IdentityError::Store(err.to_string())
    }
}

impl From<OutboxError> for IdentityError {
    fn from(err: OutboxError) -> Self {
        tracing::error!("Outbox error: {}", err);
        IdentityError::Publish(err.to_string())
    }
}

impl From<JwtError> for IdentityError {
    fn from(err: JwtError) -> Self {
        tracing::error!("JWT error: {}", err);
        IdentityError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for IdentityError {
    fn from(err: serde_json::Error) -> Self {
        IdentityError::Internal(err.to_string())
    }
}
