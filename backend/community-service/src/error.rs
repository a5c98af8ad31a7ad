use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use directory_client::DirectoryError;
use redis_utils::StoreError;
use thiserror::Error;
use transactional_outbox::OutboxError;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, CommunityError>;

#[derive(Debug, Error)]
pub enum CommunityError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Event publish failed: {0}")]
    Publish(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl CommunityError {
    pub fn spector_not_found(id: Uuid) -> Self {
        CommunityError::NotFound(format!("Spector with id \"{}\" doesn't exist", id))
    }

    pub fn message_not_found(id: Uuid) -> Self {
        CommunityError::NotFound(format!("Message with id \"{}\" doesn't exist", id))
    }

    pub fn reaction_not_found(id: Uuid) -> Self {
        CommunityError::NotFound(format!("Reaction with id \"{}\" doesn't exist", id))
    }

    pub fn not_owner(user_id: Uuid, spector_id: Uuid) -> Self {
        CommunityError::BadRequest(format!(
            "User with id \"{}\" is not the owner of the spector with id \"{}\"",
            user_id, spector_id
        ))
    }

    pub fn account_deleted(user_id: Uuid) -> Self {
        CommunityError::BadRequest(format!("User with id \"{}\" has been deleted", user_id))
    }

    pub fn spector_name_taken(name: &str) -> Self {
        CommunityError::Conflict(format!("Spector with name \"{}\" already exists", name))
    }
}

impl ResponseError for CommunityError {
    fn status_code(&self) -> StatusCode {
        match self {
            CommunityError::BadRequest(_) => StatusCode::BAD_REQUEST,
            CommunityError::NotFound(_) => StatusCode::NOT_FOUND,
            CommunityError::Conflict(_) => StatusCode::CONFLICT,
            CommunityError::Database(_)
            | CommunityError::Store(_)
            | CommunityError::Directory(_)
            | CommunityError::Publish(_)
            | CommunityError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
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

impl From<sqlx::Error> for CommunityError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        CommunityError::Database(err.to_string())
    }
}

impl From<StoreError> for CommunityError {
    fn from(err: StoreError) -> Self {
        tracing::error!("Store error: {}", err);
        CommunityError::Store(err.to_string())
    }
}

impl From<OutboxError> for CommunityError {
    fn from(err: OutboxError) -> Self {
        tracing::error!("Outbox error: {}", err);
        CommunityError::Publish(err.to_string())
    }
}

impl From<DirectoryError> for CommunityError {
    fn from(err: DirectoryError) -> Self {
        tracing::error!("Directory error: {}", err);
        CommunityError::Directory(err.to_string())
    }
}

impl From<serde_json::Error> for CommunityError {
    fn from(err: serde_json::Error) -> Self {
        CommunityError::Internal(err.to_string())
    }
}
