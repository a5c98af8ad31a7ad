use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A post (no parent) or a reply inside a spector
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub spector_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn is_post(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub spector_id: Uuid,
    pub parent_message_id: Option<Uuid>,
    pub user_id: Uuid,
}

impl From<&Message> for MessageResponse {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            body: message.body.clone(),
            created_at: message.created_at,
            spector_id: message.spector_id,
            parent_message_id: message.parent_id,
            user_id: message.author_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMessageRequest {
    pub spector_id: Uuid,
    pub parent_message_id: Option<Uuid>,
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMessageRequest {
    pub body: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageQuery {
    pub spector_id: Option<Uuid>,
    pub parent_message_id: Option<Uuid>,
}
