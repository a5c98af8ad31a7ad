use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A named topic container that messages belong to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Spector {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "subscriber_role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriberRole {
    Owner,
    Subscriber,
}

/// A user's association with a spector; unique per (spector, user)
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Membership {
    pub spector_id: Uuid,
    pub user_id: Uuid,
    pub role: SubscriberRole,
}

/// Create and update body; on update absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpectorRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpectorQuery {
    pub name: Option<String>,
}
