use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "reaction_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReactionType {
    Like,
    Dislike,
    Love,
    Laugh,
    Sad,
    Angry,
}

impl ReactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionType::Like => "LIKE",
            ReactionType::Dislike => "DISLIKE",
            ReactionType::Love => "LOVE",
            ReactionType::Laugh => "LAUGH",
            ReactionType::Sad => "SAD",
            ReactionType::Angry => "ANGRY",
        }
    }
}

impl fmt::Display for ReactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Reaction {
    pub id: Uuid,
    pub message_id: Uuid,
    pub author_id: Uuid,
    pub reaction_type: ReactionType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub reaction_type: ReactionType,
    pub created_at: DateTime<Utc>,
    pub message_id: Uuid,
    pub user_id: Uuid,
}

impl From<&Reaction> for ReactionResponse {
    fn from(reaction: &Reaction) -> Self {
        Self {
            id: reaction.id,
            reaction_type: reaction.reaction_type,
            created_at: reaction.created_at,
            message_id: reaction.message_id,
            user_id: reaction.author_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReactionQuery {
    pub reaction_type: ReactionType,
}
