/// Domain events exchanged between Identity, Community and Notification
use crate::Topic;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A top-level post was published in a spector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPostEvent {
    pub spector_name: String,
    pub post_link: String,
    /// Members to notify (the author is excluded)
    pub subscriber_ids: Vec<Uuid>,
}

/// Someone other than the author replied to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommentEvent {
    pub spector_name: String,
    pub message_link: String,
    pub comment_link: String,
    /// Author of the message that received the reply
    pub author_user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReactionEvent {
    pub message_link: String,
    pub reaction_type: String,
    pub target_user_id: Uuid,
    pub reacting_user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationCodeEvent {
    pub email: String,
    pub code: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDeletedEvent {
    pub user_id: Uuid,
}

/// Closed set of events carried on the bus, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    NewPost(NewPostEvent),
    NewComment(NewCommentEvent),
    NewReaction(NewReactionEvent),
    RegistrationCode(RegistrationCodeEvent),
    UserDeleted(UserDeletedEvent),
}

impl DomainEvent {
    /// Topic this event is routed to
    pub fn topic(&self) -> Topic {
        match self {
            DomainEvent::NewPost(_) => Topic::NewPost,
            DomainEvent::NewComment(_) => Topic::NewComment,
            DomainEvent::NewReaction(_) => Topic::NewReaction,
            DomainEvent::RegistrationCode(_) => Topic::RegistrationCode,
            DomainEvent::UserDeleted(_) => Topic::UserDelete,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::NewPost(_) => "new_post",
            DomainEvent::NewComment(_) => "new_comment",
            DomainEvent::NewReaction(_) => "new_reaction",
            DomainEvent::RegistrationCode(_) => "registration_code",
            DomainEvent::UserDeleted(_) => "user_deleted",
        }
    }
}
