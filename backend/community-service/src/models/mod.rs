pub mod message;
pub mod reaction;
pub mod spector;

pub use message::{CreateMessageRequest, Message, MessageQuery, MessageResponse, UpdateMessageRequest};
pub use reaction::{Reaction, ReactionQuery, ReactionResponse, ReactionType};
pub use spector::{Membership, Spector, SpectorQuery, SpectorRequest, SubscriberRole};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: bool,
}

impl AnswerResponse {
    pub fn yes() -> Self {
        Self { answer: true }
    }
}
