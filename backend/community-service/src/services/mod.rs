/// Business rules for community-service
pub mod cache;
pub mod messages;
pub mod reactions;
pub mod spectors;

pub use cache::MessageCache;
pub use messages::MessageService;
pub use reactions::ReactionService;
pub use spectors::SpectorService;
