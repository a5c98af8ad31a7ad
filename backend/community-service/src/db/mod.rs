/// Community persistence
///
/// One repository covers spectors, memberships, messages and reactions so
/// that a message or reaction insert and its outbox row share a transaction.
use crate::error::Result;
use crate::models::{Message, Reaction, Spector, SubscriberRole};
use async_trait::async_trait;
use transactional_outbox::OutboxEvent;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryCommunityRepository;
pub use postgres::PgCommunityRepository;

#[async_trait]
pub trait CommunityRepository: Send + Sync {
    /// Insert a spector and its OWNER membership together; `Conflict` on a taken
    /// name, `BadRequest` when the owner's account was deleted.
    async fn create_spector(&self, spector: &Spector, owner_id: Uuid) -> Result<Spector>;

    async fn find_spector(&self, id: Uuid) -> Result<Option<Spector>>;

    /// Spectors with the given name, or all of them.
    async fn list_spectors(&self, name: Option<&str>) -> Result<Vec<Spector>>;

    async fn update_spector(&self, spector: &Spector) -> Result<Spector>;

    /// Delete a spector with its memberships, messages and reactions.
    async fn delete_spector(&self, id: Uuid) -> Result<bool>;

    async fn role_of(&self, spector_id: Uuid, user_id: Uuid) -> Result<Option<SubscriberRole>>;

    /// Add a SUBSCRIBER membership. Returns `false` when the user was already a
    /// member; refuses users whose account was deleted.
    async fn add_subscriber(&self, spector_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn remove_subscriber(&self, spector_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn member_ids(&self, spector_id: Uuid) -> Result<Vec<Uuid>>;

    /// Remove every membership the user holds and record the account as deleted,
    /// so later membership inserts for it are refused. Returns the number removed.
    async fn remove_user_everywhere(&self, user_id: Uuid) -> Result<u64>;

    /// Insert a message, enqueueing `event` in the same unit of work.
    async fn insert_message(&self, message: &Message, event: Option<&OutboxEvent>) -> Result<()>;

    async fn find_message(&self, id: Uuid) -> Result<Option<Message>>;

    /// Messages in `spector_id` or replying to `parent_id`; all messages when both are absent.
    async fn list_messages(
        &self,
        spector_id: Option<Uuid>,
        parent_id: Option<Uuid>,
    ) -> Result<Vec<Message>>;

    async fn update_message_body(&self, id: Uuid, body: &str) -> Result<Option<Message>>;

    /// Delete a message and its reply tree. Returns the ids removed (empty if none).
    async fn delete_message(&self, id: Uuid) -> Result<Vec<Uuid>>;

    async fn insert_reaction(&self, reaction: &Reaction, event: &OutboxEvent) -> Result<()>;

    async fn find_reaction(&self, id: Uuid) -> Result<Option<Reaction>>;

    async fn list_reactions(&self, message_id: Uuid) -> Result<Vec<Reaction>>;

    async fn delete_reaction(&self, id: Uuid) -> Result<bool>;
}
