/// User persistence
///
/// [`UserRepository`] is the seam between services and storage. The
/// PostgreSQL implementation runs in production; the in-memory one backs
/// tests and local runs.
use crate::error::Result;
use crate::models::User;
use async_trait::async_trait;
use transactional_outbox::OutboxEvent;
use uuid::Uuid;

pub mod memory;
pub mod users;

pub use memory::InMemoryUserRepository;
pub use users::PgUserRepository;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; `Conflict` when the email is taken.
    async fn create(&self, user: NewUser) -> Result<User>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Users whose name or email equals the given value; everyone when both are absent.
    async fn search(&self, name: Option<&str>, email: Option<&str>) -> Result<Vec<User>>;

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>>;

    /// Persist name, email and password hash; `Conflict` when the new email is taken.
    async fn update(&self, user: &User) -> Result<User>;

    /// Delete a user and enqueue `event` in the same unit of work.
    ///
    /// Returns `false` (and enqueues nothing) when the user did not exist.
    async fn delete(&self, id: Uuid, event: &OutboxEvent) -> Result<bool>;
}
