/// PostgreSQL implementation of [`CommunityRepository`]
use super::CommunityRepository;
use crate::error::{CommunityError, Result};
use crate::models::{Message, Reaction, Spector, SubscriberRole};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use transactional_outbox::{insert_in_tx, OutboxEvent};
use uuid::Uuid;

const SPECTOR_COLUMNS: &str = "id, name, description, created_at";
const MESSAGE_COLUMNS: &str = "id, spector_id, parent_id, author_id, body, created_at, updated_at";
const REACTION_COLUMNS: &str = "id, message_id, author_id, reaction_type, created_at";

#[derive(Clone)]
pub struct PgCommunityRepository {
    pool: PgPool,
}

impl PgCommunityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_name_conflict(err: sqlx::Error, name: &str) -> CommunityError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            CommunityError::spector_name_taken(name)
        }
        _ => err.into(),
    }
}

/// Refuse membership inserts for a deleted account.
///
/// Takes the user's advisory lock in shared mode, so the check and the insert
/// that follows cannot interleave with `remove_user_everywhere`.
async fn guard_live_account(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock_shared(hashtextextended($1::TEXT, 0))")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    let deleted: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM deleted_users WHERE user_id = $1)")
            .bind(user_id)
            .fetch_one(&mut **tx)
            .await?;

    if deleted {
        return Err(CommunityError::account_deleted(user_id));
    }
    Ok(())
}

#[async_trait]
impl CommunityRepository for PgCommunityRepository {
    async fn create_spector(&self, spector: &Spector, owner_id: Uuid) -> Result<Spector> {
        let mut tx = self.pool.begin().await?;
        guard_live_account(&mut tx, owner_id).await?;

        let created = sqlx::query_as::<_, Spector>(&format!(
            "INSERT INTO spectors (id, name, description, created_at) VALUES ($1, $2, $3, $4) RETURNING {}",
            SPECTOR_COLUMNS
        ))
        .bind(spector.id)
        .bind(&spector.name)
        .bind(&spector.description)
        .bind(spector.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_name_conflict(e, &spector.name))?;

        sqlx::query("INSERT INTO spector_subscribers (spector_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(created.id)
            .bind(owner_id)
            .bind(SubscriberRole::Owner)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn find_spector(&self, id: Uuid) -> Result<Option<Spector>> {
        let spector = sqlx::query_as::<_, Spector>(&format!(
            "SELECT {} FROM spectors WHERE id = $1",
            SPECTOR_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(spector)
    }

    async fn list_spectors(&self, name: Option<&str>) -> Result<Vec<Spector>> {
        let spectors = sqlx::query_as::<_, Spector>(&format!(
            "SELECT {} FROM spectors WHERE $1::TEXT IS NULL OR name = $1 ORDER BY created_at",
            SPECTOR_COLUMNS
        ))
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(spectors)
    }

    async fn update_spector(&self, spector: &Spector) -> Result<Spector> {
        sqlx::query_as::<_, Spector>(&format!(
            "UPDATE spectors SET name = $2, description = $3 WHERE id = $1 RETURNING {}",
            SPECTOR_COLUMNS
        ))
        .bind(spector.id)
        .bind(&spector.name)
        .bind(&spector.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_name_conflict(e, &spector.name))?
        .ok_or_else(|| CommunityError::spector_not_found(spector.id))
    }

    async fn delete_spector(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM spectors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn role_of(&self, spector_id: Uuid, user_id: Uuid) -> Result<Option<SubscriberRole>> {
        let role = sqlx::query_scalar::<_, SubscriberRole>(
            "SELECT role FROM spector_subscribers WHERE spector_id = $1 AND user_id = $2",
        )
        .bind(spector_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    async fn add_subscriber(&self, spector_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        guard_live_account(&mut tx, user_id).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO spector_subscribers (spector_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (spector_id, user_id) DO NOTHING
            "#,
        )
        .bind(spector_id)
        .bind(user_id)
        .bind(SubscriberRole::Subscriber)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_subscriber(&self, spector_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM spector_subscribers WHERE spector_id = $1 AND user_id = $2")
                .bind(spector_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn member_ids(&self, spector_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM spector_subscribers WHERE spector_id = $1",
        )
        .bind(spector_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn remove_user_everywhere(&self, user_id: Uuid) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        // Exclusive: waits for in-flight membership inserts of this user
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::TEXT, 0))")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO deleted_users (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM spector_subscribers WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn insert_message(&self, message: &Message, event: Option<&OutboxEvent>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, spector_id, parent_id, author_id, body, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(message.id)
        .bind(message.spector_id)
        .bind(message.parent_id)
        .bind(message.author_id)
        .bind(&message.body)
        .bind(message.created_at)
        .bind(message.updated_at)
        .execute(&mut *tx)
        .await?;

        if let Some(event) = event {
            insert_in_tx(&mut tx, event).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_message(&self, id: Uuid) -> Result<Option<Message>> {
        let message = sqlx::query_as::<_, Message>(&format!(
            "SELECT {} FROM messages WHERE id = $1",
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }

    async fn list_messages(
        &self,
        spector_id: Option<Uuid>,
        parent_id: Option<Uuid>,
    ) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(&format!(
            r#"
            SELECT {} FROM messages
            WHERE ($1::UUID IS NULL AND $2::UUID IS NULL)
               OR spector_id = $1
               OR parent_id = $2
            ORDER BY created_at
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(spector_id)
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn update_message_body(&self, id: Uuid, body: &str) -> Result<Option<Message>> {
        let message = sqlx::query_as::<_, Message>(&format!(
            "UPDATE messages SET body = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .bind(body)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }

    async fn delete_message(&self, id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            WITH RECURSIVE thread AS (
                SELECT id FROM messages WHERE id = $1
                UNION ALL
                SELECT m.id FROM messages m JOIN thread t ON m.parent_id = t.id
            )
            DELETE FROM messages WHERE id IN (SELECT id FROM thread)
            RETURNING id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn insert_reaction(&self, reaction: &Reaction, event: &OutboxEvent) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO reactions (id, message_id, author_id, reaction_type, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(reaction.id)
        .bind(reaction.message_id)
        .bind(reaction.author_id)
        .bind(reaction.reaction_type)
        .bind(reaction.created_at)
        .execute(&mut *tx)
        .await?;

        insert_in_tx(&mut tx, event).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_reaction(&self, id: Uuid) -> Result<Option<Reaction>> {
        let reaction = sqlx::query_as::<_, Reaction>(&format!(
            "SELECT {} FROM reactions WHERE id = $1",
            REACTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reaction)
    }

    async fn list_reactions(&self, message_id: Uuid) -> Result<Vec<Reaction>> {
        let reactions = sqlx::query_as::<_, Reaction>(&format!(
            "SELECT {} FROM reactions WHERE message_id = $1 ORDER BY created_at",
            REACTION_COLUMNS
        ))
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reactions)
    }

    async fn delete_reaction(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reactions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
