/// User database operations for identity-service
use super::{NewUser, UserRepository};
use crate::error::{IdentityError, Result};
use crate::models::User;
use async_trait::async_trait;
use sqlx::PgPool;
use transactional_outbox::{insert_in_tx, OutboxEvent};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at";

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Map a unique-constraint violation on `email` to `Conflict`
fn map_unique_violation(err: sqlx::Error, email: &str) -> IdentityError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => IdentityError::email_taken(email),
        _ => err.into(),
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, name, email, password_hash) VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &user.email))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn search(&self, name: Option<&str>, email: Option<&str>) -> Result<Vec<User>> {
        let users = if name.is_none() && email.is_none() {
            sqlx::query_as::<_, User>(&format!(
                "SELECT {} FROM users ORDER BY created_at",
                USER_COLUMNS
            ))
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, User>(&format!(
                "SELECT {} FROM users WHERE name = $1 OR email = $2 ORDER BY created_at",
                USER_COLUMNS
            ))
            .bind(name)
            .bind(email)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(users)
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ANY($1)",
            USER_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn update(&self, user: &User) -> Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET name = $2, email = $3, password_hash = $4 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &user.email))?
        .ok_or_else(|| IdentityError::user_not_found(user.id))
    }

    async fn delete(&self, id: Uuid, event: &OutboxEvent) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_in_tx(&mut tx, event).await?;
        tx.commit().await?;

        Ok(true)
    }
}
