use async_trait::async_trait;
use log::info;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use super::{StoreError, TokenStore, UserStore};
use crate::models::{SessionToken, User};

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        hashed_password TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        disabled BOOLEAN NOT NULL DEFAULT FALSE
    )",
    "CREATE TABLE IF NOT EXISTS tokens (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        token TEXT NOT NULL UNIQUE,
        token_type TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        active BOOLEAN NOT NULL DEFAULT TRUE
    )",
    "CREATE INDEX IF NOT EXISTS tokens_user_id_idx ON tokens (user_id)",
];

const USER_COLUMNS: &str = "id, username, hashed_password, created_at, disabled";
const TOKEN_COLUMNS: &str = "id, user_id, token, token_type, created_at, expires_at, active";

/// Postgres-backed user and token store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(classify)?;
        Ok(Self::new(pool))
    }

    /// Creates the `users` and `tokens` tables when they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(classify)?;
        }
        info!("Database schema verified");
        Ok(())
    }
}

/// Sorts a sqlx error into the store taxonomy.
fn classify(error: sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            StoreError::Duplicate(db.constraint().unwrap_or("unique").to_string())
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(error.to_string()),
        _ => StoreError::Backend(error.to_string()),
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, username, hashed_password, created_at, disabled)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.hashed_password)
        .bind(user.created_at)
        .bind(user.disabled)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        sqlx::query("UPDATE tokens SET active = FALSE WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        // tokens rows follow through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        tx.commit().await.map_err(classify)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert_token(&self, token: &SessionToken) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tokens (id, user_id, token, token_type, created_at, expires_at, active)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token)
        .bind(&token.token_type)
        .bind(token.created_at)
        .bind(token.expires_at)
        .bind(token.active)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn find_token(&self, token: &str) -> Result<Option<SessionToken>, StoreError> {
        sqlx::query_as::<_, SessionToken>(&format!(
            "SELECT {} FROM tokens WHERE token = $1",
            TOKEN_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }

    async fn deactivate_token(&self, token: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE tokens SET active = FALSE WHERE token = $1 AND active")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected())
    }

    async fn deactivate_user_tokens(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let result =
            sqlx::query("UPDATE tokens SET active = FALSE WHERE user_id = $1 AND active")
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(classify)?;
        Ok(result.rows_affected())
    }
}
