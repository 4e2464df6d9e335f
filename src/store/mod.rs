//! Persistence collaborator for users and session tokens.
//!
//! The session core only talks to the `UserStore` and `TokenStore` traits. `PgStore` backs them
//! with Postgres for production, `MemoryStore` keeps everything in process for tests and local
//! runs. Every trait method is a single atomic unit of work: it either fully applies or leaves
//! no trace.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{SessionToken, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Failures reported by a store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write; carries the offending column.
    #[error("duplicate {0}")]
    Duplicate(String),
    /// The backing store could not be reached (connection loss, pool exhaustion).
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user. Fails with `StoreError::Duplicate` if the username is taken.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Removes the user and every token it owns in one atomic unit of work; afterwards none of
    /// those tokens can be found. Returns whether a user row was removed.
    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Inserts a token row. Fails with `StoreError::Duplicate` if the token string exists.
    async fn insert_token(&self, token: &SessionToken) -> Result<(), StoreError>;

    /// Looks up a token row by its token string.
    async fn find_token(&self, token: &str) -> Result<Option<SessionToken>, StoreError>;

    /// Clears `active` on the row with this token string. Returns rows changed.
    async fn deactivate_token(&self, token: &str) -> Result<u64, StoreError>;

    /// Clears `active` on every row owned by `user_id`. Returns rows changed.
    async fn deactivate_user_tokens(&self, user_id: Uuid) -> Result<u64, StoreError>;
}
