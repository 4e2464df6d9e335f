use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered account as stored by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Credential hasher output; never the plaintext password.
    pub hashed_password: String,
    pub created_at: DateTime<Utc>,
    pub disabled: bool,
}

impl User {
    /// Creates a new, enabled user with a fresh id.
    pub fn new(username: String, hashed_password: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            hashed_password,
            created_at: Utc::now(),
            disabled: false,
        }
    }
}

/// The public view of a user returned by the API.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRead {
    pub id: Uuid,
    pub username: String,
    pub disabled: bool,
}

impl From<&User> for UserRead {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            disabled: user.disabled,
        }
    }
}
