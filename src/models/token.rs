use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

/// The only token kind the service issues.
pub const BEARER: &str = "bearer";

/// A session token row. Rows are never updated except to clear `active`; expiry is judged
/// at read time against `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SessionToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub token_type: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
}

impl SessionToken {
    /// Creates an active bearer token for `user_id` valid for `lifetime` from now.
    /// Fails if the expiry would fall outside the representable date range.
    pub fn new(user_id: Uuid, token: String, lifetime: Duration) -> Result<Self, AppError> {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(lifetime).ok_or_else(|| {
            AppError::InternalServerError(format!("token lifetime {} overflows", lifetime))
        })?;
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            token,
            token_type: BEARER.to_string(),
            created_at: now,
            expires_at,
            active: true,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Response body of a successful token request.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: String,
    pub active: bool,
    pub expires_at: DateTime<Utc>,
}

impl From<SessionToken> for TokenResponse {
    fn from(token: SessionToken) -> Self {
        Self {
            token: token.token,
            token_type: token.token_type,
            active: token.active,
            expires_at: token.expires_at,
        }
    }
}
