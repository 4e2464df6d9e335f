use chrono::Utc;
use log::debug;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{SessionToken, User};
use crate::store::{TokenStore, UserStore};

/// The authenticated identity for one request: the owning user and the token they presented.
///
/// Downstream handlers decide ownership from this value alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
    pub token: SessionToken,
}

impl Session {
    /// Whether a resource owned by `owner_id` belongs to this session's user.
    pub fn owns(&self, owner_id: Uuid) -> bool {
        self.user.id == owner_id
    }
}

/// Resolves presented bearer tokens to sessions.
pub struct SessionAuthenticator {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn TokenStore>,
}

impl SessionAuthenticator {
    pub fn new(users: Arc<dyn UserStore>, tokens: Arc<dyn TokenStore>) -> Self {
        Self { users, tokens }
    }

    /// Runs the lookup-then-validate sequence for `presented`:
    ///
    /// 1. no row with that token string: `Unauthenticated`
    /// 2. stored string differs from the presented one: `InvalidToken`
    /// 3. row deactivated: `InvalidToken`
    /// 4. now past `expires_at`: `InvalidToken`
    /// 5. owning user gone: `Unauthenticated`
    ///
    /// Any failure is final for the request.
    pub async fn authenticate(&self, presented: &str) -> Result<Session, AppError> {
        let token = self
            .tokens
            .find_token(presented)
            .await?
            .ok_or_else(|| AppError::Unauthenticated("no such token".into()))?;

        if token.token != presented {
            return Err(AppError::InvalidToken(format!(
                "token {} does not match exactly",
                token.id
            )));
        }

        if !token.active {
            return Err(AppError::InvalidToken(format!(
                "token {} is deactivated",
                token.id
            )));
        }

        if token.is_expired_at(Utc::now()) {
            return Err(AppError::InvalidToken(format!(
                "token {} expired at {}",
                token.id, token.expires_at
            )));
        }

        let user = self
            .users
            .find_user_by_id(token.user_id)
            .await?
            .ok_or_else(|| {
                AppError::Unauthenticated(format!("token {} has no owning user", token.id))
            })?;

        debug!("Authenticated user {} with token {}", user.id, token.id);
        Ok(Session { user, token })
    }
}
