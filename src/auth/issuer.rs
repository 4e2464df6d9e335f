use chrono::Duration;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::auth::password::CredentialHasher;
use crate::auth::token::generate_token;
use crate::config::AuthConfig;
use crate::error::AppError;
use crate::models::SessionToken;
use crate::store::{StoreError, TokenStore, UserStore};

/// Mints and revokes session tokens.
///
/// Issuing a token never touches the user's other tokens: concurrent sessions on several
/// devices are allowed, and revocation only happens through `logout`, `logout_all` or
/// account deletion.
pub struct SessionIssuer {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn TokenStore>,
    hasher: CredentialHasher,
    token_lifetime: Duration,
    /// Verified against when the username is unknown, so both paths pay for one bcrypt check.
    decoy_secret: OnceCell<String>,
}

impl SessionIssuer {
    pub fn new(users: Arc<dyn UserStore>, tokens: Arc<dyn TokenStore>, config: &AuthConfig) -> Self {
        Self {
            users,
            tokens,
            hasher: CredentialHasher::new(config.bcrypt_cost),
            token_lifetime: config.token_lifetime(),
            decoy_secret: OnceCell::new(),
        }
    }

    /// Exchanges a username and password for a new active token.
    ///
    /// Unknown users, wrong passwords and disabled accounts all fail with
    /// `AppError::InvalidCredentials`; only the log says which. The token row is written in a
    /// single insert, so a returned token is always persisted.
    pub async fn issue(&self, username: &str, password: &str) -> Result<SessionToken, AppError> {
        let user = match self.users.find_user_by_username(username).await? {
            Some(user) => user,
            None => {
                let decoy = self
                    .decoy_secret
                    .get_or_try_init(|| async {
                        self.hasher.hash_blocking(&generate_token()).await
                    })
                    .await?;
                self.hasher.verify_blocking(password, decoy).await?;
                info!("Token request rejected: no user named {:?}", username);
                return Err(AppError::InvalidCredentials);
            }
        };

        if !self
            .hasher
            .verify_blocking(password, &user.hashed_password)
            .await?
        {
            info!("Token request rejected: wrong password for user {}", user.id);
            return Err(AppError::InvalidCredentials);
        }

        if user.disabled {
            info!("Token request rejected: user {} is disabled", user.id);
            return Err(AppError::InvalidCredentials);
        }

        let token = SessionToken::new(user.id, generate_token(), self.token_lifetime)?;
        self.tokens
            .insert_token(&token)
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(_) => {
                    AppError::InternalServerError("generated token collided".into())
                }
                other => other.into(),
            })?;

        info!("Issued token {} for user {}", token.id, user.id);
        Ok(token)
    }

    /// Deactivates exactly the given token. Repeating the call is a no-op.
    pub async fn logout(&self, token: &str) -> Result<(), AppError> {
        let changed = self.tokens.deactivate_token(token).await?;
        if changed == 0 {
            warn!("Logout found no active token to deactivate");
        }
        Ok(())
    }

    /// Deactivates every token owned by `user_id`. Zero matching rows is not an error.
    pub async fn logout_all(&self, user_id: Uuid) -> Result<(), AppError> {
        let changed = self.tokens.deactivate_user_tokens(user_id).await?;
        info!("Deactivated {} token(s) for user {}", changed, user_id);
        Ok(())
    }
}
