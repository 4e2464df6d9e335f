use log::info;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::password::CredentialHasher;
use crate::config::AuthConfig;
use crate::error::AppError;
use crate::models::User;
use crate::store::UserStore;

/// Registration and deletion of user accounts.
pub struct AccountService {
    users: Arc<dyn UserStore>,
    hasher: CredentialHasher,
    username_max_length: usize,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>, config: &AuthConfig) -> Self {
        Self {
            users,
            hasher: CredentialHasher::new(config.bcrypt_cost),
            username_max_length: config.username_max_length,
        }
    }

    /// Creates a user whose password is stored only as a hasher secret.
    /// A taken username fails with `AppError::DuplicateUser` and leaves the existing row alone.
    pub async fn register(&self, username: &str, password: &str) -> Result<User, AppError> {
        if username.chars().count() > self.username_max_length {
            return Err(AppError::BadRequest(format!(
                "Username must be at most {} characters long.",
                self.username_max_length
            )));
        }

        let hashed_password = self.hasher.hash_blocking(password).await?;
        let user = User::new(username.to_string(), hashed_password);
        self.users.insert_user(&user).await?;

        info!("Registered user {}", user.id);
        Ok(user)
    }

    /// Removes the user and deactivates all of their tokens in one unit of work.
    pub async fn delete(&self, user_id: Uuid) -> Result<(), AppError> {
        if self.users.delete_user(user_id).await? {
            info!("Deleted user {}", user_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service(store: Arc<MemoryStore>) -> AccountService {
        AccountService::new(
            store,
            &AuthConfig {
                token_expiration_minutes: 30,
                bcrypt_cost: 4,
                username_max_length: 8,
            },
        )
    }

    #[actix_rt::test]
    async fn test_register_stores_hashed_password() {
        let store = Arc::new(MemoryStore::new());
        let user = service(store.clone()).register("alice", "Secr3t!").await.unwrap();

        let stored = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_ne!(stored.hashed_password, "Secr3t!");
        assert!(CredentialHasher::new(4)
            .verify("Secr3t!", &stored.hashed_password)
            .unwrap());
    }

    #[actix_rt::test]
    async fn test_duplicate_username_keeps_first_user() {
        let store = Arc::new(MemoryStore::new());
        let accounts = service(store.clone());
        let first = accounts.register("alice", "Secr3t!").await.unwrap();

        assert!(matches!(
            accounts.register("alice", "other-password").await,
            Err(AppError::DuplicateUser)
        ));

        let stored = store.find_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(stored, first);
    }

    #[actix_rt::test]
    async fn test_username_length_is_bounded() {
        let accounts = service(Arc::new(MemoryStore::new()));

        assert!(accounts.register("eightchr", "Secr3t!").await.is_ok());
        assert!(matches!(
            accounts.register("ninechars", "Secr3t!").await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[actix_rt::test]
    async fn test_delete_missing_user_is_not_an_error() {
        let accounts = service(Arc::new(MemoryStore::new()));
        accounts.delete(Uuid::new_v4()).await.unwrap();
    }
}
