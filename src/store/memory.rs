use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{StoreError, TokenStore, UserStore};
use crate::models::{SessionToken, User};

/// In-process store over two locked maps. State is lost on restart and not shared between
/// instances.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    // keyed by token string
    tokens: RwLock<HashMap<String, SessionToken>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate("username".into()));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        // Lock order users -> tokens, held together so the delete is observed atomically.
        let mut users = self.users.write().await;
        let mut tokens = self.tokens.write().await;
        // Token rows go with the user, as the Postgres foreign key cascades
        tokens.retain(|_, t| t.user_id != id);
        Ok(users.remove(&id).is_some())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert_token(&self, token: &SessionToken) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write().await;
        if tokens.contains_key(&token.token) {
            return Err(StoreError::Duplicate("token".into()));
        }
        tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn find_token(&self, token: &str) -> Result<Option<SessionToken>, StoreError> {
        Ok(self.tokens.read().await.get(token).cloned())
    }

    async fn deactivate_token(&self, token: &str) -> Result<u64, StoreError> {
        let mut tokens = self.tokens.write().await;
        match tokens.get_mut(token) {
            Some(row) if row.active => {
                row.active = false;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn deactivate_user_tokens(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut tokens = self.tokens.write().await;
        let mut changed = 0;
        for row in tokens.values_mut().filter(|t| t.user_id == user_id && t.active) {
            row.active = false;
            changed += 1;
        }
        Ok(changed)
    }
}
