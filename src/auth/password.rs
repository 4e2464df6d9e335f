use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// One-way password transform: SHA-256 of the plaintext, base64-encoded, then bcrypt.
///
/// The digest stage normalizes any input length to 44 ASCII bytes, so bcrypt's 72-byte
/// truncation never silently drops the tail of a long password.
#[derive(Debug, Clone, Copy)]
pub struct CredentialHasher {
    cost: u32,
}

impl CredentialHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        bcrypt::hash(prehash(password), self.cost)
            .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {}", e)))
    }

    /// Checks `password` against a stored secret using bcrypt's own comparison.
    /// A secret bcrypt cannot parse yields `AppError::CorruptCredential`.
    pub fn verify(&self, password: &str, hashed_password: &str) -> Result<bool, AppError> {
        Ok(bcrypt::verify(prehash(password), hashed_password)?)
    }

    /// `hash` on the blocking thread pool, keeping bcrypt's work off the async workers.
    pub async fn hash_blocking(&self, password: &str) -> Result<String, AppError> {
        let hasher = *self;
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::InternalServerError(format!("Hashing task failed: {}", e)))?
    }

    /// `verify` on the blocking thread pool.
    pub async fn verify_blocking(
        &self,
        password: &str,
        hashed_password: &str,
    ) -> Result<bool, AppError> {
        let hasher = *self;
        let password = password.to_owned();
        let hashed_password = hashed_password.to_owned();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hashed_password))
            .await
            .map_err(|e| AppError::InternalServerError(format!("Verify task failed: {}", e)))?
    }
}

fn prehash(password: &str) -> String {
    STANDARD.encode(Sha256::digest(password.as_bytes()))
}
