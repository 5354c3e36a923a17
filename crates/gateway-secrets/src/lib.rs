//! Encrypted per-user provider-key storage.
//!
//! Every operation is parameterized by `user_id`; there is no query path
//! that can return another user's row. The [`SecretStore`] trait is
//! implemented twice: [`InMemorySecretStore`] for tests and single-process
//! development, and [`PostgresSecretStore`] for production.

mod crypto;
mod memory;
mod postgres;

pub use crypto::{CryptoError, MasterKey};
pub use memory::InMemorySecretStore;
pub use postgres::PostgresSecretStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("no key stored for user '{user_id}' and provider '{provider}'")]
    NotFound { user_id: String, provider: String },
    #[error("encryption error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct UserKeyMeta {
    pub user_id: String,
    pub provider: String,
    pub created_at: DateTime<Utc>,
}

/// Health snapshot that deliberately excludes any key material: only
/// counts of connected users, secrets, and providers are reported.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SecretStoreHealth {
    pub connected: bool,
    pub users: usize,
    pub secrets: usize,
    pub providers: Vec<String>,
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn put(&self, user_id: &str, provider: &str, plaintext: &str) -> Result<(), SecretError>;

    async fn get(&self, user_id: &str, provider: &str) -> Result<String, SecretError>;

    async fn list_providers(&self, user_id: &str) -> Result<Vec<String>, SecretError>;

    async fn rotate(
        &self,
        user_id: &str,
        provider: &str,
        new_plaintext: &str,
    ) -> Result<(), SecretError> {
        self.put(user_id, provider, new_plaintext).await
    }

    async fn delete(&self, user_id: &str, provider: &str) -> Result<(), SecretError>;

    async fn health(&self) -> Result<SecretStoreHealth, SecretError>;
}
