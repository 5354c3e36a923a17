use crate::crypto::{Sealed, NONCE_LEN};
use crate::{MasterKey, SecretError, SecretStore, SecretStoreHealth};
use async_trait::async_trait;
use sqlx::PgPool;

/// Postgres-backed store. Every statement is parameterized by `user_id`;
/// there is no query in this module that omits it, so no read path can
/// cross from one user's secrets into another's.
pub struct PostgresSecretStore {
    pool: PgPool,
    master_key: MasterKey,
}

impl PostgresSecretStore {
    pub fn new(pool: PgPool, master_key: MasterKey) -> Self {
        Self { pool, master_key }
    }
}

#[async_trait]
impl SecretStore for PostgresSecretStore {
    async fn put(&self, user_id: &str, provider: &str, plaintext: &str) -> Result<(), SecretError> {
        let sealed = self.master_key.seal(plaintext)?;
        sqlx::query(
            "INSERT INTO user_keys (user_id, provider, ciphertext, nonce, created_at)
             VALUES ($1, $2, $3, $4, now())
             ON CONFLICT (user_id, provider)
             DO UPDATE SET ciphertext = EXCLUDED.ciphertext, nonce = EXCLUDED.nonce",
        )
        .bind(user_id)
        .bind(provider)
        .bind(&sealed.ciphertext)
        .bind(&sealed.nonce[..])
        .execute(&self.pool)
        .await
        .map_err(|e| SecretError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, user_id: &str, provider: &str) -> Result<String, SecretError> {
        let row: Option<(Vec<u8>, Vec<u8>)> = sqlx::query_as(
            "SELECT ciphertext, nonce FROM user_keys WHERE user_id = $1 AND provider = $2",
        )
        .bind(user_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SecretError::Backend(e.to_string()))?;

        let (ciphertext, nonce) = row.ok_or_else(|| SecretError::NotFound {
            user_id: user_id.to_string(),
            provider: provider.to_string(),
        })?;
        let nonce: [u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| SecretError::Backend("stored nonce has the wrong length".into()))?;
        Ok(self.master_key.open(&Sealed { nonce, ciphertext })?)
    }

    async fn list_providers(&self, user_id: &str) -> Result<Vec<String>, SecretError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT provider FROM user_keys WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| SecretError::Backend(e.to_string()))?;
        Ok(rows.into_iter().map(|(p,)| p).collect())
    }

    async fn delete(&self, user_id: &str, provider: &str) -> Result<(), SecretError> {
        sqlx::query("DELETE FROM user_keys WHERE user_id = $1 AND provider = $2")
            .bind(user_id)
            .bind(provider)
            .execute(&self.pool)
            .await
            .map_err(|e| SecretError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn health(&self) -> Result<SecretStoreHealth, SecretError> {
        let (users, secrets): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(DISTINCT user_id), COUNT(*) FROM user_keys",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SecretError::Backend(e.to_string()))?;
        let providers: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT provider FROM user_keys")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| SecretError::Backend(e.to_string()))?;
        Ok(SecretStoreHealth {
            connected: true,
            users: users as usize,
            secrets: secrets as usize,
            providers: providers.into_iter().map(|(p,)| p).collect(),
        })
    }
}
