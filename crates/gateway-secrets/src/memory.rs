use crate::{MasterKey, SecretError, SecretStore, SecretStoreHealth};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

struct Row {
    sealed: crate::crypto::Sealed,
    created_at: chrono::DateTime<Utc>,
}

/// `DashMap`-backed store matching the teacher's shared-state idiom for
/// in-process concurrent maps. Intended for tests and single-process
/// development deployments; production uses [`crate::PostgresSecretStore`].
pub struct InMemorySecretStore {
    master_key: MasterKey,
    rows: DashMap<(String, String), Row>,
}

impl InMemorySecretStore {
    pub fn new(master_key: MasterKey) -> Self {
        Self {
            master_key,
            rows: DashMap::new(),
        }
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn put(&self, user_id: &str, provider: &str, plaintext: &str) -> Result<(), SecretError> {
        let sealed = self.master_key.seal(plaintext)?;
        self.rows.insert(
            (user_id.to_string(), provider.to_string()),
            Row {
                sealed,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, user_id: &str, provider: &str) -> Result<String, SecretError> {
        let row = self
            .rows
            .get(&(user_id.to_string(), provider.to_string()))
            .ok_or_else(|| SecretError::NotFound {
                user_id: user_id.to_string(),
                provider: provider.to_string(),
            })?;
        Ok(self.master_key.open(&row.sealed)?)
    }

    async fn list_providers(&self, user_id: &str) -> Result<Vec<String>, SecretError> {
        Ok(self
            .rows
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.key().1.clone())
            .collect())
    }

    async fn delete(&self, user_id: &str, provider: &str) -> Result<(), SecretError> {
        self.rows
            .remove(&(user_id.to_string(), provider.to_string()));
        Ok(())
    }

    async fn health(&self) -> Result<SecretStoreHealth, SecretError> {
        let mut providers: Vec<String> = self
            .rows
            .iter()
            .map(|entry| entry.key().1.clone())
            .collect();
        providers.sort();
        providers.dedup();
        let users: std::collections::HashSet<_> =
            self.rows.iter().map(|entry| entry.key().0.clone()).collect();
        Ok(SecretStoreHealth {
            connected: true,
            users: users.len(),
            secrets: self.rows.len(),
            providers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KEY_LEN;

    fn store() -> InMemorySecretStore {
        InMemorySecretStore::new(MasterKey::from_bytes(&[3u8; KEY_LEN]).unwrap())
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = store();
        store.put("alice", "anthropic", "sk-ant-1").await.unwrap();
        assert_eq!(store.get("alice", "anthropic").await.unwrap(), "sk-ant-1");
    }

    #[tokio::test]
    async fn cross_user_read_is_not_possible() {
        let store = store();
        store.put("alice", "anthropic", "sk-ant-1").await.unwrap();
        let result = store.get("bob", "anthropic").await;
        assert!(matches!(result, Err(SecretError::NotFound { .. })));
    }

    #[tokio::test]
    async fn rotate_replaces_ciphertext() {
        let store = store();
        store.put("alice", "anthropic", "sk-ant-1").await.unwrap();
        store.rotate("alice", "anthropic", "sk-ant-2").await.unwrap();
        assert_eq!(store.get("alice", "anthropic").await.unwrap(), "sk-ant-2");
    }

    #[tokio::test]
    async fn health_never_carries_key_material() {
        let store = store();
        store.put("alice", "anthropic", "sk-ant-1").await.unwrap();
        let health = store.health().await.unwrap();
        assert_eq!(health.secrets, 1);
        assert_eq!(health.users, 1);
        assert_eq!(health.providers, vec!["anthropic".to_string()]);
    }
}
