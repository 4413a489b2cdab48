use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Persists provider API keys by storage key.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, storage_key: &str) -> Option<String>;
    async fn set(&self, storage_key: &str, secret: String);
}

/// Process-local credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    secrets: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, storage_key: &str) -> Option<String> {
        self.secrets.read().await.get(storage_key).cloned()
    }

    async fn set(&self, storage_key: &str, secret: String) {
        self.secrets
            .write()
            .await
            .insert(storage_key.to_string(), secret);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.get("slingcheck_claude_api_key").await, None);

        store.set("slingcheck_claude_api_key", "sk-1".to_string()).await;
        store.set("slingcheck_claude_api_key", "sk-2".to_string()).await;
        assert_eq!(
            store.get("slingcheck_claude_api_key").await.as_deref(),
            Some("sk-2")
        );
        assert_eq!(store.get("slingcheck_openai_api_key").await, None);
    }
}
