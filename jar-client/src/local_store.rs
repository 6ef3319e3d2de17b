//! Durable key/value persistence for jar state.
//!
//! Reads and writes never fail from the caller's point of view: a backend
//! failure is logged and a read comes back as absent.

use async_trait::async_trait;
use jar_core::{JarHistory, JarId, Memory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub const MEMORIES_KEY: &str = "memories";
pub const JAR_ID_KEY: &str = "jar_id";
pub const JAR_HISTORY_KEY: &str = "jar_history";

#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str);
    async fn remove(&self, key: &str);
}

/// Process-local store, used by tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for InMemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        match self.values.read() {
            Ok(values) => values.get(key).cloned(),
            Err(e) => {
                tracing::warn!("LOCAL: read lock poisoned for {}: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) {
        match self.values.write() {
            Ok(mut values) => {
                values.insert(key.to_string(), value.to_string());
            }
            Err(e) => tracing::warn!("LOCAL: write lock poisoned for {}: {}", key, e),
        }
    }

    async fn remove(&self, key: &str) {
        match self.values.write() {
            Ok(mut values) => {
                values.remove(key);
            }
            Err(e) => tracing::warn!("LOCAL: write lock poisoned for {}: {}", key, e),
        }
    }
}

/// Typed access to the keys the jar client persists.
#[derive(Clone)]
pub struct JarStorage {
    store: Arc<dyn LocalStore>,
}

impl JarStorage {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    pub async fn active_jar(&self) -> Option<JarId> {
        let raw = self.store.get(JAR_ID_KEY).await?;
        match JarId::parse(&raw) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("LOCAL: ignoring stored jar id: {}", e);
                None
            }
        }
    }

    pub async fn set_active_jar(&self, id: &JarId) {
        self.store.set(JAR_ID_KEY, id.as_str()).await;
    }

    pub async fn clear_active_jar(&self) {
        self.store.remove(JAR_ID_KEY).await;
    }

    pub async fn history(&self) -> JarHistory {
        let entries: Vec<JarId> = self.read_json(JAR_HISTORY_KEY).await.unwrap_or_default();
        JarHistory::from_entries(entries)
    }

    pub async fn save_history(&self, history: &JarHistory) {
        self.write_json(JAR_HISTORY_KEY, history).await;
    }

    /// Records kept by the local-only journal.
    pub async fn offline_memories(&self) -> Vec<Memory> {
        self.read_json(MEMORIES_KEY).await.unwrap_or_default()
    }

    pub async fn save_offline_memories(&self, memories: &[Memory]) {
        self.write_json(MEMORIES_KEY, memories).await;
    }

    async fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("LOCAL: discarding unreadable value under {}: {}", key, e);
                None
            }
        }
    }

    async fn write_json<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.store.set(key, &raw).await,
            Err(e) => tracing::error!("LOCAL: failed to serialize {}: {}", key, e),
        }
    }
}
