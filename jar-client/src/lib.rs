pub mod client;
pub mod config;
pub mod database;
pub mod events;
pub mod local_store;
pub mod media;
pub mod queries;
pub mod remote;
pub mod websocket;

pub use client::{Backup, Confirmation, DeleteOutcome, JarClient, JarMode, DELETE_PROMPT};
pub use config::ClientConfig;
pub use database::SqliteStore;
pub use events::{EventDispatcher, EventType, JarEvent};
pub use local_store::{InMemoryStore, JarStorage, LocalStore};
pub use media::{AudioSource, AudioStream, MediaBlob, Recorder};
pub use remote::{HttpRemote, RemoteStore};
pub use websocket::{ChangeSignal, ReleaseHandle, Subscription};

#[cfg(test)]
mod tests {
    use super::*;
    use jar_core::{JarHistory, JarId};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sqlite_backed_storage() {
        let db = SqliteStore::new("sqlite::memory:").await.unwrap();
        sqlx::query(queries::Queries::SCHEMA)
            .execute(&db.pool)
            .await
            .unwrap();

        let storage = JarStorage::new(Arc::new(db));
        assert_eq!(storage.active_jar().await, None);

        let jar = JarId::parse("abc123").unwrap();
        storage.set_active_jar(&jar).await;
        assert_eq!(storage.active_jar().await, Some(jar.clone()));

        let mut history = JarHistory::new();
        history.remember(jar.clone());
        storage.save_history(&history).await;
        assert_eq!(storage.history().await, history);

        storage.clear_active_jar().await;
        assert_eq!(storage.active_jar().await, None);
        // History survives leaving the jar
        assert_eq!(storage.history().await.entries(), &[jar]);
    }
}
