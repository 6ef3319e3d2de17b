use crate::local_store::LocalStore;
use crate::queries::Queries;
use async_trait::async_trait;
use jar_core::{JarError, JarResult};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};

/// SQLite-backed local store.
pub struct SqliteStore {
    pub pool: SqlitePool,
}

fn db_error(e: sqlx::Error) -> JarError {
    JarError::Database(e.to_string())
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> JarResult<Self> {
        // Every connection to `:memory:` is a separate database, so keep exactly one alive
        let in_memory = database_url.contains(":memory:");
        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = options.connect(database_url).await.map_err(db_error)?;
        tracing::info!("DATABASE: opened local store at {}", database_url);

        Ok(Self { pool })
    }

    /// Opens the store and brings its schema up to date.
    pub async fn open(database_url: &str) -> JarResult<Self> {
        let store = Self::new(database_url).await?;
        store.run_migrations().await?;
        Ok(store)
    }

    pub async fn run_migrations(&self) -> JarResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| JarError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn try_get(&self, key: &str) -> JarResult<Option<String>> {
        let row = sqlx::query(Queries::GET_VALUE)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        match row {
            Some(row) => Ok(Some(row.try_get("value").map_err(db_error)?)),
            None => Ok(None),
        }
    }

    pub async fn try_set(&self, key: &str, value: &str) -> JarResult<()> {
        sqlx::query(Queries::UPSERT_VALUE)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        tracing::debug!("DATABASE: stored {} ({} bytes)", key, value.len());
        Ok(())
    }

    pub async fn try_remove(&self, key: &str) -> JarResult<()> {
        sqlx::query(Queries::DELETE_VALUE)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn get(&self, key: &str) -> Option<String> {
        match self.try_get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("DATABASE: read of {} failed: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) {
        if let Err(e) = self.try_set(key, value).await {
            tracing::error!("DATABASE: write of {} failed: {}", key, e);
        }
    }

    async fn remove(&self, key: &str) {
        if let Err(e) = self.try_remove(key).await {
            tracing::error!("DATABASE: delete of {} failed: {}", key, e);
        }
    }
}
