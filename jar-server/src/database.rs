use crate::errors::ServerResult;
use crate::queries::Queries;
use crate::repository::MemoryRepository;
use async_trait::async_trait;
use jar_core::{JarId, MemoryId, MemoryRow, NewMemoryRow, RowFields};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};

/// Postgres-backed repository.
pub struct PgRepository {
    pub pool: PgPool,
}

impl PgRepository {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> ServerResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn row_to_memory(row: &PgRow) -> Result<MemoryRow, sqlx::Error> {
    let jar_id: String = row.try_get("jar_id")?;
    Ok(MemoryRow {
        id: MemoryId(row.try_get("id")?),
        fields: RowFields {
            title: row.try_get("title")?,
            text: row.try_get("text")?,
            date: row.try_get("date")?,
            image_url: row.try_get("image_url")?,
            audio_url: row.try_get("audio_url")?,
            tags: row.try_get("tags")?,
        },
        jar_id: JarId::parse(&jar_id).map_err(|e| sqlx::Error::Decode(e.into()))?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl MemoryRepository for PgRepository {
    async fn list(&self, jar_id: &JarId) -> ServerResult<Vec<MemoryRow>> {
        let rows = sqlx::query(Queries::LIST_BY_JAR)
            .bind(jar_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(row_to_memory)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn insert(&self, row: NewMemoryRow) -> ServerResult<MemoryRow> {
        let fields = row.fields;
        let stored = sqlx::query(Queries::INSERT)
            .bind(row.jar_id.as_str())
            .bind(&fields.title)
            .bind(&fields.text)
            .bind(&fields.date)
            .bind(&fields.image_url)
            .bind(&fields.audio_url)
            .bind(&fields.tags)
            .fetch_one(&self.pool)
            .await?;

        Ok(row_to_memory(&stored)?)
    }

    async fn update(&self, id: MemoryId, fields: RowFields) -> ServerResult<Option<MemoryRow>> {
        let stored = sqlx::query(Queries::UPDATE)
            .bind(id.0)
            .bind(&fields.title)
            .bind(&fields.text)
            .bind(&fields.date)
            .bind(&fields.image_url)
            .bind(&fields.audio_url)
            .bind(&fields.tags)
            .fetch_optional(&self.pool)
            .await?;

        Ok(stored.as_ref().map(row_to_memory).transpose()?)
    }

    async fn delete(&self, id: MemoryId) -> ServerResult<Option<JarId>> {
        let deleted = sqlx::query(Queries::DELETE)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match deleted {
            Some(row) => {
                let jar_id: String = row.try_get("jar_id")?;
                Ok(JarId::parse(&jar_id).ok())
            }
            None => Ok(None),
        }
    }
}
