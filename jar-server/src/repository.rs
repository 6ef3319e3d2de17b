use crate::errors::ServerResult;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use jar_core::{JarId, MemoryId, MemoryRow, NewMemoryRow, RowFields};
use std::sync::atomic::{AtomicI64, Ordering};

/// Storage for `memories` rows.
#[async_trait]
pub trait MemoryRepository: Send + Sync {
    /// Rows of one jar, newest first.
    async fn list(&self, jar_id: &JarId) -> ServerResult<Vec<MemoryRow>>;

    async fn insert(&self, row: NewMemoryRow) -> ServerResult<MemoryRow>;

    /// `None` when no row has this id.
    async fn update(&self, id: MemoryId, fields: RowFields) -> ServerResult<Option<MemoryRow>>;

    /// Returns the jar the deleted row belonged to, `None` if it did not exist.
    async fn delete(&self, id: MemoryId) -> ServerResult<Option<JarId>>;
}

/// Process-local repository used when no database is configured.
#[derive(Default)]
pub struct InMemoryRepository {
    rows: DashMap<i64, MemoryRow>,
    next_id: AtomicI64,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryRepository for InMemoryRepository {
    async fn list(&self, jar_id: &JarId) -> ServerResult<Vec<MemoryRow>> {
        let mut rows: Vec<MemoryRow> = self
            .rows
            .iter()
            .filter(|entry| &entry.value().jar_id == jar_id)
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.0.cmp(&a.id.0))
        });
        Ok(rows)
    }

    async fn insert(&self, row: NewMemoryRow) -> ServerResult<MemoryRow> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = MemoryRow {
            id: MemoryId(id),
            fields: row.fields,
            jar_id: row.jar_id,
            created_at: Utc::now(),
        };
        self.rows.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: MemoryId, fields: RowFields) -> ServerResult<Option<MemoryRow>> {
        Ok(self.rows.get_mut(&id.0).map(|mut entry| {
            entry.fields = fields;
            entry.clone()
        }))
    }

    async fn delete(&self, id: MemoryId) -> ServerResult<Option<JarId>> {
        Ok(self.rows.remove(&id.0).map(|(_, row)| row.jar_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_row(jar: &str, title: &str) -> NewMemoryRow {
        NewMemoryRow {
            fields: RowFields {
                title: title.to_string(),
                text: "text".to_string(),
                date: "1/1/2026".to_string(),
                image_url: None,
                audio_url: None,
                tags: vec![],
            },
            jar_id: JarId::parse(jar).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_list_is_scoped_and_newest_first() {
        let repo = InMemoryRepository::new();
        repo.insert(new_row("A", "a1")).await.unwrap();
        repo.insert(new_row("B", "b1")).await.unwrap();
        repo.insert(new_row("A", "a2")).await.unwrap();

        let rows = repo.list(&JarId::parse("A").unwrap()).await.unwrap();
        let titles: Vec<_> = rows.iter().map(|r| r.fields.title.as_str()).collect();
        assert_eq!(titles, vec!["a2", "a1"]);
    }

    #[tokio::test]
    async fn test_update_and_delete_unknown_ids() {
        let repo = InMemoryRepository::new();
        let stored = repo.insert(new_row("A", "before")).await.unwrap();

        let mut fields = stored.fields.clone();
        fields.title = "after".to_string();
        let updated = repo.update(stored.id, fields.clone()).await.unwrap().unwrap();
        assert_eq!(updated.fields.title, "after");
        assert_eq!(updated.created_at, stored.created_at);
        assert!(repo.update(MemoryId(99), fields).await.unwrap().is_none());

        assert_eq!(
            repo.delete(stored.id).await.unwrap(),
            Some(JarId::parse("A").unwrap())
        );
        assert_eq!(repo.delete(stored.id).await.unwrap(), None);
    }
}
