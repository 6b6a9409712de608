use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::core::RuntimeContext;

use super::{SavedSnippet, SnippetError, SnippetStore, SnippetSummary};

/// In-memory snippet store, one row set per user id. Ids are sequential like
/// the autoincrement column they stand in for.
pub struct MemorySnippetStore {
    context: RuntimeContext,
    rows: DashMap<i64, Vec<SavedSnippet>>,
    next_id: AtomicI64,
}

impl MemorySnippetStore {
    pub fn new(context: RuntimeContext) -> Self {
        Self {
            context,
            rows: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.context.now_millis()).unwrap_or_else(Utc::now)
    }
}

impl Default for MemorySnippetStore {
    fn default() -> Self {
        Self::new(RuntimeContext::default())
    }
}

#[async_trait]
impl SnippetStore for MemorySnippetStore {
    async fn insert(
        &self,
        user_id: i64,
        title: &str,
        code: &str,
    ) -> Result<SavedSnippet, SnippetError> {
        let now = self.now();
        let snippet = SavedSnippet {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            title: title.to_string(),
            code: code.to_string(),
            created_at: now,
            last_modified: now,
        };
        self.rows.entry(user_id).or_default().push(snippet.clone());
        Ok(snippet)
    }

    async fn update(
        &self,
        user_id: i64,
        id: i64,
        title: &str,
        code: &str,
    ) -> Result<SavedSnippet, SnippetError> {
        let now = self.now();
        let mut rows = self.rows.entry(user_id).or_default();
        let row = rows
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(SnippetError::NotFound(id))?;
        row.title = title.to_string();
        row.code = code.to_string();
        row.last_modified = now;
        Ok(row.clone())
    }

    async fn list(&self, user_id: i64) -> Result<Vec<SnippetSummary>, SnippetError> {
        let mut summaries: Vec<SnippetSummary> = self
            .rows
            .get(&user_id)
            .map(|rows| {
                rows.iter()
                    .map(|s| SnippetSummary {
                        id: s.id,
                        title: s.title.clone(),
                        created_at: s.created_at,
                        last_modified: s.last_modified,
                    })
                    .collect()
            })
            .unwrap_or_default();
        summaries.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then(b.id.cmp(&a.id))
        });
        Ok(summaries)
    }

    async fn get(&self, user_id: i64, id: i64) -> Result<SavedSnippet, SnippetError> {
        self.rows
            .get(&user_id)
            .and_then(|rows| rows.iter().find(|s| s.id == id).cloned())
            .ok_or(SnippetError::NotFound(id))
    }

    async fn delete(&self, user_id: i64, id: i64) -> Result<(), SnippetError> {
        let mut rows = self.rows.entry(user_id).or_default();
        let before = rows.len();
        rows.retain(|s| s.id != id);
        if rows.len() == before {
            return Err(SnippetError::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FakeTimeProvider;
    use std::sync::Arc;

    fn store_at(millis: i64) -> (MemorySnippetStore, Arc<FakeTimeProvider>) {
        let time = Arc::new(FakeTimeProvider::new(millis));
        let context = RuntimeContext::default().with_time_provider(time.clone());
        (MemorySnippetStore::new(context), time)
    }

    #[tokio::test]
    async fn test_list_orders_by_last_modified_desc() {
        let (store, time) = store_at(1_000);
        let first = store.insert(1, "first", "print(1)").await.unwrap();
        time.advance_millis(1_000);
        let second = store.insert(1, "second", "print(2)").await.unwrap();

        let listed = store.list(1).await.unwrap();
        assert_eq!(
            listed.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
    }

    #[tokio::test]
    async fn test_update_bumps_last_modified_and_reorders() {
        let (store, time) = store_at(1_000);
        let first = store.insert(1, "first", "print(1)").await.unwrap();
        time.advance_millis(1_000);
        store.insert(1, "second", "print(2)").await.unwrap();

        time.advance_millis(1_000);
        let updated = store.update(1, first.id, "first v2", "print(3)").await.unwrap();
        assert_eq!(updated.created_at, first.created_at);
        assert!(updated.last_modified > first.last_modified);

        let listed = store.list(1).await.unwrap();
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[0].title, "first v2");
    }

    #[tokio::test]
    async fn test_rows_are_owner_scoped() {
        let (store, _time) = store_at(1_000);
        let mine = store.insert(1, "mine", "print(1)").await.unwrap();

        let err = store.get(2, mine.id).await.unwrap_err();
        assert!(matches!(err, SnippetError::NotFound(_)));
        assert!(store.list(2).await.unwrap().is_empty());

        let err = store.delete(2, mine.id).await.unwrap_err();
        assert!(matches!(err, SnippetError::NotFound(_)));
        store.get(1, mine.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_removes_row() {
        let (store, _time) = store_at(1_000);
        let snippet = store.insert(1, "mine", "print(1)").await.unwrap();
        store.delete(1, snippet.id).await.unwrap();
        assert!(store.list(1).await.unwrap().is_empty());

        let err = store.delete(1, snippet.id).await.unwrap_err();
        assert!(matches!(err, SnippetError::NotFound(_)));
    }
}
