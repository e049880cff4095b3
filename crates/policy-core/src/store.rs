use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::rules::Keyed;

/// Source of truth behind a [`ResolverCache`](crate::ResolverCache).
///
/// `upsert` returns `false` when the store refuses the row; `delete` returns
/// whether a row existed. Any `Err` is a backing-store failure.
#[async_trait]
pub trait BackingStore<V>: Send + Sync {
    async fn load_all(&self) -> Result<Vec<V>>;
    async fn load_one(&self, key: &str) -> Result<Option<V>>;
    async fn upsert(&self, value: &V) -> Result<bool>;
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// Volatile store for guilds without persistence and for tests.
#[derive(Debug)]
pub struct MemoryStore<V> {
    rows: RwLock<BTreeMap<String, V>>,
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<V: Keyed> MemoryStore<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_rows(rows: impl IntoIterator<Item = V>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| (row.key().to_owned(), row))
            .collect();
        Self {
            rows: RwLock::new(rows),
        }
    }
}

#[async_trait]
impl<V> BackingStore<V> for MemoryStore<V>
where
    V: Keyed + Clone + Send + Sync,
{
    async fn load_all(&self) -> Result<Vec<V>> {
        Ok(self.rows.read().await.values().cloned().collect())
    }

    async fn load_one(&self, key: &str) -> Result<Option<V>> {
        Ok(self.rows.read().await.get(key).cloned())
    }

    async fn upsert(&self, value: &V) -> Result<bool> {
        self.rows
            .write()
            .await
            .insert(value.key().to_owned(), value.clone());
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.rows.write().await.remove(key).is_some())
    }
}
