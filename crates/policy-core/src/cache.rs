//! Lazily populated, write-through index over a [`BackingStore`].
//!
//! The cache moves through three states: [`LoadState::Unloaded`] until the
//! first lookup, [`LoadState::Partial`] while only looked-up keys are known,
//! and [`LoadState::Full`] once [`ResolverCache::list_all`] has read every
//! row. In the partial state each unknown key costs exactly one
//! `load_one`, and the answer is remembered even when the row is absent.
//! In the full state the store is never read again.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::{
    error::{CacheError, StoreOperation},
    rules::Keyed,
    store::BackingStore,
    trie::{PrefixTrie, word_prefixes},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Partial,
    Full,
}

/// A trie slot: either a known row or a remembered miss.
#[derive(Debug, Clone)]
enum Slot<V> {
    Present(V),
    Absent,
}

impl<V> Slot<V> {
    const fn present(&self) -> Option<&V> {
        match self {
            Self::Present(v) => Some(v),
            Self::Absent => None,
        }
    }
}

#[derive(Debug)]
struct Index<V> {
    trie: PrefixTrie<Slot<V>>,
    state: LoadState,
}

impl<V: Clone> Index<V> {
    fn lookup(&self, key: &str) -> Option<Option<V>> {
        match self.trie.get(key) {
            Some(slot) => Some(slot.present().cloned()),
            None if self.state == LoadState::Full => Some(None),
            None => None,
        }
    }

    fn longest_present(&self, query: &str) -> Option<V> {
        self.trie
            .prefix_matches(query)
            .into_iter()
            .find_map(|(_, slot)| slot.present().cloned())
    }

    /// Records a read-through result unless a newer write already filled
    /// the slot or a full load superseded partial knowledge.
    fn remember(&mut self, key: &str, row: Option<V>) {
        if self.state == LoadState::Full || self.trie.get(key).is_some() {
            return;
        }
        let slot = row.map_or(Slot::Absent, Slot::Present);
        self.trie.insert(key, slot);
        self.state = LoadState::Partial;
    }
}

pub struct ResolverCache<V> {
    collection: &'static str,
    store: Arc<dyn BackingStore<V>>,
    index: RwLock<Index<V>>,
    // Serializes mutations and full loads so neither interleaves with a
    // write-through.
    writer: Mutex<()>,
}

impl<V> core::fmt::Debug for ResolverCache<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResolverCache")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl<V> ResolverCache<V>
where
    V: Keyed + Clone + Send + Sync + 'static,
{
    pub fn new(collection: &'static str, store: Arc<dyn BackingStore<V>>) -> Self {
        Self {
            collection,
            store,
            index: RwLock::new(Index {
                trie: PrefixTrie::new(),
                state: LoadState::Unloaded,
            }),
            writer: Mutex::new(()),
        }
    }

    pub async fn state(&self) -> LoadState {
        self.index.read().await.state
    }

    /// Exact-key lookup, reading through to the store on a cold miss.
    pub async fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        if let Some(known) = self.index.read().await.lookup(key) {
            return Ok(known);
        }
        let row = self.load_one(key).await?;
        let mut index = self.index.write().await;
        index.remember(key, row);
        Ok(index.lookup(key).flatten())
    }

    /// Longest word-bounded prefix lookup (see [`PrefixTrie`]).
    ///
    /// Before the full load, every candidate prefix of `query` that was
    /// never asked about is read through once.
    pub async fn resolve(&self, query: &str) -> Result<Option<V>, CacheError> {
        let missing: Vec<&str> = {
            let index = self.index.read().await;
            if index.state == LoadState::Full {
                return Ok(index.longest_present(query));
            }
            word_prefixes(query)
                .into_iter()
                .filter(|candidate| index.trie.get(candidate).is_none())
                .collect()
        };

        let mut loaded = Vec::with_capacity(missing.len());
        for candidate in missing {
            loaded.push((candidate, self.load_one(candidate).await?));
        }

        let mut index = self.index.write().await;
        for (candidate, row) in loaded {
            index.remember(candidate, row);
        }
        Ok(index.longest_present(query))
    }

    /// Every row in the collection. The first call loads the whole store;
    /// afterwards the cache answers on its own.
    pub async fn list_all(&self) -> Result<Vec<V>, CacheError> {
        {
            let index = self.index.read().await;
            if index.state == LoadState::Full {
                return Ok(present_values(&index.trie));
            }
        }

        let _writer = self.writer.lock().await;
        let mut index = self.index.write().await;
        if index.state != LoadState::Full {
            let rows = self
                .store
                .load_all()
                .await
                .map_err(|source| self.store_error(StoreOperation::LoadAll, "*", source))?;
            index.trie.clear();
            for row in rows {
                let key = row.key().to_owned();
                index.trie.insert(&key, Slot::Present(row));
            }
            index.state = LoadState::Full;
            debug!(collection = self.collection, rows = index.trie.len(), "Cache fully loaded");
        }
        Ok(present_values(&index.trie))
    }

    /// Writes `value` to the store and, only once the store accepted it,
    /// to the index.
    pub async fn upsert(&self, value: V) -> Result<(), CacheError> {
        let _writer = self.writer.lock().await;
        self.write_through(value).await
    }

    /// Stores `value` only if its key is not taken yet. Returns `false`
    /// (and writes nothing) when it is.
    pub async fn insert_new(&self, value: V) -> Result<bool, CacheError> {
        let _writer = self.writer.lock().await;
        if self.get(value.key()).await?.is_some() {
            return Ok(false);
        }
        self.write_through(value).await?;
        Ok(true)
    }

    /// Overwrites an existing row. Returns `false` (and writes nothing) when
    /// no row exists under the key.
    pub async fn replace(&self, value: V) -> Result<bool, CacheError> {
        let _writer = self.writer.lock().await;
        if self.get(value.key()).await?.is_none() {
            return Ok(false);
        }
        self.write_through(value).await?;
        Ok(true)
    }

    /// Deletes `key` from the store, then from the index. Returns whether a
    /// row existed.
    pub async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let _writer = self.writer.lock().await;
        let existed = self
            .store
            .delete(key)
            .await
            .map_err(|source| self.store_error(StoreOperation::Delete, key, source))?;

        let mut index = self.index.write().await;
        if index.state == LoadState::Full {
            index.trie.remove(key);
        } else {
            index.trie.insert(key, Slot::Absent);
            index.state = LoadState::Partial;
        }
        info!(collection = self.collection, key, existed, "Removed cached row");
        Ok(existed)
    }

    /// Drops everything the cache knows; the next lookup starts over from
    /// the store.
    pub async fn invalidate(&self) {
        let _writer = self.writer.lock().await;
        let mut index = self.index.write().await;
        index.trie.clear();
        index.state = LoadState::Unloaded;
    }

    async fn write_through(&self, value: V) -> Result<(), CacheError> {
        let key = value.key().to_owned();
        let accepted = self
            .store
            .upsert(&value)
            .await
            .map_err(|source| self.store_error(StoreOperation::Upsert, &key, source))?;
        if !accepted {
            return Err(CacheError::Rejected {
                collection: self.collection,
                operation: StoreOperation::Upsert,
                key,
            });
        }

        let mut index = self.index.write().await;
        index.trie.insert(&key, Slot::Present(value));
        if index.state == LoadState::Unloaded {
            index.state = LoadState::Partial;
        }
        info!(collection = self.collection, key = %key, "Stored row");
        Ok(())
    }

    async fn load_one(&self, key: &str) -> Result<Option<V>, CacheError> {
        debug!(collection = self.collection, key, "Cache miss, reading through");
        self.store
            .load_one(key)
            .await
            .map_err(|source| self.store_error(StoreOperation::LoadOne, key, source))
    }

    fn store_error(&self, operation: StoreOperation, key: &str, source: anyhow::Error) -> CacheError {
        CacheError::Store {
            collection: self.collection,
            operation,
            key: key.to_owned(),
            source,
        }
    }
}

fn present_values<V: Clone>(trie: &PrefixTrie<Slot<V>>) -> Vec<V> {
    trie.values().filter_map(|slot| slot.present().cloned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rules::CustomCommand, store::MemoryStore};

    fn command(name: &str, template: &str) -> CustomCommand {
        CustomCommand {
            name: name.to_owned(),
            template: template.to_owned(),
            owner_id: 1,
        }
    }

    fn cache_with(rows: Vec<CustomCommand>) -> ResolverCache<CustomCommand> {
        ResolverCache::new("commands", Arc::new(MemoryStore::with_rows(rows)))
    }

    #[tokio::test]
    async fn moves_through_load_states() {
        let cache = cache_with(vec![command("hi", "hello")]);
        assert_eq!(cache.state().await, LoadState::Unloaded);

        assert_eq!(cache.get("hi").await.unwrap(), Some(command("hi", "hello")));
        assert_eq!(cache.state().await, LoadState::Partial);

        assert_eq!(cache.list_all().await.unwrap().len(), 1);
        assert_eq!(cache.state().await, LoadState::Full);
    }

    #[tokio::test]
    async fn insert_new_refuses_existing_names() {
        let cache = cache_with(vec![command("hi", "hello")]);
        assert!(!cache.insert_new(command("hi", "other")).await.unwrap());
        assert_eq!(cache.get("hi").await.unwrap().unwrap().template, "hello");
        assert!(cache.insert_new(command("bye", "later")).await.unwrap());
    }

    #[tokio::test]
    async fn replace_requires_existing_row() {
        let cache = cache_with(vec![command("hi", "hello")]);
        assert!(!cache.replace(command("bye", "later")).await.unwrap());
        assert_eq!(cache.get("bye").await.unwrap(), None);
        assert!(cache.replace(command("hi", "hey")).await.unwrap());
        assert_eq!(cache.get("hi").await.unwrap().unwrap().template, "hey");
    }

    #[tokio::test]
    async fn remove_is_remembered_as_absent() {
        let cache = cache_with(vec![command("hi", "hello")]);
        assert!(cache.remove("hi").await.unwrap());
        assert_eq!(cache.get("hi").await.unwrap(), None);
        assert!(!cache.remove("hi").await.unwrap());
    }

    #[tokio::test]
    async fn full_cache_does_not_grow_with_free_text() {
        let cache = cache_with(vec![command("hug", "{sender} hugs")]);
        cache.list_all().await.unwrap();
        for i in 0..1000 {
            let query = format!("hug someone message {i}");
            assert_eq!(cache.resolve(&query).await.unwrap().unwrap().name, "hug");
        }
        assert_eq!(cache.index.read().await.trie.len(), 1);
    }

    #[tokio::test]
    async fn invalidate_reloads_from_store() {
        let cache = cache_with(vec![command("hi", "hello")]);
        cache.list_all().await.unwrap();
        cache.invalidate().await;
        assert_eq!(cache.state().await, LoadState::Unloaded);
        assert_eq!(cache.list_all().await.unwrap().len(), 1);
    }
}
