//! Per-guild data scopes.
//!
//! Every guild owns its own resolver and caches; nothing is shared between
//! guilds except the rank classifier and the clock.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use policy_core::{
    BackingStore, CacheError, Clock, CooldownRule, CustomCommand, Keyword, MemoryStore,
    PermissionRule, PolicyResolver, RankClassifier, ResolverCache,
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{events::MemoryEvents, keywords::PatternCache};

/// Backing stores for one guild's collections.
pub struct GuildStores {
    pub permissions: Arc<dyn BackingStore<PermissionRule>>,
    pub cooldowns: Arc<dyn BackingStore<CooldownRule>>,
    pub commands: Arc<dyn BackingStore<CustomCommand>>,
    pub keywords: Arc<dyn BackingStore<Keyword>>,
}

impl core::fmt::Debug for GuildStores {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GuildStores").finish_non_exhaustive()
    }
}

impl GuildStores {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            permissions: Arc::new(MemoryStore::<PermissionRule>::new()),
            cooldowns: Arc::new(MemoryStore::<CooldownRule>::new()),
            commands: Arc::new(MemoryStore::<CustomCommand>::new()),
            keywords: Arc::new(MemoryStore::<Keyword>::new()),
        }
    }
}

/// Opens the stores for a guild the first time it is seen.
#[async_trait]
pub trait GuildStoreFactory: Send + Sync {
    async fn open(&self, guild_id: &str) -> Result<GuildStores>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryStoreFactory;

#[async_trait]
impl GuildStoreFactory for MemoryStoreFactory {
    async fn open(&self, _guild_id: &str) -> Result<GuildStores> {
        Ok(GuildStores::in_memory())
    }
}

#[derive(Debug)]
pub struct GuildScope {
    id: String,
    pub policy: PolicyResolver,
    pub commands: ResolverCache<CustomCommand>,
    pub keywords: ResolverCache<Keyword>,
    pub events: MemoryEvents,
    patterns: PatternCache,
}

impl GuildScope {
    pub fn new(
        id: impl Into<String>,
        stores: GuildStores,
        classifier: Arc<dyn RankClassifier>,
        clock: Arc<dyn Clock>,
        events: MemoryEvents,
    ) -> Self {
        Self {
            id: id.into(),
            policy: PolicyResolver::new(stores.permissions, stores.cooldowns, classifier, clock),
            commands: ResolverCache::new("commands", stores.commands),
            keywords: ResolverCache::new("keywords", stores.keywords),
            events,
            patterns: PatternCache::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fully loads every collection, so per-message lookups are answered
    /// from memory and never remember free-text misses.
    pub async fn preload(&self) -> Result<(), CacheError> {
        self.policy.preload().await?;
        self.commands.list_all().await?;
        self.keywords.list_all().await?;
        Ok(())
    }

    /// Custom command stored under `name`.
    ///
    /// Lookup failures are logged and treated as "no such command".
    pub async fn custom_command(&self, name: &str) -> Option<CustomCommand> {
        match self.commands.get(&name.to_lowercase()).await {
            Ok(found) => found,
            Err(error) => {
                warn!(%error, guild = %self.id, name, "Custom command lookup failed");
                None
            }
        }
    }

    /// The first keyword, by name, whose pattern matches `text`.
    pub async fn matching_keyword(&self, text: &str) -> Result<Option<Keyword>, CacheError> {
        let all = self.keywords.list_all().await?;
        Ok(self.patterns.first_match(&all, text).cloned())
    }
}

/// Lazily created guild scopes.
pub struct GuildDirectory {
    scopes: RwLock<HashMap<String, Arc<GuildScope>>>,
    stores: Arc<dyn GuildStoreFactory>,
    classifier: Arc<dyn RankClassifier>,
    clock: Arc<dyn Clock>,
    event_seed: BTreeMap<String, Vec<String>>,
}

impl core::fmt::Debug for GuildDirectory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GuildDirectory")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl GuildDirectory {
    pub fn new(
        stores: Arc<dyn GuildStoreFactory>,
        classifier: Arc<dyn RankClassifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            scopes: RwLock::new(HashMap::new()),
            stores,
            classifier,
            clock,
            event_seed: BTreeMap::new(),
        }
    }

    /// Events every new guild scope starts with.
    #[must_use]
    pub fn with_events(mut self, seed: BTreeMap<String, Vec<String>>) -> Self {
        self.event_seed = seed;
        self
    }

    pub async fn scope(&self, guild_id: &str) -> Result<Arc<GuildScope>> {
        if let Some(scope) = self.scopes.read().await.get(guild_id) {
            return Ok(Arc::clone(scope));
        }

        let mut scopes = self.scopes.write().await;
        if let Some(scope) = scopes.get(guild_id) {
            return Ok(Arc::clone(scope));
        }
        let stores = self.stores.open(guild_id).await?;
        let scope = Arc::new(GuildScope::new(
            guild_id,
            stores,
            Arc::clone(&self.classifier),
            Arc::clone(&self.clock),
            MemoryEvents::new(self.event_seed.clone()),
        ));
        scope.preload().await?;
        scopes.insert(guild_id.to_owned(), Arc::clone(&scope));
        info!(guild = guild_id, "Opened guild scope");
        Ok(scope)
    }

    /// Drops a guild's scope and everything cached for it.
    pub async fn teardown(&self, guild_id: &str) -> bool {
        let removed = self.scopes.write().await.remove(guild_id).is_some();
        if removed {
            info!(guild = guild_id, "Closed guild scope");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use policy_core::{Invoker, LoadState, Rank, SystemClock};

    use super::*;

    fn directory() -> GuildDirectory {
        GuildDirectory::new(
            Arc::new(MemoryStoreFactory),
            Arc::new(|_: &Invoker| Rank::User),
            Arc::new(SystemClock),
        )
    }

    #[tokio::test]
    async fn scopes_are_per_guild() {
        let guilds = directory();
        let a = guilds.scope("a").await.unwrap();
        let again = guilds.scope("a").await.unwrap();
        let b = guilds.scope("b").await.unwrap();
        assert!(Arc::ptr_eq(&a, &again));
        assert!(!Arc::ptr_eq(&a, &b));

        a.commands
            .upsert(CustomCommand {
                name: "hi".to_owned(),
                template: "hello".to_owned(),
                owner_id: 1,
            })
            .await
            .unwrap();
        assert!(a.custom_command("HI").await.is_some());
        assert!(b.custom_command("hi").await.is_none());
    }

    #[tokio::test]
    async fn new_scopes_start_fully_loaded() {
        let guilds = directory();
        let scope = guilds.scope("a").await.unwrap();
        assert_eq!(scope.policy.permission_cache().state().await, LoadState::Full);
        assert_eq!(scope.policy.cooldown_cache().state().await, LoadState::Full);
        assert_eq!(scope.commands.state().await, LoadState::Full);
        assert_eq!(scope.keywords.state().await, LoadState::Full);

        for i in 0..50 {
            scope.policy.resolve_permission(&format!("hug <@9> message {i}")).await;
        }
        assert!(scope.policy.permissions().await.unwrap().is_empty());
        assert_eq!(scope.policy.permission_cache().state().await, LoadState::Full);
    }

    #[tokio::test]
    async fn teardown_discards_state() {
        let guilds = directory();
        let a = guilds.scope("a").await.unwrap();
        assert!(guilds.teardown("a").await);
        assert!(!guilds.teardown("a").await);
        let fresh = guilds.scope("a").await.unwrap();
        assert!(!Arc::ptr_eq(&a, &fresh));
    }

    #[tokio::test]
    async fn keywords_match_in_name_order() {
        let guilds = directory();
        let scope = guilds.scope("a").await.unwrap();
        for (name, pattern) in [("zeta", "hello"), ("alpha", "hel+o")] {
            scope
                .keywords
                .upsert(Keyword {
                    name: name.to_owned(),
                    pattern: pattern.to_owned(),
                    template: name.to_owned(),
                    owner_id: 1,
                })
                .await
                .unwrap();
        }
        let hit = scope.matching_keyword("well hello").await.unwrap().unwrap();
        assert_eq!(hit.name, "alpha");
        assert!(scope.matching_keyword("bye").await.unwrap().is_none());
    }
}
