use core::time::Duration;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    cache::ResolverCache,
    clock::Clock,
    error::CacheError,
    rules::{CooldownRule, Invoker, PermissionRule, RankClassifier},
    store::BackingStore,
};

/// Outcome of [`PolicyResolver::authorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Granted,
    Denied { rule: PermissionRule },
}

impl Authorization {
    #[must_use]
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Per-guild permission and cooldown resolution over two prefix caches.
pub struct PolicyResolver {
    permissions: ResolverCache<PermissionRule>,
    cooldowns: ResolverCache<CooldownRule>,
    classifier: Arc<dyn RankClassifier>,
    clock: Arc<dyn Clock>,
    // One lock per cooldown rule key; the check-and-reset of a rule runs
    // under its lock.
    cooldown_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl core::fmt::Debug for PolicyResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PolicyResolver")
            .field("permissions", &self.permissions)
            .field("cooldowns", &self.cooldowns)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl PolicyResolver {
    pub fn new(
        permissions: Arc<dyn BackingStore<PermissionRule>>,
        cooldowns: Arc<dyn BackingStore<CooldownRule>>,
        classifier: Arc<dyn RankClassifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            permissions: ResolverCache::new("permissions", permissions),
            cooldowns: ResolverCache::new("cooldowns", cooldowns),
            classifier,
            clock,
            cooldown_locks: DashMap::new(),
        }
    }

    #[must_use]
    pub const fn permission_cache(&self) -> &ResolverCache<PermissionRule> {
        &self.permissions
    }

    #[must_use]
    pub const fn cooldown_cache(&self) -> &ResolverCache<CooldownRule> {
        &self.cooldowns
    }

    /// Loads both rule collections so lookups never read the store per
    /// message and free-text arguments never accumulate in the caches.
    pub async fn preload(&self) -> Result<(), CacheError> {
        self.permissions.list_all().await?;
        self.cooldowns.list_all().await?;
        Ok(())
    }

    #[must_use]
    pub fn rank_of(&self, invoker: &Invoker) -> crate::Rank {
        self.classifier.rank(invoker)
    }

    /// The most specific permission rule for `action`.
    ///
    /// Unconfigured actions are open to everyone. If the store cannot be
    /// read the action is locked to the owner.
    pub async fn resolve_permission(&self, action: &str) -> PermissionRule {
        match self.permissions.resolve(action).await {
            Ok(Some(rule)) => rule,
            Ok(None) => PermissionRule::unrestricted(action),
            Err(error) => {
                warn!(%error, action, "Permission lookup failed, denying");
                PermissionRule::fail_closed(action)
            }
        }
    }

    /// Granted when the invoker's rank reaches the rule's rank, or when the
    /// invoker holds the rule's role.
    pub async fn authorize(&self, invoker: &Invoker, action: &str) -> Authorization {
        let rule = self.resolve_permission(action).await;
        let rank = self.classifier.rank(invoker);
        let has_role = rule
            .required_role_id
            .is_some_and(|role| invoker.role_ids.contains(&role));
        if rank >= rule.required_rank || has_role {
            Authorization::Granted
        } else {
            debug!(action, %rank, required = %rule.required_rank, "Permission denied");
            Authorization::Denied { rule }
        }
    }

    /// Remaining cooldown for `action`, if one is active.
    ///
    /// Privileged invokers bypass cooldowns without touching the cache. A
    /// cooldown that is configured but not active is restarted by this
    /// call. Store failures are treated as "no cooldown".
    pub async fn check_cooldown(&self, invoker: &Invoker, action: &str) -> Option<Duration> {
        if self.classifier.rank(invoker).is_privileged() {
            return None;
        }

        let rule = self.cooldown_rule(action).await?;
        let lock = self.cooldown_lock(&rule.action);
        let _guard = lock.lock().await;

        // Re-read under the lock so a concurrent reset is observed.
        let mut rule = match self.cooldowns.get(&rule.action).await {
            Ok(Some(rule)) if rule.is_enforced() => rule,
            Ok(_) => return None,
            Err(error) => {
                warn!(%error, action, "Cooldown lookup failed, ignoring cooldown");
                return None;
            }
        };

        let now = self.clock.now();
        if let Some(last) = rule.last_activation {
            let duration = time::Duration::try_from(rule.duration).unwrap_or(time::Duration::MAX);
            let remaining = duration.saturating_sub(now - last);
            if !remaining.is_negative() {
                return Some(remaining.unsigned_abs());
            }
        }

        rule.last_activation = Some(now);
        let key = rule.action.clone();
        match self.cooldowns.replace(rule).await {
            Ok(true) => {}
            Ok(false) => debug!(action = %key, "Cooldown removed while checking"),
            Err(error) => warn!(%error, action = %key, "Failed to restart cooldown"),
        }
        None
    }

    // Entries live as long as the resolver, so every task touching a key
    // shares one lock.
    fn cooldown_lock(&self, key: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.cooldown_locks.entry(key.to_owned()).or_default().value())
    }

    async fn cooldown_rule(&self, action: &str) -> Option<CooldownRule> {
        match self.cooldowns.resolve(action).await {
            Ok(Some(rule)) if rule.is_enforced() => Some(rule),
            Ok(_) => None,
            Err(error) => {
                warn!(%error, action, "Cooldown lookup failed, ignoring cooldown");
                None
            }
        }
    }

    pub async fn set_permission(&self, rule: PermissionRule) -> Result<(), CacheError> {
        self.permissions.upsert(rule).await
    }

    pub async fn remove_permission(&self, action: &str) -> Result<bool, CacheError> {
        self.permissions.remove(action).await
    }

    pub async fn permissions(&self) -> Result<Vec<PermissionRule>, CacheError> {
        self.permissions.list_all().await
    }

    /// Configures a cooldown. An existing rule keeps its last activation.
    pub async fn set_cooldown(&self, action: &str, duration: Duration) -> Result<(), CacheError> {
        let lock = self.cooldown_lock(action);
        let _guard = lock.lock().await;
        let last_activation = self
            .cooldowns
            .get(action)
            .await?
            .and_then(|rule| rule.last_activation);
        self.cooldowns
            .upsert(CooldownRule {
                action: action.to_owned(),
                duration,
                last_activation,
            })
            .await
    }

    pub async fn remove_cooldown(&self, action: &str) -> Result<bool, CacheError> {
        let lock = self.cooldown_lock(action);
        let _guard = lock.lock().await;
        self.cooldowns.remove(action).await
    }

    pub async fn cooldowns(&self) -> Result<Vec<CooldownRule>, CacheError> {
        self.cooldowns.list_all().await
    }
}
