use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::Path,
};

use anyhow::{Context as _, Result};
use command_core::CommandSpec;
use policy_core::{Invoker, PermissionRule, Rank, RankClassifier};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub(crate) struct BotConfig {
    /// Text every command starts with.
    pub(crate) prefix: String,
    pub(crate) owner_id: Option<u64>,
    pub(crate) admin_ids: Vec<u64>,
    pub(crate) member_ids: Vec<u64>,
    /// Display names by member id; `<@id>` mentions resolve against these.
    pub(crate) members: BTreeMap<u64, String>,
    /// Platform role ids held by each member id.
    pub(crate) roles: BTreeMap<u64, Vec<u64>>,
    /// Event sign-ups every guild starts with.
    pub(crate) events: BTreeMap<String, Vec<String>>,
    #[serde(alias = "builtins")]
    pub(crate) commands: Option<Vec<CommandSpec>>,
    /// Written into a guild's store the first time the guild is opened.
    pub(crate) default_permissions: Vec<PermissionRule>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: "!".to_owned(),
            owner_id: None,
            admin_ids: Vec::new(),
            member_ids: Vec::new(),
            members: BTreeMap::new(),
            roles: BTreeMap::new(),
            events: BTreeMap::new(),
            commands: None,
            default_permissions: Vec::new(),
        }
    }
}

impl BotConfig {
    pub(crate) fn roster(&self) -> Roster {
        Roster {
            owner_id: self.owner_id,
            admin_ids: self.admin_ids.iter().copied().collect(),
            member_ids: self.member_ids.iter().copied().collect(),
        }
    }

    pub(crate) fn member_name(&self, id: u64) -> Option<&str> {
        self.members.get(&id).map(String::as_str)
    }

    /// The invoker for member `id`, named from `members` when known.
    pub(crate) fn invoker(&self, id: u64, fallback_name: &str) -> Invoker {
        let name = self.member_name(id).unwrap_or(fallback_name);
        let mut invoker = Invoker::new(id, name);
        invoker.role_ids = self.roles.get(&id).cloned().unwrap_or_default();
        invoker
    }
}

/// Ranks invokers by the id lists in the configuration.
#[derive(Debug, Clone, Default)]
pub(crate) struct Roster {
    owner_id: Option<u64>,
    admin_ids: HashSet<u64>,
    member_ids: HashSet<u64>,
}

impl RankClassifier for Roster {
    fn rank(&self, invoker: &Invoker) -> Rank {
        if self.owner_id == Some(invoker.id) {
            Rank::Owner
        } else if self.admin_ids.contains(&invoker.id) {
            Rank::Admin
        } else if self.member_ids.contains(&invoker.id) {
            Rank::Member
        } else {
            Rank::User
        }
    }
}

pub(crate) fn load_config(path: &Path) -> Result<BotConfig> {
    if !path.exists() {
        warn!(path = %path.display(), "Config file not found, using defaults");
        return Ok(BotConfig::default());
    }
    let yaml = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {}", path.display()))?;
    parse_config(&yaml)
}

fn parse_config(yaml: &str) -> Result<BotConfig> {
    let cfg: BotConfig = serde_yaml::from_str(yaml).context("parsing YAML config")?;
    if cfg.prefix.trim().is_empty() {
        anyhow::bail!("prefix must not be empty");
    }
    Ok(cfg)
}
