pub mod events;
pub mod factory;
pub mod guild;
pub mod keywords;

use std::{borrow::ToOwned, collections::HashMap, sync::Arc};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use policy_core::{CacheError, Invoker, Rank};
use serde::{Deserialize, Serialize};
use template_engine::{EvalContext, TemplateInterpreter};
use tokio::sync::{RwLock, mpsc};

pub use guild::{GuildDirectory, GuildScope, GuildStoreFactory, GuildStores, MemoryStoreFactory};

/// A message the bot wants to post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub channel: String,
    pub text: String,
}

pub type Outbox = mpsc::UnboundedSender<Reply>;

#[derive(Clone)]
pub struct CommandContext {
    pub guild: Arc<GuildScope>,
    pub invoker: Invoker,
    pub rank: Rank,
    pub channel: String,
    /// Display names of the members mentioned in the message.
    pub mentions: Vec<String>,
    pub prefix: Arc<str>,
    pub registry: Arc<CommandRegistry>,
    pub outbox: Outbox,
}

impl core::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandContext")
            .field("guild", &self.guild.id())
            .field("invoker", &self.invoker)
            .field("rank", &self.rank)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl CommandContext {
    /// Expands `template` for this invocation with `message` as the text
    /// after the command name.
    #[must_use]
    pub fn expand(&self, template: &str, message: &str) -> String {
        let ctx = EvalContext::new(&self.invoker.display_name, message)
            .with_channel(&self.channel)
            .with_mentions(&self.mentions)
            .with_events(&self.guild.events);
        TemplateInterpreter::default().expand(template, &ctx)
    }
}

#[async_trait]
pub trait ChatCommand: Send + Sync {
    fn id(&self) -> &'static str;
    fn help(&self) -> &'static str;
    async fn run(&self, ctx: &CommandContext, args: &str, spec: &CommandSpec) -> Result<()>;
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CommandTriggers {
    #[serde(default)]
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandSpec {
    pub id: String,
    #[serde(default = "enabled_true")]
    pub enabled: bool,
    #[serde(default)]
    pub triggers: CommandTriggers,
    #[serde(default)]
    pub config: serde_yaml::Value,
}

impl CommandSpec {
    #[must_use]
    pub fn new(id: &str, commands: &[&str]) -> Self {
        Self {
            id: id.to_owned(),
            enabled: true,
            triggers: CommandTriggers {
                commands: commands.iter().map(|c| (*c).to_owned()).collect(),
            },
            config: serde_yaml::Value::default(),
        }
    }
}

const fn enabled_true() -> bool {
    true
}

#[derive(Clone)]
pub struct CommandEntry {
    pub spec: CommandSpec,
    pub command: Arc<dyn ChatCommand>,
}

#[derive(Default)]
struct RegistryInner {
    by_id: HashMap<String, CommandEntry>,
    by_command: HashMap<String, String>,
    overrides: HashMap<String, bool>,
}

/// Built-in commands by id and by trigger token, with runtime
/// enable/disable overrides.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl core::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandRegistry").finish_non_exhaustive()
    }
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, spec: CommandSpec, command: Arc<dyn ChatCommand>) -> Option<CommandEntry> {
        let mut inner = self.inner.write().await;
        let id = spec.id.clone();
        let previous = inner.by_id.insert(
            id.clone(),
            CommandEntry {
                spec: spec.clone(),
                command,
            },
        );
        inner.remove_triggers_for(&id);
        for cmd in &spec.triggers.commands {
            inner.by_command.insert(normalize_cmd(cmd), id.clone());
        }
        previous
    }

    pub async fn entry(&self, id: &str) -> Option<CommandEntry> {
        let inner = self.inner.read().await;
        inner.by_id.get(id).cloned()
    }

    /// Looks up the command bound to `token` (prefix already stripped).
    pub async fn entry_by_command(&self, token: &str) -> Option<CommandEntry> {
        let inner = self.inner.read().await;
        inner
            .by_command
            .get(&normalize_cmd(token))
            .and_then(|id| inner.by_id.get(id))
            .cloned()
    }

    /// All entries, sorted by id.
    pub async fn entries(&self) -> Vec<(String, CommandEntry)> {
        let inner = self.inner.read().await;
        let mut entries: Vec<_> = inner
            .by_id
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub async fn set_override(&self, id: impl Into<String>, enabled: bool) {
        let mut inner = self.inner.write().await;
        inner.overrides.insert(id.into(), enabled);
    }

    pub async fn clear_override(&self, id: &str) {
        let mut inner = self.inner.write().await;
        inner.overrides.remove(id);
    }

    #[must_use]
    pub async fn is_enabled(&self, id: &str) -> bool {
        let inner = self.inner.read().await;
        let default = inner.by_id.get(id).is_some_and(|entry| entry.spec.enabled);
        inner.overrides.get(id).copied().unwrap_or(default)
    }
}

impl RegistryInner {
    fn remove_triggers_for(&mut self, id: &str) {
        self.by_command.retain(|_, existing| existing != id);
        self.overrides.remove(id);
    }
}

/// Trigger tokens are compared lower-cased and without any leading `!`.
#[must_use]
pub fn normalize_cmd(s: &str) -> String {
    s.trim().trim_start_matches('!').to_lowercase()
}

pub fn str_config(spec: &CommandSpec, key: &str) -> Option<String> {
    spec.config
        .get(key)
        .and_then(|v| v.as_str())
        .map(ToOwned::to_owned)
}

#[must_use]
pub fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[must_use]
pub fn sanitize_line(s: &str, max: usize) -> String {
    let compact = s.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate(&compact, max)
}

pub fn send_text(ctx: &CommandContext, text: impl Into<String>) -> Result<()> {
    ctx.outbox
        .send(Reply {
            channel: ctx.channel.clone(),
            text: text.into(),
        })
        .map_err(|_| anyhow!("reply channel closed"))
}

/// Reports a change that did not reach the store.
pub fn send_unsaved(ctx: &CommandContext, error: &CacheError) -> Result<()> {
    tracing::warn!(%error, guild = %ctx.guild.id(), "Change not persisted");
    send_text(ctx, format!("That change was not saved: {error}"))
}
