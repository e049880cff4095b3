//! Routes one incoming message: prefix, command token, permission,
//! cooldown, then a built-in or custom command. Anything that is not a
//! command is checked against the guild's keywords.

use core::time::Duration;
use std::sync::Arc;

use anyhow::Result;
use command_core::{
    CommandContext, CommandEntry, CommandRegistry, GuildDirectory, GuildScope, Outbox, Reply,
    send_text,
};
use policy_core::{Authorization, CustomCommand, Invoker, PermissionRule, action_string};
use tracing::{debug, info, warn};

/// A chat message as delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Incoming {
    pub(crate) guild: String,
    pub(crate) channel: String,
    pub(crate) invoker: Invoker,
    pub(crate) text: String,
    /// Display names of mentioned members.
    pub(crate) mentions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Ignored,
    Denied,
    CoolingDown(Duration),
    Builtin(String),
    Custom(String),
    Keyword(String),
}

enum Target {
    Builtin(CommandEntry),
    Custom(CustomCommand),
}

#[derive(Debug)]
pub(crate) struct Dispatcher {
    guilds: Arc<GuildDirectory>,
    registry: Arc<CommandRegistry>,
    prefix: Arc<str>,
    outbox: Outbox,
}

impl Dispatcher {
    pub(crate) fn new(
        guilds: Arc<GuildDirectory>,
        registry: Arc<CommandRegistry>,
        prefix: &str,
        outbox: Outbox,
    ) -> Self {
        Self {
            guilds,
            registry,
            prefix: Arc::from(prefix),
            outbox,
        }
    }

    pub(crate) async fn handle(&self, msg: Incoming) -> Result<Outcome> {
        let text = msg.text.trim();
        if text.is_empty() {
            return Ok(Outcome::Ignored);
        }
        let guild = self.guilds.scope(&msg.guild).await?;

        let Some(body) = text.strip_prefix(&*self.prefix) else {
            return self.keyword(&guild, &msg, text).await;
        };
        let (token, args) = body
            .trim_start()
            .split_once(char::is_whitespace)
            .map_or((body.trim_start(), ""), |(t, a)| (t, a.trim()));
        let token = token.to_lowercase();
        if token.is_empty() {
            return Ok(Outcome::Ignored);
        }

        let Some(target) = self.target(&guild, &token).await else {
            debug!(token = %token, "No command for token");
            return Ok(Outcome::Ignored);
        };

        let action = action_string(&token, args);
        let ctx = self.context(Arc::clone(&guild), &msg);
        info!(guild = %msg.guild, invoker = msg.invoker.id, action = %action, "Command");

        if let Authorization::Denied { rule } = guild.policy.authorize(&msg.invoker, &action).await {
            send_text(&ctx, denial(&action, &rule))?;
            return Ok(Outcome::Denied);
        }
        if let Some(remaining) = guild.policy.check_cooldown(&msg.invoker, &action).await {
            let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            send_text(&ctx, format!("`{action}` is on cooldown. Try again in {secs}s."))?;
            return Ok(Outcome::CoolingDown(remaining));
        }

        match target {
            Target::Builtin(entry) => {
                let id = entry.spec.id.clone();
                if let Err(e) = entry.command.run(&ctx, args, &entry.spec).await {
                    warn!(error = %e, command = %id, "Command failed");
                }
                Ok(Outcome::Builtin(id))
            }
            Target::Custom(command) => {
                send_text(&ctx, ctx.expand(&command.template, args))?;
                Ok(Outcome::Custom(command.name))
            }
        }
    }

    async fn target(&self, guild: &GuildScope, token: &str) -> Option<Target> {
        if let Some(entry) = self.registry.entry_by_command(token).await {
            if self.registry.is_enabled(&entry.spec.id).await {
                return Some(Target::Builtin(entry));
            }
            info!(command = %entry.spec.id, "Command disabled");
            return None;
        }
        guild.custom_command(token).await.map(Target::Custom)
    }

    async fn keyword(&self, guild: &Arc<GuildScope>, msg: &Incoming, text: &str) -> Result<Outcome> {
        let keyword = match guild.matching_keyword(text).await {
            Ok(Some(keyword)) => keyword,
            Ok(None) => return Ok(Outcome::Ignored),
            Err(error) => {
                warn!(%error, guild = %msg.guild, "Keyword lookup failed");
                return Ok(Outcome::Ignored);
            }
        };
        let ctx = self.context(Arc::clone(guild), msg);
        send_text(&ctx, ctx.expand(&keyword.template, text))?;
        Ok(Outcome::Keyword(keyword.name))
    }

    fn context(&self, guild: Arc<GuildScope>, msg: &Incoming) -> CommandContext {
        CommandContext {
            rank: guild.policy.rank_of(&msg.invoker),
            guild,
            invoker: msg.invoker.clone(),
            channel: msg.channel.clone(),
            mentions: msg.mentions.clone(),
            prefix: Arc::clone(&self.prefix),
            registry: Arc::clone(&self.registry),
            outbox: self.outbox.clone(),
        }
    }

    /// Posts a reply that did not come from a command.
    pub(crate) fn notice(&self, channel: &str, text: impl Into<String>) -> Result<()> {
        self.outbox
            .send(Reply {
                channel: channel.to_owned(),
                text: text.into(),
            })
            .map_err(|_| anyhow::anyhow!("reply channel closed"))
    }
}

fn denial(action: &str, rule: &PermissionRule) -> String {
    match rule.required_role_id {
        Some(role) => format!(
            "You need to be {} or have role {role} to use `{action}`.",
            rule.required_rank
        ),
        None => format!("You need to be {} to use `{action}`.", rule.required_rank),
    }
}
