use core::time::Duration;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use command_core::{
    ChatCommand, CommandContext, CommandSpec, factory::CommandFactory, send_text, send_unsaved,
};

use crate::{action_arg, split_first};

const USAGE: &str =
    "Usage: cooldown set <duration> <action> | cooldown remove <action> | cooldown list (durations: 30, 30s, 5m, 2h)";

#[derive(Debug)]
pub struct CooldownCommand;

impl CommandFactory for CooldownCommand {
    fn register_defaults(&self, specs: &mut Vec<CommandSpec>) {
        if !specs.iter().any(|s| s.id == "cooldown") {
            specs.push(CommandSpec::new("cooldown", &["cooldown", "cd"]));
        }
    }

    fn build(&self) -> Arc<dyn ChatCommand> {
        Arc::new(Cooldown)
    }
}

#[derive(Debug)]
pub struct Cooldown;

/// Parses `90`, `90s`, `5m` or `2h`.
fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim().to_ascii_lowercase();
    let (digits, unit) = match text.find(|c: char| !c.is_ascii_digit()) {
        Some(i) => text.split_at(i),
        None => (text.as_str(), "s"),
    };
    let value: u64 = digits.parse().ok()?;
    let secs = match unit {
        "s" => value,
        "m" => value.checked_mul(60)?,
        "h" => value.checked_mul(3600)?,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

#[async_trait]
impl ChatCommand for Cooldown {
    fn id(&self) -> &'static str {
        "cooldown"
    }

    fn help(&self) -> &'static str {
        "Limit how often an action can run: cooldown set|remove|list (admins are exempt)"
    }

    async fn run(&self, ctx: &CommandContext, args: &str, _spec: &CommandSpec) -> Result<()> {
        let policy = &ctx.guild.policy;
        let (sub, rest) = split_first(args);
        match sub.to_lowercase().as_str() {
            "set" => {
                let (duration, action) = split_first(rest);
                let (Some(duration), Some(action)) = (parse_duration(duration), action_arg(action)) else {
                    return send_text(ctx, USAGE);
                };
                match policy.set_cooldown(&action, duration).await {
                    Ok(()) if duration.is_zero() => {
                        send_text(ctx, format!("`{action}` has no cooldown."))
                    }
                    Ok(()) => send_text(
                        ctx,
                        format!("`{action}` can be used once every {}.", format_duration(duration)),
                    ),
                    Err(e) => send_unsaved(ctx, &e),
                }
            }
            "remove" | "delete" => {
                let Some(action) = action_arg(rest) else {
                    return send_text(ctx, USAGE);
                };
                match policy.remove_cooldown(&action).await {
                    Ok(true) => send_text(ctx, format!("Removed the cooldown on `{action}`.")),
                    Ok(false) => send_text(ctx, format!("`{action}` has no cooldown set.")),
                    Err(e) => send_unsaved(ctx, &e),
                }
            }
            "list" | "" => match policy.cooldowns().await {
                Ok(rules) => {
                    let active: Vec<_> = rules.iter().filter(|r| r.is_enforced()).collect();
                    if active.is_empty() {
                        return send_text(ctx, "No cooldowns configured.");
                    }
                    let mut lines = vec!["Cooldowns:".to_owned()];
                    lines.extend(
                        active
                            .iter()
                            .map(|r| format!("- {}: {}", r.action, format_duration(r.duration))),
                    );
                    send_text(ctx, lines.join("\n"))
                }
                Err(e) => send_text(ctx, format!("Could not load cooldowns: {e}")),
            },
            _ => send_text(ctx, USAGE),
        }
    }
}
