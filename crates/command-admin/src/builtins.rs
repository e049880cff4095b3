use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use command_core::{ChatCommand, CommandContext, CommandSpec, factory::CommandFactory, send_text};

use crate::split_first;

const USAGE: &str = "Usage: builtins [list | enable <id> | disable <id> | reset <id>]";

#[derive(Debug)]
pub struct BuiltinsCommand;

impl CommandFactory for BuiltinsCommand {
    fn register_defaults(&self, specs: &mut Vec<CommandSpec>) {
        if !specs.iter().any(|s| s.id == "builtins") {
            specs.push(CommandSpec::new("builtins", &["builtins"]));
        }
    }

    fn build(&self) -> Arc<dyn ChatCommand> {
        Arc::new(Builtins)
    }
}

#[derive(Debug)]
pub struct Builtins;

#[async_trait]
impl ChatCommand for Builtins {
    fn id(&self) -> &'static str {
        "builtins"
    }

    fn help(&self) -> &'static str {
        "Turn built-in commands on or off: builtins list|enable|disable|reset"
    }

    async fn run(&self, ctx: &CommandContext, args: &str, _spec: &CommandSpec) -> Result<()> {
        let registry = &ctx.registry;
        let (sub, id) = split_first(args);
        let id = id.to_lowercase();
        match (sub.to_lowercase().as_str(), id.as_str()) {
            ("list" | "", _) => {
                let mut rows = vec!["Built-in commands:".to_owned()];
                for (id, entry) in registry.entries().await {
                    let state = if registry.is_enabled(&id).await { "on" } else { "off" };
                    rows.push(format!("- {id} [{state}]: {}", entry.spec.triggers.commands.join(", ")));
                }
                send_text(ctx, rows.join("\n"))
            }
            (_, "") => send_text(ctx, USAGE),
            // Disabling this command would leave no way to turn anything back on.
            ("disable", "builtins") => send_text(ctx, "`builtins` cannot be disabled."),
            (verb @ ("enable" | "disable" | "reset"), id) => {
                if registry.entry(id).await.is_none() {
                    return send_text(ctx, format!("No built-in command with id `{id}`."));
                }
                match verb {
                    "enable" => registry.set_override(id, true).await,
                    "disable" => registry.set_override(id, false).await,
                    _ => registry.clear_override(id).await,
                }
                tracing::info!(guild = %ctx.guild.id(), id, verb, "Built-in command override changed");
                let state = if registry.is_enabled(id).await { "on" } else { "off" };
                send_text(ctx, format!("`{id}` is now {state}."))
            }
            _ => send_text(ctx, USAGE),
        }
    }
}
