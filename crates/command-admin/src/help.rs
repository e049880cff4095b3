use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use command_core::{ChatCommand, CommandContext, CommandSpec, factory::CommandFactory, send_text};
use template_engine::ActionRegistry;

use crate::split_first;

#[derive(Debug)]
pub struct HelpCommand;

impl CommandFactory for HelpCommand {
    fn register_defaults(&self, specs: &mut Vec<CommandSpec>) {
        if !specs.iter().any(|s| s.id == "help") {
            specs.push(CommandSpec::new("help", &["help", "commands"]));
        }
    }

    fn build(&self) -> Arc<dyn ChatCommand> {
        Arc::new(Help)
    }
}

#[derive(Debug)]
pub struct Help;

impl Help {
    async fn overview(ctx: &CommandContext) -> String {
        let prefix = &ctx.prefix;
        let mut lines = vec!["Commands:".to_owned()];
        for (id, entry) in ctx.registry.entries().await {
            if !ctx.registry.is_enabled(&id).await {
                continue;
            }
            let trigger = entry.spec.triggers.commands.first().map_or(id.as_str(), String::as_str);
            lines.push(format!("- {prefix}{}: {}", trigger.trim_start_matches('!'), entry.command.help()));
        }
        match ctx.guild.commands.list_all().await {
            Ok(custom) if !custom.is_empty() => {
                let names: Vec<String> = custom.iter().map(|c| format!("{prefix}{}", c.name)).collect();
                lines.push(format!("Custom: {}", names.join(", ")));
            }
            Ok(_) => {}
            Err(error) => tracing::warn!(%error, "Could not list custom commands for help"),
        }
        lines.push(format!("Try `{prefix}help templates` for template placeholders."));
        lines.join("\n")
    }

    fn placeholders() -> String {
        let mut lines = vec!["Template placeholders (escape braces with \\):".to_owned()];
        lines.extend(
            ActionRegistry::builtin()
                .definitions()
                .map(|d| format!("- {}: {}", d.usage(), d.help())),
        );
        lines.join("\n")
    }
}

#[async_trait]
impl ChatCommand for Help {
    fn id(&self) -> &'static str {
        "help"
    }

    fn help(&self) -> &'static str {
        "List commands, or `help templates` for placeholders"
    }

    async fn run(&self, ctx: &CommandContext, args: &str, _spec: &CommandSpec) -> Result<()> {
        let (topic, _) = split_first(args);
        let text = match topic.to_lowercase().as_str() {
            "" => Self::overview(ctx).await,
            "templates" | "template" | "placeholders" => Self::placeholders(),
            other => match ctx.registry.entry_by_command(other).await {
                Some(entry) => format!("{}{other}: {}", ctx.prefix, entry.command.help()),
                None => format!("No built-in command `{}{other}`.", ctx.prefix),
            },
        };
        send_text(ctx, text)
    }
}
