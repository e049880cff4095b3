use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use command_core::{
    ChatCommand, CommandContext, CommandSpec, factory::CommandFactory, normalize_cmd,
    sanitize_line, send_text, send_unsaved,
};
use policy_core::CustomCommand;

use crate::split_first;

const USAGE: &str = "Usage: command add <name> <template> | command replace <name> <template> | command delete <name> | command show <name> | command list";

#[derive(Debug)]
pub struct CustomCommands;

impl CommandFactory for CustomCommands {
    fn register_defaults(&self, specs: &mut Vec<CommandSpec>) {
        if !specs.iter().any(|s| s.id == "command") {
            specs.push(CommandSpec::new("command", &["command", "cmd"]));
        }
    }

    fn build(&self) -> Arc<dyn ChatCommand> {
        Arc::new(Custom)
    }
}

#[derive(Debug)]
pub struct Custom;

impl Custom {
    /// Validated name and template for add/replace, or the reply to send.
    async fn parse_definition(ctx: &CommandContext, rest: &str) -> Result<(String, String), String> {
        let (name, template) = split_first(rest);
        let name = normalize_cmd(name);
        if name.is_empty() || template.is_empty() {
            return Err(USAGE.to_owned());
        }
        if ctx.registry.entry_by_command(&name).await.is_some() {
            return Err(format!("`{name}` is a built-in command."));
        }
        Ok((name, template.to_owned()))
    }
}

#[async_trait]
impl ChatCommand for Custom {
    fn id(&self) -> &'static str {
        "command"
    }

    fn help(&self) -> &'static str {
        "Manage custom text commands: command add|replace|delete|show|list"
    }

    async fn run(&self, ctx: &CommandContext, args: &str, _spec: &CommandSpec) -> Result<()> {
        let commands = &ctx.guild.commands;
        let (sub, rest) = split_first(args);
        match sub.to_lowercase().as_str() {
            verb @ ("add" | "create" | "replace" | "edit") => {
                let (name, template) = match Self::parse_definition(ctx, rest).await {
                    Ok(parsed) => parsed,
                    Err(reply) => return send_text(ctx, reply),
                };
                let command = CustomCommand {
                    name: name.clone(),
                    template,
                    owner_id: ctx.invoker.id,
                };
                let creating = matches!(verb, "add" | "create");
                let outcome = if creating {
                    commands.insert_new(command).await
                } else {
                    commands.replace(command).await
                };
                let prefix = &ctx.prefix;
                match outcome {
                    Ok(true) if creating => send_text(ctx, format!("Added `{prefix}{name}`.")),
                    Ok(true) => send_text(ctx, format!("Updated `{prefix}{name}`.")),
                    Ok(false) if creating => send_text(
                        ctx,
                        format!("`{prefix}{name}` already exists. Use `command replace` to change it."),
                    ),
                    Ok(false) => send_text(
                        ctx,
                        format!("There is no `{prefix}{name}`. Use `command add` to create it."),
                    ),
                    Err(e) => send_unsaved(ctx, &e),
                }
            }
            "delete" | "remove" => {
                let name = normalize_cmd(split_first(rest).0);
                if name.is_empty() {
                    return send_text(ctx, USAGE);
                }
                match commands.remove(&name).await {
                    Ok(true) => send_text(ctx, format!("Deleted `{}{name}`.", ctx.prefix)),
                    Ok(false) => send_text(ctx, format!("There is no `{}{name}`.", ctx.prefix)),
                    Err(e) => send_unsaved(ctx, &e),
                }
            }
            "show" => {
                let name = normalize_cmd(split_first(rest).0);
                if name.is_empty() {
                    return send_text(ctx, USAGE);
                }
                match ctx.guild.custom_command(&name).await {
                    Some(found) => send_text(
                        ctx,
                        format!(
                            "`{}{}` (by {}): {}",
                            ctx.prefix, found.name, found.owner_id, found.template
                        ),
                    ),
                    None => send_text(ctx, format!("There is no `{}{name}`.", ctx.prefix)),
                }
            }
            "list" | "" => match commands.list_all().await {
                Ok(all) if all.is_empty() => send_text(ctx, "No custom commands yet."),
                Ok(all) => {
                    let mut lines = vec!["Custom commands:".to_owned()];
                    lines.extend(all.iter().map(|c| {
                        format!("- {}{}: {}", ctx.prefix, c.name, sanitize_line(&c.template, 60))
                    }));
                    send_text(ctx, lines.join("\n"))
                }
                Err(e) => send_text(ctx, format!("Could not load custom commands: {e}")),
            },
            _ => send_text(ctx, USAGE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        perm::PermCommand,
        testing::{harness, harness_with, read_only_stores},
    };

    #[tokio::test]
    async fn add_replace_delete() {
        let mut h = harness();
        assert_eq!(h.run(&Custom, "add Hug {sender} hugs {mentions}").await, "Added `!hug`.");
        assert_eq!(
            h.run(&Custom, "add hug again").await,
            "`!hug` already exists. Use `command replace` to change it."
        );
        assert_eq!(
            h.run(&Custom, "show hug").await,
            "`!hug` (by 1): {sender} hugs {mentions}"
        );
        assert_eq!(h.run(&Custom, "replace hug *hug*").await, "Updated `!hug`.");
        assert_eq!(h.run(&Custom, "show hug").await, "`!hug` (by 1): *hug*");
        assert_eq!(h.run(&Custom, "delete hug").await, "Deleted `!hug`.");
        assert_eq!(h.run(&Custom, "delete hug").await, "There is no `!hug`.");
    }

    #[tokio::test]
    async fn replace_requires_existing() {
        let mut h = harness();
        assert_eq!(
            h.run(&Custom, "replace wave hi").await,
            "There is no `!wave`. Use `command add` to create it."
        );
        assert_eq!(h.run(&Custom, "list").await, "No custom commands yet.");
    }

    #[tokio::test]
    async fn list_is_sorted() {
        let mut h = harness();
        h.run(&Custom, "add wave o/").await;
        h.run(&Custom, "add bow *bows*").await;
        assert_eq!(
            h.run(&Custom, "list").await,
            "Custom commands:\n- !bow: *bows*\n- !wave: o/"
        );
    }

    #[tokio::test]
    async fn refuses_builtin_names() {
        let mut h = harness();
        let factory = PermCommand;
        let mut specs = Vec::new();
        factory.register_defaults(&mut specs);
        for spec in specs {
            h.ctx.registry.register(spec, factory.build()).await;
        }
        assert_eq!(h.run(&Custom, "add permission hi").await, "`permission` is a built-in command.");
        assert_eq!(h.run(&Custom, "add hug").await, USAGE);
    }

    #[tokio::test]
    async fn reports_unsaved_changes() {
        let mut h = harness_with(read_only_stores());
        let reply = h.run(&Custom, "add hug hi").await;
        assert!(reply.starts_with("That change was not saved"), "{reply}");
    }
}
