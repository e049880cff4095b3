use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use command_core::{
    ChatCommand, CommandContext, CommandSpec, factory::CommandFactory, send_text, send_unsaved,
};
use policy_core::{PermissionRule, Rank};

use crate::{action_arg, split_first};

const USAGE: &str = "Usage: perm set <rank> <action> | perm role <role-id> <action> | perm get <action> | perm remove <action> | perm list";

#[derive(Debug)]
pub struct PermCommand;

impl CommandFactory for PermCommand {
    fn register_defaults(&self, specs: &mut Vec<CommandSpec>) {
        if !specs.iter().any(|s| s.id == "perm") {
            specs.push(CommandSpec::new("perm", &["perm", "permission"]));
        }
    }

    fn build(&self) -> Arc<dyn ChatCommand> {
        Arc::new(Perm)
    }
}

#[derive(Debug)]
pub struct Perm;

fn describe(rule: &PermissionRule) -> String {
    match rule.required_role_id {
        Some(role) => format!("{} or role {role}", rule.required_rank),
        None => rule.required_rank.to_string(),
    }
}

#[async_trait]
impl ChatCommand for Perm {
    fn id(&self) -> &'static str {
        "perm"
    }

    fn help(&self) -> &'static str {
        "Set who may run an action and everything under it: perm set|role|get|remove|list"
    }

    async fn run(&self, ctx: &CommandContext, args: &str, _spec: &CommandSpec) -> Result<()> {
        let policy = &ctx.guild.policy;
        let (sub, rest) = split_first(args);
        match sub.to_lowercase().as_str() {
            "set" => {
                let (rank, action) = split_first(rest);
                let Ok(rank) = rank.parse::<Rank>() else {
                    return send_text(ctx, format!("Unknown rank `{rank}`. Ranks: user, member, admin, owner."));
                };
                let Some(action) = action_arg(action) else {
                    return send_text(ctx, USAGE);
                };
                let rule = PermissionRule::new(action.as_str(), rank);
                match policy.set_permission(rule).await {
                    Ok(()) => send_text(ctx, format!("`{action}` now requires {rank}.")),
                    Err(e) => send_unsaved(ctx, &e),
                }
            }
            "role" => {
                let (role, action) = split_first(rest);
                let (Ok(role), Some(action)) = (role.parse::<u64>(), action_arg(action)) else {
                    return send_text(ctx, USAGE);
                };
                // A role-only rule still needs a rank for everyone else.
                let rank = match policy.permission_cache().get(&action).await {
                    Ok(Some(existing)) => existing.required_rank,
                    Ok(None) | Err(_) => Rank::Admin,
                };
                let rule = PermissionRule::new(action.as_str(), rank).with_role(role);
                let text = format!("`{action}` now requires {}.", describe(&rule));
                match policy.set_permission(rule).await {
                    Ok(()) => send_text(ctx, text),
                    Err(e) => send_unsaved(ctx, &e),
                }
            }
            "get" => {
                let Some(action) = action_arg(rest) else {
                    return send_text(ctx, USAGE);
                };
                let rule = policy.resolve_permission(&action).await;
                if rule.action == action {
                    send_text(ctx, format!("`{action}` requires {}.", describe(&rule)))
                } else {
                    send_text(
                        ctx,
                        format!("`{action}` requires {} (inherited from `{}`).", describe(&rule), rule.action),
                    )
                }
            }
            "remove" | "delete" => {
                let Some(action) = action_arg(rest) else {
                    return send_text(ctx, USAGE);
                };
                match policy.remove_permission(&action).await {
                    Ok(true) => send_text(ctx, format!("Removed the rule for `{action}`.")),
                    Ok(false) => send_text(ctx, format!("No rule is set for `{action}`.")),
                    Err(e) => send_unsaved(ctx, &e),
                }
            }
            "list" | "" => match policy.permissions().await {
                Ok(rules) if rules.is_empty() => send_text(ctx, "No permission rules. Everything is open to everyone."),
                Ok(rules) => {
                    let mut lines = vec!["Permission rules:".to_owned()];
                    lines.extend(rules.iter().map(|r| format!("- {}: {}", r.action, describe(r))));
                    send_text(ctx, lines.join("\n"))
                }
                Err(e) => send_text(ctx, format!("Could not load permission rules: {e}")),
            },
            _ => send_text(ctx, USAGE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{harness, harness_with, read_only_stores};

    #[tokio::test]
    async fn set_get_and_inherit() {
        let mut h = harness();
        assert_eq!(h.run(&Perm, "set admin role").await, "`role` now requires admin.");
        assert_eq!(h.run(&Perm, "get role").await, "`role` requires admin.");
        assert_eq!(
            h.run(&Perm, "get role allow Foo").await,
            "`role allow Foo` requires admin (inherited from `role`)."
        );
        assert_eq!(h.run(&Perm, "get ping").await, "`ping` requires user.");
    }

    #[tokio::test]
    async fn role_rules_keep_existing_rank() {
        let mut h = harness();
        h.run(&Perm, "set member dj").await;
        assert_eq!(h.run(&Perm, "role 42 dj").await, "`dj` now requires member or role 42.");
        assert_eq!(h.run(&Perm, "role 7 kick").await, "`kick` now requires admin or role 7.");
    }

    #[tokio::test]
    async fn list_and_remove() {
        let mut h = harness();
        assert!(h.run(&Perm, "list").await.starts_with("No permission rules"));
        h.run(&Perm, "set admin ban").await;
        assert_eq!(h.run(&Perm, "list").await, "Permission rules:\n- ban: admin");
        assert_eq!(h.run(&Perm, "remove ban").await, "Removed the rule for `ban`.");
        assert_eq!(h.run(&Perm, "remove ban").await, "No rule is set for `ban`.");
    }

    #[tokio::test]
    async fn rejects_bad_input() {
        let mut h = harness();
        assert!(h.run(&Perm, "set root ban").await.starts_with("Unknown rank"));
        assert_eq!(h.run(&Perm, "set admin").await, USAGE);
        assert_eq!(h.run(&Perm, "frobnicate").await, USAGE);
    }

    #[tokio::test]
    async fn reports_unsaved_changes() {
        let mut h = harness_with(read_only_stores());
        let reply = h.run(&Perm, "set admin ban").await;
        assert!(reply.starts_with("That change was not saved"), "{reply}");
        assert_eq!(h.run(&Perm, "get ban").await, "`ban` requires user.");
    }
}
