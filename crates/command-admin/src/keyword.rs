use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use command_core::{
    ChatCommand, CommandContext, CommandSpec, factory::CommandFactory, keywords::compile_pattern,
    sanitize_line, send_text, send_unsaved,
};
use policy_core::Keyword;

use crate::split_first;

const USAGE: &str = "Usage: keyword add <name> <pattern> <template> | keyword replace <name> <pattern> <template> | keyword delete <name> | keyword list";

#[derive(Debug)]
pub struct KeywordCommand;

impl CommandFactory for KeywordCommand {
    fn register_defaults(&self, specs: &mut Vec<CommandSpec>) {
        if !specs.iter().any(|s| s.id == "keyword") {
            specs.push(CommandSpec::new("keyword", &["keyword", "kw"]));
        }
    }

    fn build(&self) -> Arc<dyn ChatCommand> {
        Arc::new(Keywords)
    }
}

#[derive(Debug)]
pub struct Keywords;

fn parse_keyword(rest: &str, owner_id: u64) -> Option<Keyword> {
    let (name, rest) = split_first(rest);
    let (pattern, template) = split_first(rest);
    let name = name.to_lowercase();
    if name.is_empty() || pattern.is_empty() || template.is_empty() {
        return None;
    }
    Some(Keyword {
        name,
        pattern: pattern.to_owned(),
        template: template.to_owned(),
        owner_id,
    })
}

#[async_trait]
impl ChatCommand for Keywords {
    fn id(&self) -> &'static str {
        "keyword"
    }

    fn help(&self) -> &'static str {
        "Reply whenever a message matches a pattern: keyword add|replace|delete|list"
    }

    async fn run(&self, ctx: &CommandContext, args: &str, _spec: &CommandSpec) -> Result<()> {
        let keywords = &ctx.guild.keywords;
        let (sub, rest) = split_first(args);
        match sub.to_lowercase().as_str() {
            verb @ ("add" | "create" | "replace" | "edit") => {
                let Some(keyword) = parse_keyword(rest, ctx.invoker.id) else {
                    return send_text(ctx, USAGE);
                };
                if compile_pattern(&keyword.pattern).is_none() {
                    return send_text(ctx, format!("`{}` cannot be used as a pattern.", keyword.pattern));
                }
                let name = keyword.name.clone();
                let creating = matches!(verb, "add" | "create");
                let outcome = if creating {
                    keywords.insert_new(keyword).await
                } else {
                    keywords.replace(keyword).await
                };
                match outcome {
                    Ok(true) if creating => send_text(ctx, format!("Added keyword `{name}`.")),
                    Ok(true) => send_text(ctx, format!("Updated keyword `{name}`.")),
                    Ok(false) if creating => send_text(ctx, format!("Keyword `{name}` already exists.")),
                    Ok(false) => send_text(ctx, format!("There is no keyword `{name}`.")),
                    Err(e) => send_unsaved(ctx, &e),
                }
            }
            "delete" | "remove" => {
                let name = split_first(rest).0.to_lowercase();
                if name.is_empty() {
                    return send_text(ctx, USAGE);
                }
                match keywords.remove(&name).await {
                    Ok(true) => send_text(ctx, format!("Deleted keyword `{name}`.")),
                    Ok(false) => send_text(ctx, format!("There is no keyword `{name}`.")),
                    Err(e) => send_unsaved(ctx, &e),
                }
            }
            "list" | "" => match keywords.list_all().await {
                Ok(all) if all.is_empty() => send_text(ctx, "No keywords yet."),
                Ok(all) => {
                    let mut lines = vec!["Keywords:".to_owned()];
                    lines.extend(all.iter().map(|k| {
                        format!("- {} /{}/: {}", k.name, k.pattern, sanitize_line(&k.template, 60))
                    }));
                    send_text(ctx, lines.join("\n"))
                }
                Err(e) => send_text(ctx, format!("Could not load keywords: {e}")),
            },
            _ => send_text(ctx, USAGE),
        }
    }
}
