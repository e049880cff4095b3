use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use command_core::{ChatCommand, CommandContext, CommandSpec, factory::CommandFactory, send_text};
use template_engine::EventDirectory as _;

use crate::split_first;

const USAGE: &str = "Usage: event join <event> | event leave <event> | event list [event]";

#[derive(Debug)]
pub struct EventCommand;

impl CommandFactory for EventCommand {
    fn register_defaults(&self, specs: &mut Vec<CommandSpec>) {
        if !specs.iter().any(|s| s.id == "event") {
            specs.push(CommandSpec::new("event", &["event"]));
        }
    }

    fn build(&self) -> Arc<dyn ChatCommand> {
        Arc::new(Events)
    }
}

#[derive(Debug)]
pub struct Events;

#[async_trait]
impl ChatCommand for Events {
    fn id(&self) -> &'static str {
        "event"
    }

    fn help(&self) -> &'static str {
        "Sign up for events: event join|leave|list"
    }

    async fn run(&self, ctx: &CommandContext, args: &str, _spec: &CommandSpec) -> Result<()> {
        let events = &ctx.guild.events;
        let me = ctx.invoker.display_name.as_str();
        let (sub, event) = split_first(args);
        let event = event.to_lowercase();
        match (sub.to_lowercase().as_str(), event.is_empty()) {
            ("join", false) => {
                if events.join(&event, me) {
                    send_text(ctx, format!("{me} joined {event}."))
                } else {
                    send_text(ctx, format!("{me} is already in {event}."))
                }
            }
            ("leave", false) => {
                if events.leave(&event, me) {
                    send_text(ctx, format!("{me} left {event}."))
                } else {
                    send_text(ctx, format!("{me} is not in {event}."))
                }
            }
            ("list", false) => match events.members(&event) {
                Some(members) if !members.is_empty() => {
                    send_text(ctx, format!("{event}: {}", members.join(", ")))
                }
                Some(_) => send_text(ctx, format!("Nobody has joined {event} yet.")),
                None => send_text(ctx, format!("There is no event called {event}.")),
            },
            ("list" | "", true) => {
                let names = events.names();
                if names.is_empty() {
                    send_text(ctx, "No events yet.")
                } else {
                    send_text(ctx, format!("Events: {}", names.join(", ")))
                }
            }
            _ => send_text(ctx, USAGE),
        }
    }
}
