use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use command_core::{ChatCommand, CommandContext, CommandSpec, factory::CommandFactory, send_text, str_config};

#[derive(Debug)]
pub struct PingCommand;

impl CommandFactory for PingCommand {
    fn register_defaults(&self, specs: &mut Vec<CommandSpec>) {
        if !specs.iter().any(|s| s.id == "ping") {
            specs.push(CommandSpec::new("ping", &["ping"]));
        }
    }

    fn build(&self) -> Arc<dyn ChatCommand> {
        Arc::new(Ping)
    }
}

#[derive(Debug)]
pub struct Ping;

#[async_trait]
impl ChatCommand for Ping {
    fn id(&self) -> &'static str {
        "ping"
    }

    fn help(&self) -> &'static str {
        "Check that the bot is listening"
    }

    /// Replies with `config.reply` (a template) or "Pong!".
    async fn run(&self, ctx: &CommandContext, args: &str, spec: &CommandSpec) -> Result<()> {
        let text = str_config(spec, "reply").map_or_else(|| "Pong!".to_owned(), |t| ctx.expand(&t, args));
        send_text(ctx, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::harness;

    #[tokio::test]
    async fn pongs() {
        let mut h = harness();
        assert_eq!(h.run(&Ping, "").await, "Pong!");
    }

    #[tokio::test]
    async fn reply_is_configurable() {
        let h = harness();
        let (outbox, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let ctx = CommandContext { outbox, ..h.ctx.clone() };
        let mut spec = CommandSpec::new("ping", &["ping"]);
        spec.config = serde_yaml::from_str("reply: \"Pong, {sender}!\"").unwrap();
        Ping.run(&ctx, "", &spec).await.unwrap();
        assert_eq!(rx.try_recv().unwrap().text, "Pong, alice!");
    }
}
