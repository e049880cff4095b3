//! Built-in commands for managing a guild's permissions, cooldowns, custom
//! commands, keywords and events.

pub mod builtins;
pub mod cooldown;
pub mod custom;
pub mod event;
pub mod help;
pub mod keyword;
pub mod perm;
pub mod ping;

use command_core::factory::CommandFactory;

/// Factories for every built-in command.
#[must_use]
pub fn factories() -> Vec<Box<dyn CommandFactory + Send + Sync>> {
    vec![
        Box::new(perm::PermCommand),
        Box::new(cooldown::CooldownCommand),
        Box::new(custom::CustomCommands),
        Box::new(keyword::KeywordCommand),
        Box::new(event::EventCommand),
        Box::new(help::HelpCommand),
        Box::new(ping::PingCommand),
        Box::new(builtins::BuiltinsCommand),
    ]
}

/// Splits `args` into its first word and the trimmed remainder.
pub(crate) fn split_first(args: &str) -> (&str, &str) {
    let args = args.trim();
    match args.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (args, ""),
    }
}

/// Normalizes free text naming an action into an action string.
pub(crate) fn action_arg(text: &str) -> Option<String> {
    let (command, rest) = split_first(text);
    let command = command_core::normalize_cmd(command);
    if command.is_empty() {
        None
    } else {
        Some(policy_core::action_string(&command, rest))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use command_core::{
        ChatCommand, CommandContext, CommandRegistry, CommandSpec, GuildScope, GuildStores, Reply,
        events::MemoryEvents,
    };
    use policy_core::{BackingStore, Invoker, Keyed, Rank, SystemClock};
    use tokio::sync::mpsc;

    pub(crate) struct Harness {
        pub(crate) ctx: CommandContext,
        rx: mpsc::UnboundedReceiver<Reply>,
    }

    impl Harness {
        pub(crate) async fn run(&mut self, command: &dyn ChatCommand, args: &str) -> String {
            let spec = CommandSpec::new(command.id(), &[command.id()]);
            command.run(&self.ctx, args, &spec).await.unwrap();
            let mut out = Vec::new();
            while let Ok(reply) = self.rx.try_recv() {
                out.push(reply.text);
            }
            out.join("\n")
        }
    }

    pub(crate) fn harness() -> Harness {
        harness_with(GuildStores::in_memory())
    }

    pub(crate) fn harness_with(stores: GuildStores) -> Harness {
        let (outbox, rx) = mpsc::unbounded_channel();
        let guild = Arc::new(GuildScope::new(
            "test",
            stores,
            Arc::new(|_: &Invoker| Rank::Admin),
            Arc::new(SystemClock),
            MemoryEvents::default(),
        ));
        let ctx = CommandContext {
            guild,
            invoker: Invoker::new(1, "alice"),
            rank: Rank::Admin,
            channel: "general".to_owned(),
            mentions: Vec::new(),
            prefix: Arc::from("!"),
            registry: Arc::new(CommandRegistry::new()),
            outbox,
        };
        Harness { ctx, rx }
    }

    /// Reads fine, refuses every write.
    pub(crate) struct ReadOnlyStore;

    #[async_trait]
    impl<V: Keyed + Send + Sync + 'static> BackingStore<V> for ReadOnlyStore {
        async fn load_all(&self) -> Result<Vec<V>> {
            Ok(Vec::new())
        }
        async fn load_one(&self, _key: &str) -> Result<Option<V>> {
            Ok(None)
        }
        async fn upsert(&self, _value: &V) -> Result<bool> {
            bail!("disk full")
        }
        async fn delete(&self, _key: &str) -> Result<bool> {
            bail!("disk full")
        }
    }

    pub(crate) fn read_only_stores() -> GuildStores {
        GuildStores {
            permissions: Arc::new(ReadOnlyStore),
            cooldowns: Arc::new(ReadOnlyStore),
            commands: Arc::new(ReadOnlyStore),
            keywords: Arc::new(ReadOnlyStore),
        }
    }
}
