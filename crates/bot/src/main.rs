mod commands;
mod config;
mod console;
mod dispatch;
mod logging;
mod store;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, Result};
use clap::Parser;
use command_core::{GuildDirectory, Reply};
use policy_core::SystemClock;
use tokio::{
    io::{AsyncBufReadExt as _, BufReader},
    sync::mpsc,
};
use tracing::{info, warn};

use crate::{
    config::load_config,
    console::{Console, Line},
    dispatch::Dispatcher,
    logging::init_tracing,
    store::YamlStoreFactory,
};

#[derive(Parser, Debug)]
#[command(
    name = "guild-bot",
    version,
    about = "Chat command bot with prefix-scoped permissions, cooldowns and templated custom commands"
)]
struct Args {
    /// YAML config: prefix, ranks, members, events and command specs
    #[arg(long, env = "BOT_CONFIG", default_value = "./config.yaml")]
    config: PathBuf,

    /// Directory holding one YAML store per guild
    #[arg(long, env = "BOT_STORE", default_value = "./bot-store")]
    store: PathBuf,

    /// Guild the console starts in
    #[arg(long, env = "BOT_GUILD", default_value = "console")]
    guild: String,

    /// Member id the console speaks as
    #[arg(long, env = "BOT_USER_ID", default_value_t = 1)]
    user_id: u64,

    /// Display name used when the member id has no configured name
    #[arg(long, env = "BOT_USER_NAME", default_value = "operator")]
    user_name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present so clap can pick up env vars.
    let _ = dotenvy::dotenv();
    init_tracing()?;
    let args = Args::parse();

    let config = Arc::new(load_config(&args.config)?);
    let registry = commands::build_registry(&config).await;
    let guilds = Arc::new(
        GuildDirectory::new(
            Arc::new(YamlStoreFactory::new(&args.store, config.default_permissions.clone())),
            Arc::new(config.roster()),
            Arc::new(SystemClock),
        )
        .with_events(config.events.clone()),
    );
    // Open the starting guild now so a broken store fails at startup.
    guilds
        .scope(&args.guild)
        .await
        .with_context(|| format!("opening guild {}", args.guild))?;

    let (outbox, mut replies) = mpsc::unbounded_channel::<Reply>();
    let printer = tokio::spawn(async move {
        while let Some(reply) = replies.recv().await {
            println!("[#{}] {}", reply.channel, reply.text);
        }
    });

    let dispatcher = Dispatcher::new(Arc::clone(&guilds), registry, &config.prefix, outbox);
    let mut console = Console::new(Arc::clone(&config), &args.guild, args.user_id, &args.user_name);
    info!(guild = %args.guild, prefix = %config.prefix, "Console ready, type /help for console commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        match console.read(&line) {
            Line::Empty => {}
            Line::Quit => break,
            Line::Notice(text) => dispatcher.notice(console.channel(), text)?,
            Line::Message(msg) => {
                if let Err(e) = dispatcher.handle(*msg).await {
                    warn!(error = %e, "Failed to handle message");
                }
            }
        }
    }

    drop(dispatcher);
    printer.await.context("reply printer")?;
    info!("Shutting down");
    Ok(())
}
