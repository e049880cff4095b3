use std::{collections::HashMap, sync::Arc};

use command_core::{ChatCommand, CommandRegistry, CommandSpec};
use tracing::{info, warn};

use crate::config::BotConfig;

/// Registers every built-in command, with configured specs taking
/// precedence over each command's defaults.
pub(crate) async fn build_registry(config: &BotConfig) -> Arc<CommandRegistry> {
    let mut specs = config.commands.clone().unwrap_or_default();
    let mut builders: HashMap<String, Arc<dyn ChatCommand>> = HashMap::new();

    for factory in command_admin::factories() {
        let mut defaults = Vec::new();
        factory.register_defaults(&mut defaults);
        for default in defaults {
            builders.insert(default.id.clone(), factory.build());
            merge_default_spec(&mut specs, default);
        }
    }

    let registry = Arc::new(CommandRegistry::new());
    for spec in specs {
        let Some(command) = builders.get(spec.id.as_str()) else {
            warn!("Unknown command ID: {}", spec.id);
            continue;
        };
        registry.register(spec, Arc::clone(command)).await;
    }

    let mut triggers: Vec<String> = Vec::new();
    for (_, entry) in registry.entries().await {
        triggers.extend(entry.spec.triggers.commands.iter().map(|c| format!("{}{c}", config.prefix)));
    }
    triggers.sort();
    info!(commands = ?triggers, "Registered command triggers");
    registry
}

/// Adds default triggers missing from a configured spec, or the whole
/// default spec when none is configured. Configured `enabled` and `config`
/// always win.
fn merge_default_spec(specs: &mut Vec<CommandSpec>, default: CommandSpec) {
    if let Some(existing) = specs.iter_mut().find(|s| s.id == default.id) {
        for cmd in default.triggers.commands {
            if !existing
                .triggers
                .commands
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&cmd))
            {
                existing.triggers.commands.push(cmd);
            }
        }
    } else {
        specs.push(default);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_configured_fields() {
        let mut configured = CommandSpec::new("ping", &["p"]);
        configured.enabled = false;
        let mut specs = vec![configured];
        merge_default_spec(&mut specs, CommandSpec::new("ping", &["PING", "p"]));
        merge_default_spec(&mut specs, CommandSpec::new("help", &["help"]));
        assert_eq!(specs.len(), 2);
        assert!(!specs[0].enabled);
        assert_eq!(specs[0].triggers.commands, vec!["p".to_owned(), "PING".to_owned()]);
    }

    #[tokio::test]
    async fn registers_all_builtins() {
        let registry = build_registry(&BotConfig::default()).await;
        let ids: Vec<String> = registry.entries().await.into_iter().map(|(id, _)| id).collect();
        assert_eq!(
            ids,
            ["builtins", "command", "cooldown", "event", "help", "keyword", "perm", "ping"]
        );
        assert!(registry.entry_by_command("cmd").await.is_some());
    }

    #[tokio::test]
    async fn configured_specs_override_defaults() {
        let mut disabled = CommandSpec::new("ping", &["p"]);
        disabled.enabled = false;
        let config = BotConfig {
            commands: Some(vec![disabled, CommandSpec::new("nonsense", &["x"])]),
            ..BotConfig::default()
        };
        let registry = build_registry(&config).await;
        assert!(!registry.is_enabled("ping").await);
        assert_eq!(
            registry.entry_by_command("p").await.map(|e| e.spec.id),
            Some("ping".to_owned())
        );
        assert!(registry.entry("nonsense").await.is_none());
    }
}
