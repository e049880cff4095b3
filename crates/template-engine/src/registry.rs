use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::{actions, context::EvalContext};

pub type Handler = fn(&EvalContext<'_>, &Captures<'_>) -> String;

/// A placeholder kind: the pattern its bracket interior must match in full,
/// and the handler producing its replacement text.
pub struct ActionDefinition {
    name: &'static str,
    usage: &'static str,
    help: &'static str,
    pattern: Regex,
    handler: Handler,
}

impl core::fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

impl ActionDefinition {
    /// `pattern` is anchored on both ends; it has to match the whole
    /// interior of a `{...}` fragment.
    pub fn new(
        name: &'static str,
        usage: &'static str,
        help: &'static str,
        pattern: &str,
        handler: Handler,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            usage,
            help,
            pattern: Regex::new(&format!("(?s)^(?:{pattern})$"))?,
            handler,
        })
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// How the placeholder is written, e.g. `{rng A,B}`.
    #[must_use]
    pub const fn usage(&self) -> &'static str {
        self.usage
    }

    #[must_use]
    pub const fn help(&self) -> &'static str {
        self.help
    }

    fn apply(&self, text: &str, ctx: &EvalContext<'_>) -> Option<String> {
        let captures = self.pattern.captures(text)?;
        Some((self.handler)(ctx, &captures))
    }
}

/// Ordered placeholder definitions. The first definition whose pattern
/// matches a fragment handles it; later ones are not consulted.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    definitions: Vec<ActionDefinition>,
}

static BUILTIN: LazyLock<ActionRegistry> = LazyLock::new(|| {
    ActionRegistry::new(
        actions::builtin_definitions()
            .into_iter()
            .map(|d| {
                ActionDefinition::new(d.name, d.usage, d.help, d.pattern, d.handler)
                    .unwrap_or_else(|e| panic!("built-in action `{}`: {e}", d.name))
            })
            .collect(),
    )
});

impl ActionRegistry {
    #[must_use]
    pub const fn new(definitions: Vec<ActionDefinition>) -> Self {
        Self { definitions }
    }

    /// The shared registry of built-in placeholders.
    #[must_use]
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    #[must_use]
    pub fn with(mut self, definition: ActionDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn definitions(&self) -> impl Iterator<Item = &ActionDefinition> {
        self.definitions.iter()
    }

    /// Runs the first definition matching `text`, or returns `None` when no
    /// definition matches.
    #[must_use]
    pub fn evaluate(&self, text: &str, ctx: &EvalContext<'_>) -> Option<String> {
        self.definitions.iter().find_map(|d| d.apply(text, ctx))
    }
}
