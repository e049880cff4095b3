use std::sync::Arc;

use crate::{ChatCommand, CommandSpec};

/// Built-in command provider: contributes its default spec and builds the
/// command instance.
pub trait CommandFactory {
    /// Adds this command's default spec to `specs` unless one with the same
    /// id is already present.
    fn register_defaults(&self, specs: &mut Vec<CommandSpec>);

    #[must_use]
    fn build(&self) -> Arc<dyn ChatCommand>;
}
