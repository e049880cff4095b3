//! Bracket-template expansion for user-authored chat commands.

mod actions;
pub mod context;
pub mod interpreter;
pub mod registry;

pub use context::{EvalContext, EventDirectory, NoEvents};
pub use interpreter::TemplateInterpreter;
pub use registry::{ActionDefinition, ActionRegistry, Handler};
