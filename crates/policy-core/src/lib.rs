//! Prefix-matched permission, cooldown and named-entry resolution for a
//! chat command framework.

pub mod cache;
pub mod clock;
pub mod error;
pub mod resolver;
pub mod rules;
pub mod store;
pub mod trie;

pub use cache::{LoadState, ResolverCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, StoreOperation};
pub use resolver::{Authorization, PolicyResolver};
pub use rules::{
    CooldownRule, CustomCommand, Invoker, Keyed, Keyword, PermissionRule, Rank, RankClassifier,
};
pub use store::{BackingStore, MemoryStore};
pub use trie::PrefixTrie;

/// Normalizes a command token and its argument words into the action
/// string rules are keyed by: lower-cased name, single spaces.
#[must_use]
pub fn action_string(command: &str, args: &str) -> String {
    let mut action = command.trim().to_lowercase();
    for word in args.split_whitespace() {
        action.push(' ');
        action.push_str(word);
    }
    action
}
