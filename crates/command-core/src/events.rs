use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock},
};

use template_engine::EventDirectory;

/// In-memory event membership for one guild.
#[derive(Debug, Default)]
pub struct MemoryEvents {
    events: RwLock<BTreeMap<String, Vec<String>>>,
}

impl MemoryEvents {
    #[must_use]
    pub fn new(seed: BTreeMap<String, Vec<String>>) -> Self {
        let events = seed
            .into_iter()
            .map(|(name, members)| (normalize(&name), members))
            .collect();
        Self {
            events: RwLock::new(events),
        }
    }

    /// Adds `member` to `event`, creating the event if needed. Returns
    /// `false` if they were already a member.
    pub fn join(&self, event: &str, member: &str) -> bool {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        let members = events.entry(normalize(event)).or_default();
        if members.iter().any(|m| m == member) {
            return false;
        }
        members.push(member.to_owned());
        true
    }

    /// Removes `member` from `event`. Returns `false` if they were not in it.
    pub fn leave(&self, event: &str, member: &str) -> bool {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        let Some(members) = events.get_mut(&normalize(event)) else {
            return false;
        };
        let before = members.len();
        members.retain(|m| m != member);
        before != members.len()
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        events.keys().cloned().collect()
    }
}

impl EventDirectory for MemoryEvents {
    fn members(&self, event: &str) -> Option<Vec<String>> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        events.get(&normalize(event)).cloned()
    }
}

fn normalize(event: &str) -> String {
    event.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_and_leave() {
        let events = MemoryEvents::default();
        assert!(events.join("Raid", "bob"));
        assert!(!events.join("raid", "bob"));
        assert_eq!(events.members("RAID"), Some(vec!["bob".to_owned()]));
        assert!(events.leave("raid", "bob"));
        assert!(!events.leave("raid", "bob"));
        assert_eq!(events.members("raid"), Some(Vec::new()));
        assert_eq!(events.members("party"), None);
    }
}
