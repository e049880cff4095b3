//! Character trie keyed by action strings with word-bounded prefix lookup.
//!
//! A stored key `k` matches a query `q` when `q == k` or `q` starts with
//! `k` followed by a single space. Among all matching keys the longest one
//! wins, so a rule stored at `"role"` cascades to `"role get"` and
//! `"role allow Foo"` until a more specific key overrides it, while never
//! matching `"roleplay"`.

use std::collections::BTreeMap;

#[derive(Debug)]
struct Node<V> {
    children: BTreeMap<char, Node<V>>,
    value: Option<V>,
}

impl<V> Default for Node<V> {
    fn default() -> Self {
        Self {
            children: BTreeMap::new(),
            value: None,
        }
    }
}

impl<V> Node<V> {
    fn is_vacant(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    /// Removes the value stored at the end of `chars`, pruning nodes that no
    /// longer lead to any value. Returns the removed value, if any.
    fn remove(&mut self, mut chars: core::str::Chars<'_>) -> Option<V> {
        let Some(c) = chars.next() else {
            return self.value.take();
        };
        let child = self.children.get_mut(&c)?;
        let removed = child.remove(chars);
        if removed.is_some() && child.is_vacant() {
            self.children.remove(&c);
        }
        removed
    }

    fn collect<'a>(&'a self, prefix: &mut String, out: &mut Vec<(String, &'a V)>) {
        if let Some(value) = &self.value {
            out.push((prefix.clone(), value));
        }
        for (c, child) in &self.children {
            prefix.push(*c);
            child.collect(prefix, out);
            prefix.pop();
        }
    }
}

#[derive(Debug)]
pub struct PrefixTrie<V> {
    root: Node<V>,
    len: usize,
}

impl<V> Default for PrefixTrie<V> {
    fn default() -> Self {
        Self {
            root: Node::default(),
            len: 0,
        }
    }
}

impl<V> PrefixTrie<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.root = Node::default();
        self.len = 0;
    }

    /// Stores `value` at `key`, returning the value it replaced.
    pub fn insert(&mut self, key: &str, value: V) -> Option<V> {
        let mut node = &mut self.root;
        for c in key.chars() {
            node = node.children.entry(c).or_default();
        }
        let previous = node.value.replace(value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Removes the value stored exactly at `key`. Values at keys that are
    /// prefixes or extensions of `key` are left alone.
    pub fn remove(&mut self, key: &str) -> bool {
        self.take(key).is_some()
    }

    /// Like [`remove`](Self::remove) but hands back the removed value.
    pub fn take(&mut self, key: &str) -> Option<V> {
        let removed = self.root.remove(key.chars());
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        let mut node = &self.root;
        for c in key.chars() {
            node = node.children.get(&c)?;
        }
        node.value.as_ref()
    }

    /// Value at the longest stored key that is a word-bounded prefix of
    /// `query`.
    #[must_use]
    pub fn get_prefix_match(&self, query: &str) -> Option<&V> {
        self.prefix_matches(query).into_iter().next().map(|(_, v)| v)
    }

    /// Every stored key that is a word-bounded prefix of `query`, together
    /// with its value, longest key first.
    #[must_use]
    pub fn prefix_matches<'a, 'q>(&'a self, query: &'q str) -> Vec<(&'q str, &'a V)> {
        let mut found = Vec::new();
        let mut node = &self.root;
        let mut chars = query.char_indices().peekable();
        loop {
            let end = chars.peek().map_or(query.len(), |(i, _)| *i);
            if let Some(value) = &node.value
                && (end == query.len() || query[end..].starts_with(' '))
            {
                found.push((&query[..end], value));
            }
            let Some((_, c)) = chars.next() else {
                break;
            };
            match node.children.get(&c) {
                Some(child) => node = child,
                None => break,
            }
        }
        found.reverse();
        found
    }

    /// All stored values, in key order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries().into_iter().map(|(_, v)| v)
    }

    /// All stored `(key, value)` pairs, in key order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, &V)> {
        let mut out = Vec::with_capacity(self.len);
        self.root.collect(&mut String::new(), &mut out);
        out
    }
}

/// The word-bounded prefixes of `query` (the keys that could match it in a
/// [`PrefixTrie`]), longest first: `"role get Foo"`, `"role get"`, `"role"`.
#[must_use]
pub fn word_prefixes(query: &str) -> Vec<&str> {
    let mut prefixes: Vec<&str> = query
        .match_indices(' ')
        .map(|(i, _)| &query[..i])
        .filter(|p| !p.is_empty())
        .collect();
    prefixes.push(query);
    prefixes.dedup();
    prefixes.reverse();
    prefixes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role_trie() -> PrefixTrie<&'static str> {
        let mut trie = PrefixTrie::new();
        trie.insert("role", "A");
        trie.insert("role allow", "B");
        trie
    }

    #[test]
    fn longest_prefix_wins() {
        let trie = role_trie();
        assert_eq!(trie.get_prefix_match("role allow Foo"), Some(&"B"));
        assert_eq!(trie.get_prefix_match("role get Foo"), Some(&"A"));
        assert_eq!(trie.get_prefix_match("role allow"), Some(&"B"));
        assert_eq!(trie.get_prefix_match("role"), Some(&"A"));
        assert_eq!(trie.get_prefix_match("rolegetFoo"), None);
    }

    #[test]
    fn word_boundary_guard() {
        let trie = role_trie();
        assert_eq!(trie.get_prefix_match("roleplay"), None);
        assert_eq!(trie.get_prefix_match("role allowance"), Some(&"A"));
        assert_eq!(trie.get_prefix_match("rol"), None);
    }

    #[test]
    fn prefix_matches_are_longest_first() {
        let trie = role_trie();
        let matches = trie.prefix_matches("role allow Foo");
        assert_eq!(matches, vec![("role allow", &"B"), ("role", &"A")]);
    }

    #[test]
    fn insert_overwrites_and_counts_once() {
        let mut trie = role_trie();
        assert_eq!(trie.insert("role", "C"), Some("A"));
        assert_eq!(trie.len(), 2);
        assert_eq!(trie.get("role"), Some(&"C"));
    }

    #[test]
    fn exact_get_ignores_prefixes() {
        let trie = role_trie();
        assert_eq!(trie.get("role allow"), Some(&"B"));
        assert_eq!(trie.get("role get"), None);
        assert_eq!(trie.get("rol"), None);
    }

    #[test]
    fn remove_leaves_neighbours_intact() {
        let mut trie = role_trie();
        trie.insert("role allow all", "C");
        assert!(trie.remove("role allow"));
        assert!(!trie.remove("role allow"));
        assert_eq!(trie.get("role"), Some(&"A"));
        assert_eq!(trie.get("role allow all"), Some(&"C"));
        assert_eq!(trie.get_prefix_match("role allow Foo"), Some(&"A"));
        assert_eq!(trie.get_prefix_match("role allow all x"), Some(&"C"));
        assert_eq!(trie.len(), 2);
    }

    #[test]
    fn insert_then_remove_restores_lookups() {
        let mut trie = role_trie();
        let queries = ["role", "role allow", "role get x", "roles", "ping"];
        let before: Vec<_> = queries
            .iter()
            .map(|q| (trie.get(q).copied(), trie.get_prefix_match(q).copied()))
            .collect();

        trie.insert("role get", "X");
        assert_eq!(trie.get_prefix_match("role get x"), Some(&"X"));
        assert!(trie.remove("role get"));

        let after: Vec<_> = queries
            .iter()
            .map(|q| (trie.get(q).copied(), trie.get_prefix_match(q).copied()))
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn values_and_entries_follow_key_order() {
        let mut trie = role_trie();
        trie.insert("ban", "Z");
        let keys: Vec<String> = trie.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["ban", "role", "role allow"]);
        assert_eq!(trie.values().copied().collect::<Vec<_>>(), ["Z", "A", "B"]);
    }

    #[test]
    fn empty_key_is_exact_only() {
        let mut trie = PrefixTrie::new();
        trie.insert("", 1);
        assert_eq!(trie.get_prefix_match(""), Some(&1));
        assert_eq!(trie.get_prefix_match("role"), None);
    }

    #[test]
    fn word_prefixes_longest_first() {
        assert_eq!(
            word_prefixes("role get Foo"),
            ["role get Foo", "role get", "role"]
        );
        assert_eq!(word_prefixes("ping"), ["ping"]);
    }
}
