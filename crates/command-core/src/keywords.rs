use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use policy_core::Keyword;
use regex::{Regex, RegexBuilder};

/// Compiles a keyword pattern: a case-insensitive regular expression, or,
/// if the pattern is not valid regex syntax, the literal text bounded as a
/// word.
#[must_use]
pub fn compile_pattern(pattern: &str) -> Option<Regex> {
    if let Ok(re) = RegexBuilder::new(pattern).case_insensitive(true).build() {
        return Some(re);
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let start = if pattern.starts_with(is_word) { r"\b" } else { "" };
    let end = if pattern.ends_with(is_word) { r"\b" } else { "" };
    RegexBuilder::new(&format!("{start}{}{end}", regex::escape(pattern)))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Compiled keyword patterns, keyed by pattern text.
///
/// Each pattern is compiled once; patterns no longer used by any keyword
/// are dropped on the next lookup that sees a new one.
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: RwLock<HashMap<String, Option<Regex>>>,
}

impl PatternCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The first keyword, in the given order, whose pattern matches `text`.
    pub fn first_match<'k>(&self, keywords: &'k [Keyword], text: &str) -> Option<&'k Keyword> {
        {
            let compiled = self.compiled.read().unwrap_or_else(PoisonError::into_inner);
            if keywords.iter().all(|k| compiled.contains_key(&k.pattern)) {
                return find(&compiled, keywords, text);
            }
        }
        let mut compiled = self.compiled.write().unwrap_or_else(PoisonError::into_inner);
        compiled.retain(|pattern, _| keywords.iter().any(|k| &k.pattern == pattern));
        for keyword in keywords {
            compiled
                .entry(keyword.pattern.clone())
                .or_insert_with(|| compile_pattern(&keyword.pattern));
        }
        find(&compiled, keywords, text)
    }
}

fn find<'k>(
    compiled: &HashMap<String, Option<Regex>>,
    keywords: &'k [Keyword],
    text: &str,
) -> Option<&'k Keyword> {
    keywords.iter().find(|keyword| {
        compiled
            .get(&keyword.pattern)
            .and_then(Option::as_ref)
            .is_some_and(|re| re.is_match(text))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyword(name: &str, pattern: &str) -> Keyword {
        Keyword {
            name: name.to_owned(),
            pattern: pattern.to_owned(),
            template: String::new(),
            owner_id: 0,
        }
    }

    #[test]
    fn regex_patterns_are_case_insensitive() {
        let re = compile_pattern(r"\bhello\b").unwrap();
        assert!(re.is_match("well HELLO there"));
        assert!(!re.is_match("othello"));
    }

    #[test]
    fn invalid_regex_falls_back_to_literal_word() {
        let re = compile_pattern("c++ (").unwrap();
        assert!(re.is_match("I write C++ ( daily"));
        assert!(!re.is_match("I write C daily"));
    }

    #[test]
    fn first_keyword_in_order_wins() {
        let patterns = PatternCache::new();
        let keywords = [keyword("a", "tea"), keyword("b", "tea|coffee")];
        let hit = |text: &str| patterns.first_match(&keywords, text).map(|k| k.name.as_str());
        assert_eq!(hit("tea time"), Some("a"));
        assert_eq!(hit("coffee"), Some("b"));
        assert!(hit("water").is_none());
    }

    #[test]
    fn patterns_compile_once_and_stale_ones_are_dropped() {
        let patterns = PatternCache::new();
        let keywords = vec![keyword("a", "tea"), keyword("b", "coffee")];
        for _ in 0..3 {
            patterns.first_match(&keywords, "tea");
        }
        assert_eq!(patterns.compiled.read().unwrap().len(), 2);

        let renamed = vec![keyword("a", "tea"), keyword("b", "cocoa")];
        assert_eq!(patterns.first_match(&renamed, "hot cocoa").map(|k| k.name.as_str()), Some("b"));
        let compiled = patterns.compiled.read().unwrap();
        assert!(compiled.contains_key("cocoa") && !compiled.contains_key("coffee"));
    }
}
