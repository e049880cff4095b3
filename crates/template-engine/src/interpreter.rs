//! Single-pass expansion of `{placeholder}` templates.
//!
//! The interpreter keeps a stack of text buffers. `{` opens a buffer, `}`
//! closes the innermost one and replaces it with the output of the first
//! matching action, so nested placeholders are evaluated innermost first:
//! in `{choice {rng 1,2}|{rng 3,4}}` both `rng`s run before `choice` sees
//! its options. A backslash emits the next character literally.
//!
//! Malformed input never fails:
//! - an unknown placeholder is replaced by its interior text, braces dropped;
//! - an unmatched `}` is emitted as-is;
//! - the text of an unclosed `{` is kept, without the brace.

use tracing::debug;

use crate::{context::EvalContext, registry::ActionRegistry};

#[derive(Debug, Clone, Copy)]
pub struct TemplateInterpreter<'r> {
    registry: &'r ActionRegistry,
}

impl Default for TemplateInterpreter<'static> {
    fn default() -> Self {
        Self::new(ActionRegistry::builtin())
    }
}

impl<'r> TemplateInterpreter<'r> {
    #[must_use]
    pub const fn new(registry: &'r ActionRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub const fn registry(&self) -> &'r ActionRegistry {
        self.registry
    }

    #[must_use]
    pub fn expand(&self, template: &str, ctx: &EvalContext<'_>) -> String {
        let mut stack = vec![String::new()];
        let mut escaped = false;

        for c in template.chars() {
            if escaped {
                push_char(&mut stack, c);
                escaped = false;
                continue;
            }
            match c {
                '\\' => escaped = true,
                '{' => stack.push(String::new()),
                '}' => {
                    let mut fragment = stack.pop().unwrap_or_default();
                    let Some(top) = stack.last_mut() else {
                        fragment.push('}');
                        stack.push(fragment);
                        continue;
                    };
                    match self.registry.evaluate(&fragment, ctx) {
                        Some(output) => top.push_str(&output),
                        None => {
                            debug!(fragment = %fragment, "No action matched placeholder");
                            top.push_str(&fragment);
                        }
                    }
                }
                _ => push_char(&mut stack, c),
            }
        }

        stack.concat()
    }
}

fn push_char(stack: &mut Vec<String>, c: char) {
    match stack.last_mut() {
        Some(top) => top.push(c),
        None => stack.push(c.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};

    use rand::{SeedableRng as _, rngs::StdRng};
    use time::macros::date;

    use super::*;
    use crate::context::EventDirectory;

    struct Events(HashMap<&'static str, Vec<String>>);

    impl EventDirectory for Events {
        fn members(&self, event: &str) -> Option<Vec<String>> {
            self.0.get(event).cloned()
        }
    }

    fn ctx(message: &str) -> EvalContext<'_> {
        EvalContext::new("alice", message)
            .with_channel("general")
            .with_today(date!(2024 - 05 - 10))
            .with_rng(StdRng::seed_from_u64(7))
    }

    fn expand(template: &str, ctx: &EvalContext<'_>) -> String {
        TemplateInterpreter::default().expand(template, ctx)
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(expand("hello there", &ctx("")), "hello there");
        assert_eq!(expand("", &ctx("")), "");
    }

    #[test]
    fn nested_placeholders_evaluate_inside_out() {
        let out = expand("{choice {rng 1,1}|{rng 2,2}}", &ctx(""));
        assert!(out == "1" || out == "2", "unexpected {out}");
    }

    #[test]
    fn escapes_are_literal() {
        assert_eq!(expand("\\{not a template\\}", &ctx("")), "{not a template}");
        assert_eq!(expand(r"a\\b", &ctx("")), r"a\b");
        assert_eq!(expand(r"\{sender\}", &ctx("")), "{sender}");
        assert_eq!(expand(r"trailing\", &ctx("")), "trailing");
    }

    #[test]
    fn unknown_placeholder_drops_braces() {
        assert_eq!(expand("{nosuchaction}", &ctx("")), "nosuchaction");
        assert_eq!(expand("a {b c} d", &ctx("")), "a b c d");
    }

    #[test]
    fn unbalanced_braces_are_literal() {
        assert_eq!(expand("a}b", &ctx("")), "a}b");
        assert_eq!(expand("{sender}}", &ctx("")), "alice}");
        assert_eq!(expand("x{choice", &ctx("")), "xchoice");
        assert_eq!(expand("{{sender}", &ctx("")), "alice");
    }

    #[test]
    fn rng_covers_both_bounds() {
        let ctx = ctx("");
        let seen: BTreeSet<String> = (0..200).map(|_| expand("{rng 1,3}", &ctx)).collect();
        assert_eq!(seen, BTreeSet::from(["1".to_owned(), "2".to_owned(), "3".to_owned()]));
        assert_eq!(expand("{rng 5,5}", &ctx), "5");
        let reversed: i64 = expand("{rng 9,7}", &ctx).parse().unwrap();
        assert!((7..=9).contains(&reversed));
    }

    #[test]
    fn seeded_choices_are_reproducible() {
        let a = expand("{choice a|b|c|d|e} {choice a|b|c|d|e}", &ctx(""));
        let b = expand("{choice a|b|c|d|e} {choice a|b|c|d|e}", &ctx(""));
        assert_eq!(a, b);
    }

    #[test]
    fn message_actions() {
        let mentions = vec!["bob".to_owned(), "carol".to_owned()];
        let ctx = ctx("  <@12> hugs <@!34>  ").with_mentions(&mentions);
        assert_eq!(expand("{messageText}", &ctx), "hugs");
        assert_eq!(expand("{mentions}", &ctx), "bob, carol");
        assert_eq!(expand("{sender} in {channel}", &ctx), "alice in general");
        assert_eq!(expand("[{message}]", &ctx), "[  <@12> hugs <@!34>  ]");
    }

    #[test]
    fn argument_splits_with_limit() {
        let ctx = ctx("give bob a cookie");
        assert_eq!(expand("{argument 2,0}", &ctx), "give");
        assert_eq!(expand("{argument 2,1}", &ctx), "bob a cookie");
        assert_eq!(expand("{argument 4,3}", &ctx), "cookie");
        assert_eq!(expand("{argument 4,9}", &ctx), "");
    }

    #[test]
    fn days_since_counts_absolute_days() {
        let ctx = ctx("");
        assert_eq!(expand("{daysSince 2024-05-09}", &ctx), "1 day");
        assert_eq!(expand("{daysSince 2024-05-11}", &ctx), "1 day");
        assert_eq!(expand("{daysSince 2024-05-10}", &ctx), "0 days");
        assert_eq!(expand("{daysSince 2024-01-01}", &ctx), "130 days");
        assert_eq!(
            expand("{daysSince yesterday}", &ctx),
            "\"yesterday\" is not a valid date (expected YYYY-MM-DD)."
        );
    }

    #[test]
    fn random_event_member_reports_missing_events() {
        let events = Events(HashMap::from([
            ("raid", vec!["bob".to_owned()]),
            ("empty", Vec::new()),
        ]));
        let ctx = ctx("").with_events(&events);
        assert_eq!(expand("{randomEventMember raid}", &ctx), "bob");
        assert_eq!(
            expand("{randomEventMember empty}", &ctx),
            "Event \"empty\" has no members."
        );
        assert_eq!(
            expand("{randomEventMember party}", &ctx),
            "Event \"party\" not found."
        );
    }

    #[test]
    fn case_actions_compose() {
        assert_eq!(expand("{upper hi {sender}}", &ctx("")), "HI ALICE");
        assert_eq!(expand("{lower ABC}", &ctx("")), "abc");
    }
}
