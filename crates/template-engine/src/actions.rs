//! Built-in placeholders.
//!
//! Handlers never fail: bad input turns into a message for the chat.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use time::{Date, macros::format_description};

use crate::{context::EvalContext, registry::Handler};

pub(crate) struct BuiltinAction {
    pub(crate) name: &'static str,
    pub(crate) usage: &'static str,
    pub(crate) help: &'static str,
    pub(crate) pattern: &'static str,
    pub(crate) handler: Handler,
}

pub(crate) fn builtin_definitions() -> Vec<BuiltinAction> {
    vec![
        BuiltinAction {
            name: "choice",
            usage: "{choice a|b|c}",
            help: "One of the `|`-separated options, picked at random.",
            pattern: r"choice\s+(.*)",
            handler: choice,
        },
        BuiltinAction {
            name: "rng",
            usage: "{rng A,B}",
            help: "A random whole number from A to B, both included.",
            pattern: r"rng\s+(-?\d+)\s*,\s*(-?\d+)",
            handler: rng,
        },
        BuiltinAction {
            name: "message",
            usage: "{message}",
            help: "Everything written after the command name.",
            pattern: "message",
            handler: message,
        },
        BuiltinAction {
            name: "argument",
            usage: "{argument N,K}",
            help: "Splits the text after the command into at most N words and takes word K (from 0).",
            pattern: r"argument\s+(\d+)\s*,\s*(\d+)",
            handler: argument,
        },
        BuiltinAction {
            name: "messageText",
            usage: "{messageText}",
            help: "The text after the command with mentions removed.",
            pattern: "messageText",
            handler: message_text,
        },
        BuiltinAction {
            name: "mentions",
            usage: "{mentions}",
            help: "Names of everyone mentioned in the message.",
            pattern: "mentions",
            handler: mentions,
        },
        BuiltinAction {
            name: "sender",
            usage: "{sender}",
            help: "Name of whoever ran the command.",
            pattern: "sender",
            handler: sender,
        },
        BuiltinAction {
            name: "channel",
            usage: "{channel}",
            help: "Name of the channel the command ran in.",
            pattern: "channel",
            handler: channel,
        },
        BuiltinAction {
            name: "randomEventMember",
            usage: "{randomEventMember event}",
            help: "A random member of the named event.",
            pattern: r"randomEventMember\s+(.+)",
            handler: random_event_member,
        },
        BuiltinAction {
            name: "daysSince",
            usage: "{daysSince YYYY-MM-DD}",
            help: "Number of days between the date and today.",
            pattern: r"daysSince\s+(.+)",
            handler: days_since,
        },
        BuiltinAction {
            name: "upper",
            usage: "{upper text}",
            help: "The text in upper case.",
            pattern: r"upper\s+(.*)",
            handler: upper,
        },
        BuiltinAction {
            name: "lower",
            usage: "{lower text}",
            help: "The text in lower case.",
            pattern: r"lower\s+(.*)",
            handler: lower,
        },
    ]
}

fn group<'c>(caps: &'c Captures<'_>, i: usize) -> &'c str {
    caps.get(i).map_or("", |m| m.as_str())
}

fn choice(ctx: &EvalContext<'_>, caps: &Captures<'_>) -> String {
    let options: Vec<&str> = group(caps, 1).split('|').collect();
    ctx.choose(&options).map(|s| (*s).to_owned()).unwrap_or_default()
}

fn rng(ctx: &EvalContext<'_>, caps: &Captures<'_>) -> String {
    let (Ok(a), Ok(b)) = (group(caps, 1).parse::<i64>(), group(caps, 2).parse::<i64>()) else {
        return format!("Invalid range: {},{}", group(caps, 1), group(caps, 2));
    };
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    ctx.random_between(low, high).to_string()
}

fn message(ctx: &EvalContext<'_>, _: &Captures<'_>) -> String {
    ctx.message.to_owned()
}

/// Splits on runs of whitespace into at most `limit` parts; the last part
/// keeps the rest of the text. A limit of zero means no limit.
fn split_limited(text: &str, limit: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = text.trim();
    while !rest.is_empty() {
        if parts.len() + 1 == limit {
            parts.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                parts.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                parts.push(rest);
                break;
            }
        }
    }
    parts
}

fn argument(ctx: &EvalContext<'_>, caps: &Captures<'_>) -> String {
    let (Ok(limit), Ok(index)) = (group(caps, 1).parse::<usize>(), group(caps, 2).parse::<usize>())
    else {
        return String::new();
    };
    split_limited(ctx.message, limit)
        .get(index)
        .map(|s| (*s).to_owned())
        .unwrap_or_default()
}

static MENTION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:@[!&]?|#)\d+>").unwrap());

fn message_text(ctx: &EvalContext<'_>, _: &Captures<'_>) -> String {
    MENTION_TOKEN.replace_all(ctx.message, "").trim().to_owned()
}

fn mentions(ctx: &EvalContext<'_>, _: &Captures<'_>) -> String {
    ctx.mentions.join(", ")
}

fn sender(ctx: &EvalContext<'_>, _: &Captures<'_>) -> String {
    ctx.sender.to_owned()
}

fn channel(ctx: &EvalContext<'_>, _: &Captures<'_>) -> String {
    ctx.channel.to_owned()
}

fn random_event_member(ctx: &EvalContext<'_>, caps: &Captures<'_>) -> String {
    let event = group(caps, 1).trim();
    match ctx.events.members(event) {
        None => format!("Event \"{event}\" not found."),
        Some(members) => ctx
            .choose(&members)
            .cloned()
            .unwrap_or_else(|| format!("Event \"{event}\" has no members.")),
    }
}

fn days_since(ctx: &EvalContext<'_>, caps: &Captures<'_>) -> String {
    let raw = group(caps, 1).trim();
    let Ok(date) = Date::parse(raw, format_description!("[year]-[month]-[day]")) else {
        return format!("\"{raw}\" is not a valid date (expected YYYY-MM-DD).");
    };
    let days = (ctx.today - date).whole_days().unsigned_abs();
    if days == 1 {
        "1 day".to_owned()
    } else {
        format!("{days} days")
    }
}

fn upper(_: &EvalContext<'_>, caps: &Captures<'_>) -> String {
    group(caps, 1).to_uppercase()
}

fn lower(_: &EvalContext<'_>, caps: &Captures<'_>) -> String {
    group(caps, 1).to_lowercase()
}
