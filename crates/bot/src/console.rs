//! Stdin transport. Every line is a chat message from the current speaker;
//! lines starting with `/` control the session instead.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::{config::BotConfig, dispatch::Incoming};

static MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<@!?(\d+)>").unwrap());

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Line {
    Message(Box<Incoming>),
    /// Session state changed; the text describes how.
    Notice(String),
    Quit,
    Empty,
}

#[derive(Debug)]
pub(crate) struct Console {
    config: Arc<BotConfig>,
    guild: String,
    channel: String,
    speaker_id: u64,
    speaker_name: String,
}

impl Console {
    pub(crate) fn new(config: Arc<BotConfig>, guild: &str, speaker_id: u64, speaker_name: &str) -> Self {
        Self {
            config,
            guild: guild.to_owned(),
            channel: "general".to_owned(),
            speaker_id,
            speaker_name: speaker_name.to_owned(),
        }
    }

    pub(crate) fn channel(&self) -> &str {
        &self.channel
    }

    pub(crate) fn read(&mut self, line: &str) -> Line {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Line::Empty;
        }
        match line.strip_prefix('/').map(|rest| rest.split_whitespace().collect::<Vec<_>>()) {
            Some(words) => self.control(&words),
            None => Line::Message(Box::new(self.message(line))),
        }
    }

    fn control(&mut self, words: &[&str]) -> Line {
        match words {
            ["quit" | "exit"] => Line::Quit,
            ["as", id] => match id.parse::<u64>() {
                Ok(id) => {
                    self.speaker_id = id;
                    self.speaker_name = self
                        .config
                        .member_name(id)
                        .map_or_else(|| format!("user{id}"), ToOwned::to_owned);
                    Line::Notice(format!("Speaking as {} ({id}).", self.speaker_name))
                }
                Err(_) => Line::Notice(format!("`{id}` is not a member id.")),
            },
            ["channel", name] => {
                (*name).clone_into(&mut self.channel);
                Line::Notice(format!("Now in #{name}."))
            }
            ["guild", id] => {
                (*id).clone_into(&mut self.guild);
                Line::Notice(format!("Now in guild {id}."))
            }
            _ => Line::Notice("Console commands: /as <id>, /channel <name>, /guild <id>, /quit".to_owned()),
        }
    }

    fn message(&self, text: &str) -> Incoming {
        let mentions = MENTION
            .captures_iter(text)
            .filter_map(|caps| caps[1].parse::<u64>().ok())
            .filter_map(|id| self.config.member_name(id).map(ToOwned::to_owned))
            .collect();
        Incoming {
            guild: self.guild.clone(),
            channel: self.channel.clone(),
            invoker: self.config.invoker(self.speaker_id, &self.speaker_name),
            text: text.to_owned(),
            mentions,
        }
    }
}
