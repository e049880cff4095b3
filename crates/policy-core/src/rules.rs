use core::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Extracts the lookup key a cached value is stored under.
pub trait Keyed {
    fn key(&self) -> &str;
}

/// Permission rank. Ordered from least to most privileged.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    #[default]
    User,
    Member,
    Admin,
    Owner,
}

impl Rank {
    /// Admin and above bypass cooldowns.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::Admin | Self::Owner)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Member => "member",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown rank `{0}` (expected user, member, admin or owner)")]
pub struct ParseRankError(String);

impl FromStr for Rank {
    type Err = ParseRankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "everyone" => Ok(Self::User),
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            "owner" => Ok(Self::Owner),
            _ => Err(ParseRankError(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    pub action: String,
    pub required_rank: Rank,
    /// Platform role that grants the action regardless of rank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_role_id: Option<u64>,
}

impl PermissionRule {
    #[must_use]
    pub fn new(action: impl Into<String>, required_rank: Rank) -> Self {
        Self {
            action: action.into(),
            required_rank,
            required_role_id: None,
        }
    }

    #[must_use]
    pub const fn with_role(mut self, role_id: u64) -> Self {
        self.required_role_id = Some(role_id);
        self
    }

    /// Rule applied when nothing is configured for an action.
    #[must_use]
    pub fn unrestricted(action: impl Into<String>) -> Self {
        Self::new(action, Rank::User)
    }

    /// Rule applied when the permission store cannot be reached.
    #[must_use]
    pub fn fail_closed(action: impl Into<String>) -> Self {
        Self::new(action, Rank::Owner)
    }
}

impl Keyed for PermissionRule {
    fn key(&self) -> &str {
        &self.action
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownRule {
    pub action: String,
    /// Zero disables the cooldown even though the rule exists.
    pub duration: Duration,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_activation: Option<OffsetDateTime>,
}

impl CooldownRule {
    #[must_use]
    pub fn new(action: impl Into<String>, duration: Duration) -> Self {
        Self {
            action: action.into(),
            duration,
            last_activation: None,
        }
    }

    #[must_use]
    pub const fn is_enforced(&self) -> bool {
        !self.duration.is_zero()
    }
}

impl Keyed for CooldownRule {
    fn key(&self) -> &str {
        &self.action
    }
}

/// A user-authored command whose template is expanded on invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomCommand {
    pub name: String,
    pub template: String,
    pub owner_id: u64,
}

impl Keyed for CustomCommand {
    fn key(&self) -> &str {
        &self.name
    }
}

/// A template fired by ordinary messages that match `pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub name: String,
    pub pattern: String,
    pub template: String,
    pub owner_id: u64,
}

impl Keyed for Keyword {
    fn key(&self) -> &str {
        &self.name
    }
}

/// The member a command is being resolved for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Invoker {
    pub id: u64,
    pub display_name: String,
    pub role_ids: Vec<u64>,
}

impl Invoker {
    #[must_use]
    pub fn new(id: u64, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            role_ids: Vec::new(),
        }
    }
}

/// Maps an invoker to their rank; provided by the surrounding application.
pub trait RankClassifier: Send + Sync {
    fn rank(&self, invoker: &Invoker) -> Rank;
}

impl<F> RankClassifier for F
where
    F: Fn(&Invoker) -> Rank + Send + Sync,
{
    fn rank(&self, invoker: &Invoker) -> Rank {
        self(invoker)
    }
}
