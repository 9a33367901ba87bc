//! Timeline identity, load directions and cursor kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A logical timeline, scoped per account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimelineId {
    /// Statuses from followed accounts
    Home,
    /// Public statuses from the account's own server
    Local,
    /// Public statuses from every known server
    Federated,
    /// Public statuses carrying a hashtag
    Tag(String),
    /// A user-defined list
    List(String),
}

impl TimelineId {
    /// Stable storage key (e.g. `HOME`, `TAG:rust`)
    pub fn key(&self) -> String {
        match self {
            Self::Home => "HOME".to_string(),
            Self::Local => "LOCAL".to_string(),
            Self::Federated => "FEDERATED".to_string(),
            Self::Tag(tag) => format!("TAG:{tag}"),
            Self::List(id) => format!("LIST:{id}"),
        }
    }

    /// Parse a stable key or a CLI-friendly name (`home`, `#rust`, `list:42`)
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(tag) = s.strip_prefix('#') {
            return (!tag.is_empty()).then(|| Self::Tag(tag.to_string()));
        }
        if let Some((kind, value)) = s.split_once(':') {
            if value.is_empty() {
                return None;
            }
            return match kind.to_uppercase().as_str() {
                "TAG" => Some(Self::Tag(value.to_string())),
                "LIST" => Some(Self::List(value.to_string())),
                _ => None,
            };
        }
        match s.to_uppercase().as_str() {
            "HOME" => Some(Self::Home),
            "LOCAL" => Some(Self::Local),
            "FEDERATED" | "PUBLIC" => Some(Self::Federated),
            _ => None,
        }
    }
}

impl fmt::Display for TimelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for TimelineId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown timeline: {s}"))
    }
}

impl TryFrom<String> for TimelineId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TimelineId> for String {
    fn from(id: TimelineId) -> Self {
        id.key()
    }
}

/// Direction of a paginated load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadType {
    /// Reset to the newest page
    Refresh,
    /// Extend towards newer content
    Prepend,
    /// Extend towards older content
    Append,
}

impl LoadType {
    /// Lowercase name for logs
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::Prepend => "prepend",
            Self::Append => "append",
        }
    }
}

impl fmt::Display for LoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of pagination bookmark kept per timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteKeyKind {
    /// Cursor for older content (`max_id`)
    Next,
    /// Cursor for newer content (`min_id`)
    Prev,
    /// Advisory anchor for the next refresh
    Refresh,
}

impl RemoteKeyKind {
    /// Storage representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Prev => "prev",
            Self::Refresh => "refresh",
        }
    }
}
