//! Server-assigned status identifiers

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Opaque status id as issued by the server.
///
/// Mastodon ids are numeric strings that grow with creation time, but they
/// do not fit a fixed width, so plain string comparison is wrong ("99" would
/// sort after "100"). Ids compare by length first and then lexicographically:
/// a token with more digits is always newer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusId(String);

impl StatusId {
    /// Wrap a raw id string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the raw id
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Ord for StatusId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for StatusId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for StatusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StatusId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StatusId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Inclusive id range covered by a set of ids, or `None` when empty
pub fn id_range<'a, I>(ids: I) -> Option<(StatusId, StatusId)>
where
    I: IntoIterator<Item = &'a StatusId>,
{
    let mut iter = ids.into_iter();
    let first = iter.next()?;
    let (low, high) = iter.fold((first, first), |(low, high), id| {
        (low.min(id), high.max(id))
    });
    Some((low.clone(), high.clone()))
}
