//! Cached timeline entries and their client-local UI state

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Account, Status, StatusId, TimelineId};

/// Client-local display flags for one status.
///
/// The server never sees these, so they have to survive every re-fetch of
/// the same status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UiState {
    /// Content warning opened
    pub expanded: bool,
    /// Sensitive media revealed
    pub content_showing: bool,
    /// Long post folded
    pub content_collapsed: bool,
}

impl UiState {
    /// Flags for a status seen for the first time
    pub fn defaults_for(account: &Account, status: &Status) -> Self {
        Self {
            expanded: account.always_open_spoiler,
            content_showing: account.always_show_sensitive_media
                || !status.actionable().sensitive,
            content_collapsed: true,
        }
    }
}

/// A single user interaction on a cached status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiStateChange {
    /// Open or close the content warning
    Expanded(bool),
    /// Reveal or hide sensitive media
    ContentShowing(bool),
    /// Fold or unfold a long post
    ContentCollapsed(bool),
}

/// One cached status in one account's timeline
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    /// Owning account
    pub account_id: Uuid,
    /// Timeline the entry belongs to
    pub timeline: TimelineId,
    /// Status payload
    pub status: Status,
    /// Sticky display flags
    pub ui: UiState,
}

impl TimelineEntry {
    /// Server id of the cached status
    pub fn id(&self) -> &StatusId {
        &self.status.id
    }
}
