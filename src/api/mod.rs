//! Server access: the timeline fetch contract and its Mastodon implementation

pub mod link;
pub mod mastodon;

use std::future::Future;

use crate::error::FetchError;
use crate::models::{Account, Status, TimelineId};

/// Bounds for one page request.
///
/// `min_id` asks for statuses newer than the id, `max_id` for older ones;
/// neither asks for the newest page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageRequest {
    /// Lower (exclusive) bound
    pub min_id: Option<String>,
    /// Upper (exclusive) bound
    pub max_id: Option<String>,
    /// Page size
    pub limit: usize,
}

impl PageRequest {
    /// The newest page
    pub const fn newest(limit: usize) -> Self {
        Self {
            min_id: None,
            max_id: None,
            limit,
        }
    }

    /// The page right after `max_id`, going back in time
    pub fn older_than(max_id: impl Into<String>, limit: usize) -> Self {
        Self {
            max_id: Some(max_id.into()),
            ..Self::newest(limit)
        }
    }

    /// The page right before `min_id`, going forward in time
    pub fn newer_than(min_id: impl Into<String>, limit: usize) -> Self {
        Self {
            min_id: Some(min_id.into()),
            ..Self::newest(limit)
        }
    }
}

/// One fetched page with the cursors the server advertised
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Statuses, newest first
    pub items: Vec<Status>,
    /// Cursor for older content (`rel="next"`)
    pub next: Option<String>,
    /// Cursor for newer content (`rel="prev"`)
    pub prev: Option<String>,
}

/// Fetches timeline pages for an account
pub trait TimelineFetcher: Send + Sync {
    /// Fetch one page of `timeline` as seen by `account`
    fn fetch_page(
        &self,
        account: &Account,
        timeline: &TimelineId,
        request: &PageRequest,
    ) -> impl Future<Output = Result<Page, FetchError>> + Send;
}
