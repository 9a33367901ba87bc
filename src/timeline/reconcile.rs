//! Range-replace reconciliation of a fetched page against the cache
//!
//! A fetched page is authoritative for the id range it spans: every cached
//! status in `[min, max]` is deleted and the page is inserted in its place,
//! which also prunes statuses the server has since deleted. Client-local UI
//! flags are not part of the server's answer, so they are read before the
//! delete and merged back onto the fetched statuses.

use std::collections::HashMap;

use crate::api::Page;
use crate::db::{Database, remote_keys, timeline};
use crate::error::StorageResult;
use crate::models::{
    Account, LoadType, RemoteKeyKind, Status, StatusId, TimelineEntry, TimelineId, UiState,
    id_range,
};

/// Cursor writes committed together with a page.
///
/// The outer `Option` says whether to touch the key at all; the inner one is
/// the value written (`None` stores NULL).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorUpdate {
    /// New NEXT cursor
    pub next: Option<Option<String>>,
    /// New PREV cursor
    pub prev: Option<Option<String>>,
    /// New REFRESH anchor
    pub refresh: Option<Option<String>>,
}

impl CursorUpdate {
    /// Cursor writes for a non-empty page loaded in direction `load`
    pub fn for_load(load: LoadType, page: &Page) -> Self {
        match load {
            LoadType::Refresh => Self {
                next: Some(page.next.clone()),
                prev: Some(page.prev.clone()),
                refresh: Some(
                    page.items
                        .iter()
                        .map(|s| &s.id)
                        .max()
                        .map(|id| id.as_str().to_string()),
                ),
            },
            // A missing link is often transient; keep the stored cursor
            LoadType::Append => Self {
                next: page.next.clone().map(Some),
                ..Self::default()
            },
            LoadType::Prepend => Self {
                prev: page.prev.clone().map(Some),
                ..Self::default()
            },
        }
    }

    fn writes(&self) -> impl Iterator<Item = (RemoteKeyKind, Option<&str>)> {
        [
            (RemoteKeyKind::Next, &self.next),
            (RemoteKeyKind::Prev, &self.prev),
            (RemoteKeyKind::Refresh, &self.refresh),
        ]
        .into_iter()
        .filter_map(|(kind, value)| value.as_ref().map(|v| (kind, v.as_deref())))
    }
}

/// What a range-replace did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceStats {
    /// Cached rows deleted from the covered range
    pub removed: usize,
    /// Rows inserted from the page
    pub inserted: usize,
    /// Inserted rows whose UI state came from the cache
    pub carried_over: usize,
}

/// Join fetched statuses with the locally-owned UI state overlay.
///
/// Statuses already known keep their flags; new ones get the account's
/// defaults.
pub fn merge_ui_state(
    account: &Account,
    timeline: &TimelineId,
    fetched: Vec<Status>,
    existing: &HashMap<StatusId, UiState>,
) -> Vec<TimelineEntry> {
    fetched
        .into_iter()
        .map(|status| {
            let ui = existing
                .get(&status.id)
                .copied()
                .unwrap_or_else(|| UiState::defaults_for(account, &status));
            TimelineEntry {
                account_id: account.id,
                timeline: timeline.clone(),
                status,
                ui,
            }
        })
        .collect()
}

/// Replace the cached range spanned by `items` and write `cursors`, all in
/// one transaction. Any error rolls everything back.
pub fn replace_range(
    db: &mut Database,
    account: &Account,
    timeline_id: &TimelineId,
    items: Vec<Status>,
    cursors: &CursorUpdate,
) -> StorageResult<ReplaceStats> {
    let Some((low, high)) = id_range(items.iter().map(|s| &s.id)) else {
        return Ok(ReplaceStats::default());
    };
    let ids: Vec<StatusId> = items.iter().map(|s| s.id.clone()).collect();

    let tx = db.transaction()?;

    let existing = timeline::find_existing(&tx, account.id, timeline_id, &ids)?;
    let removed = timeline::delete_range(&tx, account.id, timeline_id, &low, &high)?;

    timeline::upsert_authors(&tx, account.id, &items)?;
    let carried_over = ids.iter().filter(|id| existing.contains_key(id)).count();
    let entries = merge_ui_state(account, timeline_id, items, &existing);
    timeline::upsert_entries(&tx, &entries)?;

    for (kind, key) in cursors.writes() {
        remote_keys::put(&tx, account.id, timeline_id, kind, key)?;
    }

    tx.commit()?;

    Ok(ReplaceStats {
        removed,
        inserted: entries.len(),
        carried_over,
    })
}
