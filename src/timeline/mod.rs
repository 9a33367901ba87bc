//! Timeline sync engine
//!
//! Drives REFRESH / PREPEND / APPEND loads for a timeline, reconciles each
//! fetched page against the local cache and keeps the pagination cursors in
//! step with it.
//!
//! At most one load runs per (account, timeline); further loads queue behind
//! it in arrival order. Loads of different timelines run in parallel and only
//! meet at the database lock. The fetch may be cancelled by dropping the
//! future; the commit runs on a blocking task that owns the timeline slot,
//! so once started it always finishes and always signals.
//!
//! Removing an account waits for every running load of that account and
//! rejects later ones, so nothing is written back for a deleted account.

pub mod reconcile;

#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard, broadcast};
use uuid::Uuid;

use crate::api::{PageRequest, TimelineFetcher};
use crate::db::{Database, remote_keys, timeline};
use crate::error::{LoadError, StorageError, StorageResult};
use crate::models::{
    Account, LoadType, RemoteKeyKind, StatusId, TimelineEntry, TimelineId, UiStateChange,
};

use reconcile::{CursorUpdate, ReplaceStats};

/// Capacity of the invalidation channel; slow subscribers see `Lagged`
const INVALIDATION_CAPACITY: usize = 64;

/// Result of a successful load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    /// No more pages in the requested direction
    pub exhausted: bool,
    /// Statuses returned by the server
    pub fetched: usize,
    /// What the commit did, zero when nothing was written
    pub stats: ReplaceStats,
}

impl LoadOutcome {
    const fn exhausted() -> Self {
        Self {
            exhausted: true,
            fetched: 0,
            stats: ReplaceStats {
                removed: 0,
                inserted: 0,
                carried_over: 0,
            },
        }
    }
}

/// Why cached reads of a timeline went stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    /// A page was committed
    Replaced(LoadType),
    /// Paging in this direction reached the end
    Exhausted(LoadType),
    /// A user toggled display flags
    UiStateChanged,
    /// Old entries were trimmed
    Trimmed,
    /// Cached entries were dropped by a reset or account removal
    Cleared,
}

/// Signal that previously read snapshots must be re-queried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    /// Affected account
    pub account_id: Uuid,
    /// Affected timeline, `None` for every timeline of the account
    pub timeline: Option<TimelineId>,
    /// What happened
    pub reason: InvalidationReason,
}

type SlotKey = (Uuid, TimelineId);

/// Orchestrates paginated loads and cache reconciliation
pub struct TimelineSyncEngine<F> {
    db: Arc<Mutex<Database>>,
    fetcher: F,
    page_size: usize,
    slots: std::sync::Mutex<HashMap<SlotKey, Arc<Mutex<()>>>>,
    removed: std::sync::Mutex<HashSet<Uuid>>,
    invalidations: broadcast::Sender<Invalidation>,
}

impl<F: TimelineFetcher> TimelineSyncEngine<F> {
    /// Create an engine owning `db`
    pub fn new(db: Database, fetcher: F, page_size: usize) -> Self {
        Self::with_shared(Arc::new(Mutex::new(db)), fetcher, page_size)
    }

    /// Create an engine over a database shared with other components
    pub fn with_shared(db: Arc<Mutex<Database>>, fetcher: F, page_size: usize) -> Self {
        let (invalidations, _) = broadcast::channel(INVALIDATION_CAPACITY);
        Self {
            db,
            fetcher,
            page_size: page_size.max(1),
            slots: std::sync::Mutex::new(HashMap::new()),
            removed: std::sync::Mutex::new(HashSet::new()),
            invalidations,
        }
    }

    /// Shared database handle
    pub fn database(&self) -> Arc<Mutex<Database>> {
        Arc::clone(&self.db)
    }

    /// Subscribe to cache invalidation signals
    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.invalidations.subscribe()
    }

    /// Load a page, waiting for any running load of the same timeline first
    pub async fn load(
        &self,
        account: &Account,
        timeline: &TimelineId,
        load: LoadType,
        anchor: Option<StatusId>,
    ) -> Result<LoadOutcome, LoadError> {
        let guard = self.slot(account.id, timeline).lock_owned().await;
        self.run_load(guard, account, timeline, load, anchor).await
    }

    /// Load a page, or fail with [`LoadError::Busy`] if one is already running
    pub async fn try_load(
        &self,
        account: &Account,
        timeline: &TimelineId,
        load: LoadType,
        anchor: Option<StatusId>,
    ) -> Result<LoadOutcome, LoadError> {
        let guard = self
            .slot(account.id, timeline)
            .try_lock_owned()
            .map_err(|_| LoadError::Busy {
                timeline: timeline.clone(),
            })?;
        self.run_load(guard, account, timeline, load, anchor).await
    }

    /// Whether a load of this timeline is in flight
    pub fn is_loading(&self, account_id: Uuid, timeline: &TimelineId) -> bool {
        self.slot(account_id, timeline).try_lock().is_err()
    }

    async fn run_load(
        &self,
        guard: OwnedMutexGuard<()>,
        account: &Account,
        timeline: &TimelineId,
        load: LoadType,
        anchor: Option<StatusId>,
    ) -> Result<LoadOutcome, LoadError> {
        // Checked while holding the slot, which account removal also takes
        if self.is_removed(account.id) {
            return Err(StorageError::NotFound {
                entity: "account",
                id: account.id.to_string(),
            }
            .into());
        }

        let request = match load {
            LoadType::Refresh => match anchor {
                Some(anchor) => PageRequest::newer_than(anchor.into_inner(), self.page_size),
                None => PageRequest::newest(self.page_size),
            },
            LoadType::Append => {
                match self.remote_key(account.id, timeline, RemoteKeyKind::Next).await? {
                    Some(cursor) => PageRequest::older_than(cursor, self.page_size),
                    None => {
                        tracing::debug!("{timeline} append for @{}: no next cursor", account.handle);
                        return Ok(LoadOutcome::exhausted());
                    }
                }
            }
            LoadType::Prepend => {
                match self.remote_key(account.id, timeline, RemoteKeyKind::Prev).await? {
                    Some(cursor) => PageRequest::newer_than(cursor, self.page_size),
                    None => {
                        tracing::debug!("{timeline} prepend for @{}: no prev cursor", account.handle);
                        return Ok(LoadOutcome::exhausted());
                    }
                }
            }
        };

        tracing::debug!(
            "{load} {timeline} for @{} (min_id={:?}, max_id={:?})",
            account.handle,
            request.min_id,
            request.max_id
        );

        let page = match self.fetcher.fetch_page(account, timeline, &request).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("{load} {timeline} for @{} failed: {e}", account.handle);
                return Err(e.into());
            }
        };

        let fetched = page.items.len();
        if fetched == 0 {
            return Ok(match load {
                // No new data, not the end of the feed
                LoadType::Refresh => LoadOutcome::default(),
                LoadType::Append | LoadType::Prepend => {
                    tracing::debug!("{load} {timeline} for @{}: exhausted", account.handle);
                    self.notify(account.id, Some(timeline), InvalidationReason::Exhausted(load));
                    LoadOutcome::exhausted()
                }
            });
        }

        let cursors = CursorUpdate::for_load(load, &page);
        let db = Arc::clone(&self.db);
        let invalidations = self.invalidations.clone();
        let owner = account.clone();
        let target = timeline.clone();

        // The task outlives a dropped caller, so it signals on its own
        let stats = tokio::task::spawn_blocking(move || {
            let _slot = guard;
            let mut db = db.blocking_lock();
            let stats = reconcile::replace_range(&mut db, &owner, &target, page.items, &cursors)?;
            drop(db);
            send(
                &invalidations,
                owner.id,
                Some(&target),
                InvalidationReason::Replaced(load),
            );
            Ok::<_, StorageError>(stats)
        })
        .await
        .map_err(StorageError::from)?;

        let stats = match stats {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!("{load} {timeline} for @{}: commit failed: {e}", account.handle);
                return Err(e.into());
            }
        };

        tracing::info!(
            "{load} {timeline} for @{}: {fetched} fetched, {} replaced, {} kept ui state",
            account.handle,
            stats.removed,
            stats.carried_over
        );

        Ok(LoadOutcome {
            exhausted: false,
            fetched,
            stats,
        })
    }

    /// Cached entries of a timeline, newest first
    pub async fn cached(
        &self,
        account_id: Uuid,
        timeline: &TimelineId,
        limit: usize,
    ) -> StorageResult<Vec<TimelineEntry>> {
        let db = self.db.lock().await;
        timeline::entries(db.connection(), account_id, timeline, limit)
    }

    /// Number of cached entries in a timeline
    pub async fn cached_count(&self, account_id: Uuid, timeline: &TimelineId) -> StorageResult<usize> {
        let db = self.db.lock().await;
        timeline::count(db.connection(), account_id, timeline)
    }

    /// Stored pagination cursor
    pub async fn remote_key(
        &self,
        account_id: Uuid,
        timeline: &TimelineId,
        kind: RemoteKeyKind,
    ) -> StorageResult<Option<String>> {
        let db = self.db.lock().await;
        remote_keys::get(db.connection(), account_id, timeline, kind)
    }

    /// Advisory anchor for the next refresh (newest status of the last one)
    pub async fn refresh_anchor(
        &self,
        account_id: Uuid,
        timeline: &TimelineId,
    ) -> StorageResult<Option<StatusId>> {
        Ok(self
            .remote_key(account_id, timeline, RemoteKeyKind::Refresh)
            .await?
            .map(StatusId::new))
    }

    /// Record a user toggle on every cached copy of a status
    pub async fn set_ui_state(
        &self,
        account_id: Uuid,
        status_id: &StatusId,
        change: UiStateChange,
    ) -> StorageResult<usize> {
        let (updated, touched) = {
            let mut db = self.db.lock().await;
            let tx = db.transaction()?;
            let touched = timeline::timelines_containing(&tx, account_id, status_id)?;
            let updated = timeline::set_ui_state(&tx, account_id, status_id, change)?;
            tx.commit()?;
            (updated, touched)
        };
        if updated == 0 {
            return Err(StorageError::NotFound {
                entity: "cached status",
                id: status_id.to_string(),
            });
        }
        for timeline_id in &touched {
            self.notify(account_id, Some(timeline_id), InvalidationReason::UiStateChanged);
        }
        Ok(updated)
    }

    /// Keep the newest `keep` statuses of a timeline.
    ///
    /// The NEXT cursor moves to the new oldest status so appends resume
    /// right below what is still cached.
    pub async fn cleanup(
        &self,
        account_id: Uuid,
        timeline_id: &TimelineId,
        keep: usize,
    ) -> StorageResult<usize> {
        let _slot = self.slot(account_id, timeline_id).lock_owned().await;

        let removed = {
            let mut db = self.db.lock().await;
            let tx = db.transaction()?;
            let removed = timeline::trim(&tx, account_id, timeline_id, keep)?;
            if removed > 0 {
                let oldest = timeline::oldest(&tx, account_id, timeline_id)?;
                remote_keys::put(
                    &tx,
                    account_id,
                    timeline_id,
                    RemoteKeyKind::Next,
                    oldest.as_ref().map(StatusId::as_str),
                )?;
                timeline::delete_orphan_authors(&tx, account_id)?;
            }
            tx.commit()?;
            removed
        };

        if removed > 0 {
            tracing::info!("Trimmed {removed} cached statuses from {timeline_id}");
            self.notify(account_id, Some(timeline_id), InvalidationReason::Trimmed);
        }
        Ok(removed)
    }

    /// Drop a cached timeline and its cursors so the next refresh starts over
    pub async fn reset(&self, account_id: Uuid, timeline_id: &TimelineId) -> StorageResult<usize> {
        let _slot = self.slot(account_id, timeline_id).lock_owned().await;

        let removed = {
            let mut db = self.db.lock().await;
            let tx = db.transaction()?;
            let removed = timeline::clear_timeline(&tx, account_id, timeline_id)?;
            remote_keys::clear(&tx, account_id, timeline_id)?;
            tx.commit()?;
            removed
        };

        tracing::info!("Reset {timeline_id}: dropped {removed} cached statuses");
        self.notify(account_id, Some(timeline_id), InvalidationReason::Cleared);
        Ok(removed)
    }

    /// Remove an account and everything cached for it.
    ///
    /// Waits for the account's running loads to finish; loads started or
    /// queued afterwards fail with [`StorageError::NotFound`].
    pub async fn remove_account(&self, account_id: Uuid) -> StorageResult<()> {
        self.removed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account_id);

        let held: Vec<Arc<Mutex<()>>> = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|((owner, _), _)| *owner == account_id)
            .map(|(_, slot)| Arc::clone(slot))
            .collect();
        let mut guards = Vec::with_capacity(held.len());
        for slot in held {
            guards.push(slot.lock_owned().await);
        }

        self.db.lock().await.delete_account(account_id)?;
        drop(guards);

        tracing::info!("Removed account {account_id} and its cache");
        self.notify(account_id, None, InvalidationReason::Cleared);
        Ok(())
    }

    fn is_removed(&self, account_id: Uuid) -> bool {
        self.removed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&account_id)
    }

    fn slot(&self, account_id: Uuid, timeline: &TimelineId) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            slots
                .entry((account_id, timeline.clone()))
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    fn notify(&self, account_id: Uuid, timeline: Option<&TimelineId>, reason: InvalidationReason) {
        send(&self.invalidations, account_id, timeline, reason);
    }
}

fn send(
    invalidations: &broadcast::Sender<Invalidation>,
    account_id: Uuid,
    timeline: Option<&TimelineId>,
    reason: InvalidationReason,
) {
    // No subscribers is fine
    let _ = invalidations.send(Invalidation {
        account_id,
        timeline: timeline.cloned(),
        reason,
    });
}
