//! Background sync module for timeline refresh

use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior, interval};

use crate::api::TimelineFetcher;
use crate::error::{LoadError, StorageResult};
use crate::models::{Account, LoadType, TimelineId};
use crate::timeline::TimelineSyncEngine;

/// Summary of one pass over all accounts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Accounts whose timeline was refreshed
    pub refreshed: usize,
    /// Accounts whose refresh failed
    pub failed: usize,
    /// Accounts skipped because a load was already running
    pub skipped: usize,
    /// Statuses fetched in total
    pub fetched: usize,
    /// Statuses trimmed by cleanup afterwards
    pub trimmed: usize,
}

/// Sync manager for background timeline updates
pub struct SyncManager<F> {
    engine: Arc<TimelineSyncEngine<F>>,
    timeline: TimelineId,
    cache_limit: Option<usize>,
}

impl<F: TimelineFetcher> SyncManager<F> {
    /// Create a sync manager refreshing `timeline` for every account
    pub fn new(engine: Arc<TimelineSyncEngine<F>>, timeline: TimelineId) -> Self {
        Self {
            engine,
            timeline,
            cache_limit: None,
        }
    }

    /// Trim each timeline to `limit` statuses after refreshing it
    pub fn with_cache_limit(mut self, limit: usize) -> Self {
        self.cache_limit = Some(limit);
        self
    }

    async fn accounts(&self) -> StorageResult<Vec<Account>> {
        self.engine.database().lock().await.get_accounts()
    }

    /// Refresh all timelines once
    pub async fn refresh_all(&self) -> StorageResult<SyncReport> {
        let mut report = SyncReport::default();

        for account in self.accounts().await? {
            if self.engine.is_loading(account.id, &self.timeline) {
                tracing::debug!("Skipping @{}: load already running", account.handle);
                report.skipped += 1;
                continue;
            }

            match self.refresh_account(&account).await {
                Ok(fetched) => {
                    report.refreshed += 1;
                    report.fetched += fetched;
                }
                // Lost the race with a load that started after the check
                Err(LoadError::Busy { .. }) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!("Failed to refresh {}: {}", account.full_handle(), e);
                    continue;
                }
            }

            if let Some(limit) = self.cache_limit {
                match self.engine.cleanup(account.id, &self.timeline, limit).await {
                    Ok(trimmed) => report.trimmed += trimmed,
                    Err(e) => tracing::warn!("Cleanup for {} failed: {}", account.full_handle(), e),
                }
            }
        }

        Ok(report)
    }

    /// Refresh a single account's timeline
    async fn refresh_account(&self, account: &Account) -> Result<usize, LoadError> {
        let outcome = self
            .engine
            .try_load(account, &self.timeline, LoadType::Refresh, None)
            .await?;
        Ok(outcome.fetched)
    }

    /// Start a background refresh loop
    pub async fn start_background_refresh(self: Arc<Self>, interval_secs: u64) {
        if interval_secs == 0 {
            return; // Manual refresh only
        }

        let mut interval = interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            match self.refresh_all().await {
                Ok(report) => tracing::info!(
                    "Background refresh: {} accounts, {} statuses, {} failed",
                    report.refreshed,
                    report.fetched,
                    report.failed
                ),
                Err(e) => tracing::error!("Background refresh failed: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Page, PageRequest};
    use crate::db::Database;
    use crate::error::FetchError;
    use crate::models::status::fixtures::range;
    use tokio::sync::Notify;

    /// Fails for one server, serves ten statuses for the rest
    struct FlakyFetcher {
        broken_server: String,
        /// (release, entered): announce each fetch, then wait to be released
        hold: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    impl TimelineFetcher for FlakyFetcher {
        async fn fetch_page(
            &self,
            account: &Account,
            _timeline: &TimelineId,
            _request: &PageRequest,
        ) -> Result<Page, FetchError> {
            if let Some((release, entered)) = &self.hold {
                entered.notify_one();
                release.notified().await;
            }
            if account.server == self.broken_server {
                return Err(FetchError::Http {
                    status: 503,
                    body: "maintenance".to_string(),
                });
            }
            Ok(Page {
                items: range(1, 10),
                next: Some("1".to_string()),
                prev: None,
            })
        }
    }

    fn manager(accounts: &[Account]) -> SyncManager<FlakyFetcher> {
        let db = Database::open_in_memory().unwrap();
        for account in accounts {
            db.insert_account(account).unwrap();
        }
        let fetcher = FlakyFetcher {
            broken_server: "https://down.example".to_string(),
            hold: None,
        };
        SyncManager::new(
            Arc::new(TimelineSyncEngine::new(db, fetcher, 40)),
            TimelineId::Home,
        )
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_others() {
        let alice = Account::new("alice", "https://example.social", "t1");
        let bob = Account::new("bob", "https://down.example", "t2");
        let carol = Account::new("carol", "https://other.example", "t3");
        let manager = manager(&[alice.clone(), bob, carol.clone()]);

        let report = manager.refresh_all().await.unwrap();

        assert_eq!(report.refreshed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.fetched, 20);
        for account in [alice, carol] {
            let cached = manager
                .engine
                .cached(account.id, &TimelineId::Home, 100)
                .await
                .unwrap();
            assert_eq!(cached.len(), 10);
        }
    }

    #[tokio::test]
    async fn test_cache_limit_trims_after_refresh() {
        let alice = Account::new("alice", "https://example.social", "t1");
        let manager = manager(std::slice::from_ref(&alice)).with_cache_limit(4);

        let report = manager.refresh_all().await.unwrap();

        assert_eq!(report.trimmed, 6);
        let cached = manager
            .engine
            .cached(alice.id, &TimelineId::Home, 100)
            .await
            .unwrap();
        assert_eq!(cached.len(), 4);
    }

    #[tokio::test]
    async fn test_busy_timeline_is_skipped() {
        let alice = Account::new("alice", "https://example.social", "t1");
        let mut manager = manager(std::slice::from_ref(&alice));
        let hold = Arc::new(Notify::new());
        let entered = Arc::new(Notify::new());
        let fetcher = FlakyFetcher {
            broken_server: String::new(),
            hold: Some((Arc::clone(&hold), Arc::clone(&entered))),
        };
        manager.engine = Arc::new(TimelineSyncEngine::with_shared(
            manager.engine.database(),
            fetcher,
            40,
        ));

        let running = {
            let engine = Arc::clone(&manager.engine);
            let alice = alice.clone();
            tokio::spawn(async move {
                engine
                    .load(&alice, &TimelineId::Home, LoadType::Refresh, None)
                    .await
            })
        };
        entered.notified().await;

        let report = manager.refresh_all().await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.refreshed, 0);

        hold.notify_one();
        assert_eq!(running.await.unwrap().unwrap().fetched, 10);
    }

    #[tokio::test]
    async fn test_zero_interval_returns_immediately() {
        let manager = Arc::new(manager(&[]));
        manager.start_background_refresh(0).await;
    }
}
