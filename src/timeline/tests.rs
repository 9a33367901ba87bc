use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;
use std::sync::Arc;

use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

use super::*;
use crate::api::Page;
use crate::error::FetchError;
use crate::models::status::fixtures::{range, status};
use crate::models::{Status, UiState};

/// Fetcher that replays scripted pages and records every request
#[derive(Default)]
struct ScriptedFetcher {
    pages: StdMutex<VecDeque<Result<Page, FetchError>>>,
    requests: StdMutex<Vec<PageRequest>>,
    /// Signalled when a fetch starts
    entered: Arc<Notify>,
    /// When set, the next fetch waits for it before answering
    gate: StdMutex<Option<Arc<Notify>>>,
}

impl ScriptedFetcher {
    fn with_pages(pages: Vec<Result<Page, FetchError>>) -> Self {
        Self {
            pages: StdMutex::new(pages.into()),
            ..Self::default()
        }
    }

    fn gated(self, gate: Arc<Notify>) -> Self {
        *self.gate.lock().unwrap() = Some(gate);
        self
    }

    fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl TimelineFetcher for ScriptedFetcher {
    async fn fetch_page(
        &self,
        _account: &Account,
        _timeline: &TimelineId,
        request: &PageRequest,
    ) -> Result<Page, FetchError> {
        self.requests.lock().unwrap().push(request.clone());
        self.entered.notify_one();

        let answer = self
            .pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Page::default()));

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        answer
    }
}

fn page(items: Vec<Status>, next: Option<&str>, prev: Option<&str>) -> Result<Page, FetchError> {
    Ok(Page {
        items,
        next: next.map(str::to_string),
        prev: prev.map(str::to_string),
    })
}

fn engine(pages: Vec<Result<Page, FetchError>>) -> TimelineSyncEngine<ScriptedFetcher> {
    TimelineSyncEngine::new(
        Database::open_in_memory().unwrap(),
        ScriptedFetcher::with_pages(pages),
        40,
    )
}

fn account() -> Account {
    Account::new("alice", "https://example.social", "token")
}

async fn cached_ids(
    engine: &TimelineSyncEngine<ScriptedFetcher>,
    account: &Account,
) -> Vec<String> {
    engine
        .cached(account.id, &TimelineId::Home, 1000)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.status.id.into_inner())
        .collect()
}

async fn key(
    engine: &TimelineSyncEngine<ScriptedFetcher>,
    account: &Account,
    kind: RemoteKeyKind,
) -> Option<String> {
    engine
        .remote_key(account.id, &TimelineId::Home, kind)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_refresh_then_append_scenario() {
    let engine = engine(vec![
        page(range(90, 100), Some("80"), None),
        page(range(70, 79), Some("60"), None),
    ]);
    let account = account();
    let home = TimelineId::Home;

    let outcome = engine
        .load(&account, &home, LoadType::Refresh, None)
        .await
        .unwrap();
    assert!(!outcome.exhausted);
    assert_eq!(outcome.fetched, 11);
    assert_eq!(cached_ids(&engine, &account).await.len(), 11);
    assert_eq!(key(&engine, &account, RemoteKeyKind::Next).await.as_deref(), Some("80"));
    assert_eq!(key(&engine, &account, RemoteKeyKind::Prev).await, None);

    let outcome = engine
        .load(&account, &home, LoadType::Append, None)
        .await
        .unwrap();
    assert!(!outcome.exhausted);

    let ids = cached_ids(&engine, &account).await;
    assert_eq!(ids.len(), 21);
    assert_eq!(ids.first().map(String::as_str), Some("100"));
    assert_eq!(ids.last().map(String::as_str), Some("70"));
    assert_eq!(key(&engine, &account, RemoteKeyKind::Next).await.as_deref(), Some("60"));

    let requests = engine.fetcher.requests();
    assert_eq!(requests[0], PageRequest::newest(40));
    assert_eq!(requests[1], PageRequest::older_than("80", 40));
}

#[tokio::test]
async fn test_reconciliation_is_idempotent() {
    let engine = engine(vec![
        page(range(90, 100), Some("80"), None),
        page(range(90, 100), Some("80"), None),
    ]);
    let account = account();

    engine
        .load(&account, &TimelineId::Home, LoadType::Refresh, None)
        .await
        .unwrap();
    let first = engine.cached(account.id, &TimelineId::Home, 1000).await.unwrap();

    let outcome = engine
        .load(&account, &TimelineId::Home, LoadType::Refresh, None)
        .await
        .unwrap();
    let second = engine.cached(account.id, &TimelineId::Home, 1000).await.unwrap();

    assert_eq!(outcome.stats.removed, 11);
    assert_eq!(outcome.stats.carried_over, 11);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_ui_state_survives_refetch() {
    let engine = engine(vec![
        page(range(90, 100), Some("80"), None),
        page(range(85, 96), Some("75"), None),
    ]);
    let account = account();

    engine
        .load(&account, &TimelineId::Home, LoadType::Refresh, None)
        .await
        .unwrap();
    engine
        .set_ui_state(account.id, &StatusId::from("95"), UiStateChange::Expanded(true))
        .await
        .unwrap();

    engine
        .load(&account, &TimelineId::Home, LoadType::Refresh, None)
        .await
        .unwrap();

    let entries = engine.cached(account.id, &TimelineId::Home, 1000).await.unwrap();
    let refetched = entries.iter().find(|e| e.id().as_str() == "95").unwrap();
    assert!(refetched.ui.expanded);

    let fresh = entries.iter().find(|e| e.id().as_str() == "85").unwrap();
    assert!(!fresh.ui.expanded);
    assert!(fresh.ui.content_collapsed);
}

#[tokio::test]
async fn test_new_entries_use_account_preferences() {
    let mut sensitive = status("5");
    sensitive.sensitive = true;
    let engine = engine(vec![page(vec![sensitive], None, None)]);
    let mut account = account();
    account.always_open_spoiler = true;
    account.always_show_sensitive_media = true;

    engine
        .load(&account, &TimelineId::Home, LoadType::Refresh, None)
        .await
        .unwrap();

    let entries = engine.cached(account.id, &TimelineId::Home, 10).await.unwrap();
    assert_eq!(
        entries[0].ui,
        UiState {
            expanded: true,
            content_showing: true,
            content_collapsed: true,
        }
    );
}

#[tokio::test]
async fn test_range_replace_is_bounded() {
    let engine = engine(vec![page(range(50, 100), None, None)]);
    let account = account();
    {
        let db = engine.database();
        let db = db.lock().await;
        let seeded: Vec<TimelineEntry> = ["10", "75", "200"]
            .into_iter()
            .map(|id| TimelineEntry {
                account_id: account.id,
                timeline: TimelineId::Home,
                status: status(id),
                ui: UiState::default(),
            })
            .collect();
        timeline::upsert_entries(db.connection(), &seeded).unwrap();
    }

    engine
        .load(&account, &TimelineId::Home, LoadType::Refresh, None)
        .await
        .unwrap();

    let ids = cached_ids(&engine, &account).await;
    assert_eq!(ids.len(), 53);
    assert!(ids.contains(&"200".to_string()));
    assert!(ids.contains(&"10".to_string()));
}

#[tokio::test]
async fn test_server_deletions_are_pruned() {
    let mut without_95 = range(90, 100);
    without_95.retain(|s| s.id.as_str() != "95");
    let engine = engine(vec![
        page(range(90, 100), Some("80"), None),
        page(without_95, Some("80"), None),
    ]);
    let account = account();

    for _ in 0..2 {
        engine
            .load(&account, &TimelineId::Home, LoadType::Refresh, None)
            .await
            .unwrap();
    }

    let ids = cached_ids(&engine, &account).await;
    assert_eq!(ids.len(), 10);
    assert!(!ids.contains(&"95".to_string()));
}

#[tokio::test]
async fn test_append_without_cursor_is_exhausted_without_fetch() {
    let engine = engine(vec![page(range(1, 5), None, None)]);
    let account = account();

    let outcome = engine
        .load(&account, &TimelineId::Home, LoadType::Append, None)
        .await
        .unwrap();

    assert!(outcome.exhausted);
    assert!(engine.fetcher.requests().is_empty());

    let outcome = engine
        .load(&account, &TimelineId::Home, LoadType::Prepend, None)
        .await
        .unwrap();
    assert!(outcome.exhausted);
    assert!(engine.fetcher.requests().is_empty());
}

#[tokio::test]
async fn test_append_without_next_link_keeps_cursor() {
    let engine = engine(vec![
        page(range(90, 100), Some("80"), Some("100")),
        page(range(70, 79), None, None),
    ]);
    let account = account();

    engine
        .load(&account, &TimelineId::Home, LoadType::Refresh, None)
        .await
        .unwrap();
    engine
        .load(&account, &TimelineId::Home, LoadType::Append, None)
        .await
        .unwrap();

    assert_eq!(cached_ids(&engine, &account).await.len(), 21);
    assert_eq!(key(&engine, &account, RemoteKeyKind::Next).await.as_deref(), Some("80"));
    assert_eq!(key(&engine, &account, RemoteKeyKind::Prev).await.as_deref(), Some("100"));
}

#[tokio::test]
async fn test_empty_append_signals_exhaustion() {
    let engine = engine(vec![
        page(range(90, 100), Some("80"), None),
        page(Vec::new(), None, None),
    ]);
    let account = account();
    let mut invalidations = engine.subscribe();

    engine
        .load(&account, &TimelineId::Home, LoadType::Refresh, None)
        .await
        .unwrap();
    let outcome = engine
        .load(&account, &TimelineId::Home, LoadType::Append, None)
        .await
        .unwrap();

    assert!(outcome.exhausted);
    assert_eq!(cached_ids(&engine, &account).await.len(), 11);
    assert_eq!(key(&engine, &account, RemoteKeyKind::Next).await.as_deref(), Some("80"));

    let first = invalidations.recv().await.unwrap();
    assert_eq!(first.reason, InvalidationReason::Replaced(LoadType::Refresh));
    let second = invalidations.recv().await.unwrap();
    assert_eq!(second.reason, InvalidationReason::Exhausted(LoadType::Append));
    assert_eq!(second.timeline, Some(TimelineId::Home));
}

#[tokio::test]
async fn test_empty_refresh_is_not_exhausted() {
    let engine = engine(vec![
        page(range(90, 100), Some("80"), Some("100")),
        page(Vec::new(), None, None),
    ]);
    let account = account();

    engine
        .load(&account, &TimelineId::Home, LoadType::Refresh, None)
        .await
        .unwrap();
    let outcome = engine
        .load(&account, &TimelineId::Home, LoadType::Refresh, None)
        .await
        .unwrap();

    assert!(!outcome.exhausted);
    assert_eq!(outcome.fetched, 0);
    assert_eq!(cached_ids(&engine, &account).await.len(), 11);
    assert_eq!(key(&engine, &account, RemoteKeyKind::Next).await.as_deref(), Some("80"));
    assert_eq!(key(&engine, &account, RemoteKeyKind::Prev).await.as_deref(), Some("100"));
}

#[tokio::test]
async fn test_refresh_with_anchor_and_prepend() {
    let engine = engine(vec![
        page(range(90, 100), Some("90"), Some("100")),
        page(range(101, 110), Some("101"), Some("110")),
    ]);
    let account = account();

    engine
        .load(&account, &TimelineId::Home, LoadType::Refresh, Some(StatusId::from("89")))
        .await
        .unwrap();
    assert_eq!(
        engine.refresh_anchor(account.id, &TimelineId::Home).await.unwrap(),
        Some(StatusId::from("100"))
    );

    engine
        .load(&account, &TimelineId::Home, LoadType::Prepend, None)
        .await
        .unwrap();

    let requests = engine.fetcher.requests();
    assert_eq!(requests[0], PageRequest::newer_than("89", 40));
    assert_eq!(requests[1], PageRequest::newer_than("100", 40));

    assert_eq!(cached_ids(&engine, &account).await.len(), 21);
    assert_eq!(key(&engine, &account, RemoteKeyKind::Prev).await.as_deref(), Some("110"));
    // Prepend never moves the older boundary
    assert_eq!(key(&engine, &account, RemoteKeyKind::Next).await.as_deref(), Some("90"));
}

#[tokio::test]
async fn test_fetch_error_leaves_state_untouched() {
    let engine = engine(vec![
        page(range(90, 100), Some("80"), None),
        Err(FetchError::Http {
            status: 401,
            body: "unauthorized".to_string(),
        }),
    ]);
    let account = account();

    assert_ok!(
        engine
            .load(&account, &TimelineId::Home, LoadType::Refresh, None)
            .await
    );
    let result = engine
        .load(&account, &TimelineId::Home, LoadType::Append, None)
        .await;

    match assert_err!(result) {
        LoadError::Fetch(e) => assert!(e.is_unauthorized()),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(cached_ids(&engine, &account).await.len(), 11);
    assert_eq!(key(&engine, &account, RemoteKeyKind::Next).await.as_deref(), Some("80"));
}

#[tokio::test]
async fn test_storage_failure_rolls_back_everything() {
    let engine = engine(vec![
        page(range(90, 100), Some("80"), None),
        page(range(88, 100), Some("70"), Some("100")),
    ]);
    let account = account();

    engine
        .load(&account, &TimelineId::Home, LoadType::Refresh, None)
        .await
        .unwrap();
    engine
        .set_ui_state(account.id, &StatusId::from("95"), UiStateChange::Expanded(true))
        .await
        .unwrap();
    let before = engine.cached(account.id, &TimelineId::Home, 1000).await.unwrap();

    // Fails inserts after the range delete already ran in the transaction
    engine
        .database()
        .lock()
        .await
        .connection()
        .execute_batch(
            "CREATE TRIGGER fail_insert BEFORE INSERT ON timeline_statuses
             WHEN NEW.server_id = '95'
             BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
        )
        .unwrap();

    let result = engine
        .load(&account, &TimelineId::Home, LoadType::Refresh, None)
        .await;
    assert!(matches!(result, Err(LoadError::Storage(_))));

    let after = engine.cached(account.id, &TimelineId::Home, 1000).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(key(&engine, &account, RemoteKeyKind::Next).await.as_deref(), Some("80"));
    assert_eq!(key(&engine, &account, RemoteKeyKind::Prev).await, None);
    assert_eq!(
        engine.refresh_anchor(account.id, &TimelineId::Home).await.unwrap(),
        Some(StatusId::from("100"))
    );
}

#[tokio::test]
async fn test_try_load_rejects_concurrent_load() {
    let gate = Arc::new(Notify::new());
    let fetcher = ScriptedFetcher::with_pages(vec![page(range(90, 100), Some("80"), None)])
        .gated(Arc::clone(&gate));
    let entered = Arc::clone(&fetcher.entered);
    let engine = Arc::new(TimelineSyncEngine::new(
        Database::open_in_memory().unwrap(),
        fetcher,
        40,
    ));
    let account = account();

    let running = {
        let engine = Arc::clone(&engine);
        let account = account.clone();
        tokio::spawn(async move {
            engine
                .load(&account, &TimelineId::Home, LoadType::Refresh, None)
                .await
        })
    };
    entered.notified().await;

    assert!(engine.is_loading(account.id, &TimelineId::Home));
    let busy = engine
        .try_load(&account, &TimelineId::Home, LoadType::Append, None)
        .await;
    assert!(matches!(busy, Err(LoadError::Busy { .. })));

    // Other timelines are not blocked
    assert!(!engine.is_loading(account.id, &TimelineId::Local));
    let local = engine
        .try_load(&account, &TimelineId::Local, LoadType::Refresh, None)
        .await
        .unwrap();
    assert_eq!(local.fetched, 0);

    gate.notify_one();
    assert_eq!(running.await.unwrap().unwrap().fetched, 11);
    assert!(!engine.is_loading(account.id, &TimelineId::Home));
}

#[tokio::test]
async fn test_queued_loads_run_in_order() {
    let gate = Arc::new(Notify::new());
    let fetcher = ScriptedFetcher::with_pages(vec![
        page(range(90, 100), Some("80"), None),
        page(range(70, 79), Some("60"), None),
    ])
    .gated(Arc::clone(&gate));
    let entered = Arc::clone(&fetcher.entered);
    let engine = Arc::new(TimelineSyncEngine::new(
        Database::open_in_memory().unwrap(),
        fetcher,
        40,
    ));
    let account = account();

    let spawn_load = |load: LoadType| {
        let engine = Arc::clone(&engine);
        let account = account.clone();
        tokio::spawn(async move { engine.load(&account, &TimelineId::Home, load, None).await })
    };

    let refresh = spawn_load(LoadType::Refresh);
    entered.notified().await;
    let append = spawn_load(LoadType::Append);

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    // The append waits for the refresh instead of reading a missing cursor
    assert_eq!(engine.fetcher.requests().len(), 1);

    gate.notify_one();
    refresh.await.unwrap().unwrap();
    let outcome = append.await.unwrap().unwrap();

    assert!(!outcome.exhausted);
    assert_eq!(
        engine.fetcher.requests()[1],
        PageRequest::older_than("80", 40)
    );
    assert_eq!(cached_ids(&engine, &account).await.len(), 21);
}

#[tokio::test]
async fn test_cancelled_fetch_writes_nothing() {
    let gate = Arc::new(Notify::new());
    let fetcher = ScriptedFetcher::with_pages(vec![
        page(range(90, 100), Some("80"), None),
        page(range(90, 100), Some("80"), None),
    ])
    .gated(Arc::clone(&gate));
    let entered = Arc::clone(&fetcher.entered);
    let engine = Arc::new(TimelineSyncEngine::new(
        Database::open_in_memory().unwrap(),
        fetcher,
        40,
    ));
    let account = account();

    let running = {
        let engine = Arc::clone(&engine);
        let account = account.clone();
        tokio::spawn(async move {
            engine
                .load(&account, &TimelineId::Home, LoadType::Refresh, None)
                .await
        })
    };
    entered.notified().await;
    running.abort();
    assert!(running.await.unwrap_err().is_cancelled());

    assert!(cached_ids(&engine, &account).await.is_empty());
    assert_eq!(key(&engine, &account, RemoteKeyKind::Next).await, None);

    // The slot was released
    let outcome = engine
        .try_load(&account, &TimelineId::Home, LoadType::Refresh, None)
        .await
        .unwrap();
    assert_eq!(outcome.fetched, 11);
}

#[tokio::test]
async fn test_cleanup_moves_next_cursor() {
    let engine = engine(vec![page(range(90, 100), Some("89"), None)]);
    let account = account();

    engine
        .load(&account, &TimelineId::Home, LoadType::Refresh, None)
        .await
        .unwrap();
    let mut invalidations = engine.subscribe();

    let removed = engine.cleanup(account.id, &TimelineId::Home, 5).await.unwrap();

    assert_eq!(removed, 6);
    assert_eq!(cached_ids(&engine, &account).await, vec!["100", "99", "98", "97", "96"]);
    assert_eq!(key(&engine, &account, RemoteKeyKind::Next).await.as_deref(), Some("96"));
    assert_eq!(
        invalidations.recv().await.unwrap().reason,
        InvalidationReason::Trimmed
    );

    assert_eq!(engine.cleanup(account.id, &TimelineId::Home, 5).await.unwrap(), 0);
}

#[tokio::test]
async fn test_set_ui_state_on_unknown_status() {
    let engine = engine(Vec::new());
    let result = engine
        .set_ui_state(Uuid::new_v4(), &StatusId::from("1"), UiStateChange::Expanded(true))
        .await;
    assert!(matches!(result, Err(StorageError::NotFound { .. })));
}

#[tokio::test]
async fn test_remove_account_clears_cache_and_cursors() {
    let engine = engine(vec![page(range(90, 100), Some("80"), None)]);
    let account = account();
    engine.database().lock().await.insert_account(&account).unwrap();

    engine
        .load(&account, &TimelineId::Home, LoadType::Refresh, None)
        .await
        .unwrap();
    engine.remove_account(account.id).await.unwrap();

    assert!(cached_ids(&engine, &account).await.is_empty());
    assert_eq!(key(&engine, &account, RemoteKeyKind::Next).await, None);
    assert!(engine.database().lock().await.get_account(account.id).unwrap().is_none());
}

#[tokio::test]
async fn test_remove_account_waits_for_running_load() {
    let gate = Arc::new(Notify::new());
    let fetcher = ScriptedFetcher::with_pages(vec![page(range(90, 100), Some("80"), None)])
        .gated(Arc::clone(&gate));
    let entered = Arc::clone(&fetcher.entered);
    let engine = Arc::new(TimelineSyncEngine::new(
        Database::open_in_memory().unwrap(),
        fetcher,
        40,
    ));
    let account = account();
    engine.database().lock().await.insert_account(&account).unwrap();

    let running = {
        let engine = Arc::clone(&engine);
        let account = account.clone();
        tokio::spawn(async move {
            engine
                .load(&account, &TimelineId::Home, LoadType::Refresh, None)
                .await
        })
    };
    entered.notified().await;

    let removing = {
        let engine = Arc::clone(&engine);
        let account_id = account.id;
        tokio::spawn(async move { engine.remove_account(account_id).await })
    };
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!removing.is_finished());
    assert!(engine.is_loading(account.id, &TimelineId::Home));

    gate.notify_one();
    assert_eq!(running.await.unwrap().unwrap().fetched, 11);
    removing.await.unwrap().unwrap();

    assert!(!engine.is_loading(account.id, &TimelineId::Home));
    assert!(cached_ids(&engine, &account).await.is_empty());
    assert_eq!(key(&engine, &account, RemoteKeyKind::Next).await, None);
    assert!(engine.database().lock().await.get_account(account.id).unwrap().is_none());

    // Later loads for the removed account are refused before fetching
    let result = engine
        .load(&account, &TimelineId::Home, LoadType::Refresh, None)
        .await;
    assert!(matches!(
        result,
        Err(LoadError::Storage(StorageError::NotFound { entity: "account", .. }))
    ));
    assert_eq!(engine.fetcher.requests().len(), 1);
    assert!(cached_ids(&engine, &account).await.is_empty());
}

#[tokio::test]
async fn test_commit_finishes_and_signals_after_caller_drops() {
    let engine = Arc::new(engine(vec![page(range(90, 100), Some("80"), None)]));
    let entered = Arc::clone(&engine.fetcher.entered);
    let account = account();
    let mut invalidations = engine.subscribe();

    // Keep the commit waiting on the database while the caller goes away
    let db = engine.database();
    let held = db.lock().await;

    let running = {
        let engine = Arc::clone(&engine);
        let account = account.clone();
        tokio::spawn(async move {
            engine
                .load(&account, &TimelineId::Home, LoadType::Refresh, None)
                .await
        })
    };
    entered.notified().await;
    running.abort();
    assert!(running.await.unwrap_err().is_cancelled());
    drop(held);

    let signal = invalidations.recv().await.unwrap();
    assert_eq!(signal.reason, InvalidationReason::Replaced(LoadType::Refresh));
    assert_eq!(signal.timeline, Some(TimelineId::Home));

    assert_eq!(cached_ids(&engine, &account).await.len(), 11);
    assert_eq!(key(&engine, &account, RemoteKeyKind::Next).await.as_deref(), Some("80"));
}

#[tokio::test]
async fn test_ui_toggle_signals_each_timeline_holding_the_status() {
    let engine = engine(vec![page(range(90, 100), Some("80"), None)]);
    let account = account();
    engine
        .load(&account, &TimelineId::Home, LoadType::Refresh, None)
        .await
        .unwrap();
    {
        let db = engine.database();
        let db = db.lock().await;
        let copy = TimelineEntry {
            account_id: account.id,
            timeline: TimelineId::Local,
            status: status("95"),
            ui: UiState::default(),
        };
        timeline::upsert_entries(db.connection(), &[copy]).unwrap();
    }
    let mut invalidations = engine.subscribe();

    let updated = engine
        .set_ui_state(account.id, &StatusId::from("95"), UiStateChange::Expanded(true))
        .await
        .unwrap();
    assert_eq!(updated, 2);

    let mut touched = Vec::new();
    for _ in 0..2 {
        let signal = invalidations.recv().await.unwrap();
        assert_eq!(signal.reason, InvalidationReason::UiStateChanged);
        touched.push(signal.timeline);
    }
    assert_eq!(touched, vec![Some(TimelineId::Home), Some(TimelineId::Local)]);

    engine
        .set_ui_state(account.id, &StatusId::from("91"), UiStateChange::ContentShowing(false))
        .await
        .unwrap();
    assert_eq!(
        invalidations.recv().await.unwrap().timeline,
        Some(TimelineId::Home)
    );
    assert!(invalidations.try_recv().is_err());
}

#[tokio::test]
async fn test_reset_drops_one_timeline_and_its_cursors() {
    let engine = engine(vec![
        page(range(90, 100), Some("80"), Some("100")),
        page(range(50, 60), Some("40"), None),
    ]);
    let account = account();
    engine
        .load(&account, &TimelineId::Home, LoadType::Refresh, None)
        .await
        .unwrap();
    engine
        .load(&account, &TimelineId::Local, LoadType::Refresh, None)
        .await
        .unwrap();
    let mut invalidations = engine.subscribe();

    let removed = engine.reset(account.id, &TimelineId::Home).await.unwrap();

    assert_eq!(removed, 11);
    assert!(cached_ids(&engine, &account).await.is_empty());
    assert_eq!(key(&engine, &account, RemoteKeyKind::Next).await, None);
    assert_eq!(key(&engine, &account, RemoteKeyKind::Prev).await, None);
    assert_eq!(
        engine.refresh_anchor(account.id, &TimelineId::Home).await.unwrap(),
        None
    );
    assert_eq!(engine.cached_count(account.id, &TimelineId::Local).await.unwrap(), 11);

    let signal = invalidations.recv().await.unwrap();
    assert_eq!(signal.reason, InvalidationReason::Cleared);
    assert_eq!(signal.timeline, Some(TimelineId::Home));
}
