//! # Roost
//!
//! An offline-first Mastodon timeline cache with cursor-paginated sync.
//!
//! ## Overview
//!
//! Roost keeps a local `SQLite` copy of your Mastodon timelines. Pages are
//! fetched newest-first and reconciled into the cache with a range-replace:
//! the fetched page is authoritative for the id range it covers, while
//! client-side flags (opened content warnings, revealed media) survive every
//! refetch. Pagination cursors from the `Link` header are committed in the
//! same transaction as the statuses they belong to.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CLI  /  SyncManager                      │
//! │   refresh · more · newer · show · expand · cleanup · watch  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TimelineSyncEngine                       │
//! │  one load per timeline · cursors · range-replace · signals  │
//! └─────────────────────────────────────────────────────────────┘
//!          │                                       │
//!          ▼                                       ▼
//! ┌─────────────────┐                     ┌─────────────────┐
//! │       API       │                     │    Database     │
//! │                 │                     │                 │
//! │ • Fetcher trait │                     │ • Accounts      │
//! │ • Mastodon REST │                     │ • Status cache  │
//! │ • Link headers  │                     │ • Remote keys   │
//! │ • OAuth         │                     │                 │
//! └─────────────────┘                     └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`api`]: Timeline fetch contract and the Mastodon client
//! - [`config`]: Configuration management
//! - [`db`]: `SQLite` database for accounts, cached statuses, cursors
//! - [`error`]: Fetch, storage and load errors
//! - [`models`]: Data models (Status, Account, TimelineId, UI state)
//! - [`sync`]: Refresh of every account, once or periodically
//! - [`timeline`]: The sync engine and reconciliation
//!
//! ## Example
//!
//! ```no_run
//! use roost::api::mastodon::MastodonClient;
//! use roost::{Database, LoadType, TimelineId, TimelineSyncEngine};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let db = Database::open()?;
//! let Some(account) = db.active_account()? else {
//!     return Ok(());
//! };
//! let engine = TimelineSyncEngine::new(db, MastodonClient::new(), 40);
//!
//! engine.load(&account, &TimelineId::Home, LoadType::Refresh, None).await?;
//! let outcome = engine.load(&account, &TimelineId::Home, LoadType::Append, None).await?;
//! println!("end of timeline: {}", outcome.exhausted);
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/roost/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![allow(clippy::unused_async)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::if_not_else)]
#![allow(clippy::single_match_else)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::trivially_copy_pass_by_ref)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::use_self)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::similar_names)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::return_self_not_must_use)]

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod paths;
pub mod sync;
pub mod timeline;

// Re-export main types for convenience
pub use config::Config;
pub use db::Database;
pub use error::{FetchError, LoadError, StorageError};
pub use models::{
    Account, LoadType, RemoteKeyKind, Status, StatusId, TimelineEntry, TimelineId, UiState,
    UiStateChange,
};
pub use sync::SyncManager;
pub use timeline::{Invalidation, InvalidationReason, LoadOutcome, TimelineSyncEngine};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
