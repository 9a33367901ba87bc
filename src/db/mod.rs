//! Database module for `SQLite` storage (accounts, timeline cache, remote keys)
//!
//! The cache and key stores are plain functions over a [`Connection`] so
//! callers can run them inside one [`Transaction`] and commit cursor and
//! cache changes together.

pub mod remote_keys;
pub mod timeline;

use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::Path;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::models::Account;
use crate::paths;

/// Database connection wrapper
pub struct Database {
    conn: Connection,
}

const ACCOUNT_COLUMNS: &str = "id, handle, server, access_token, display_name, avatar_url,
     always_open_spoiler, always_show_sensitive_media, is_active, created_at, last_used_at";

impl Database {
    /// Open or create the database at the default location
    pub fn open() -> anyhow::Result<Self> {
        let path = Self::default_path()?;
        Self::open_path(&path).with_context(|| format!("Failed to open {}", path.display()))
    }

    /// Open or create the database at a specific path
    pub fn open_path(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;

        Ok(db)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.init()?;
        Ok(db)
    }

    /// Get the default database path
    pub fn default_path() -> anyhow::Result<PathBuf> {
        paths::database_path()
    }

    /// Initialize the database schema
    fn init(&self) -> StorageResult<()> {
        self.conn.execute_batch(
            r"
            -- Signed-in accounts
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                handle TEXT NOT NULL,
                server TEXT NOT NULL,
                access_token TEXT NOT NULL,
                display_name TEXT NOT NULL,
                avatar_url TEXT,
                always_open_spoiler INTEGER NOT NULL DEFAULT 0,
                always_show_sensitive_media INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                last_used_at TEXT,
                UNIQUE(handle, server)
            );

            -- Cached statuses with their sticky UI flags
            CREATE TABLE IF NOT EXISTS timeline_statuses (
                account_id TEXT NOT NULL,
                timeline_id TEXT NOT NULL,
                server_id TEXT NOT NULL,
                author_id TEXT NOT NULL,
                reblog_author_id TEXT,
                status_json TEXT NOT NULL,
                expanded INTEGER NOT NULL DEFAULT 0,
                content_showing INTEGER NOT NULL DEFAULT 0,
                content_collapsed INTEGER NOT NULL DEFAULT 1,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (account_id, timeline_id, server_id)
            );

            -- Authors referenced by cached statuses (including boosted ones)
            CREATE TABLE IF NOT EXISTS timeline_accounts (
                account_id TEXT NOT NULL,
                server_id TEXT NOT NULL,
                username TEXT NOT NULL,
                acct TEXT NOT NULL,
                display_name TEXT NOT NULL,
                avatar TEXT,
                url TEXT,
                PRIMARY KEY (account_id, server_id)
            );

            -- Pagination cursors per timeline
            CREATE TABLE IF NOT EXISTS remote_keys (
                account_id TEXT NOT NULL,
                timeline_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                key TEXT,
                PRIMARY KEY (account_id, timeline_id, kind)
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_timeline_statuses_server_id
                ON timeline_statuses(account_id, server_id);
            ",
        )?;

        Ok(())
    }

    /// Shared connection for reads
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Start a transaction; dropping it without commit rolls back
    pub fn transaction(&mut self) -> StorageResult<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }

    // ==================== Accounts ====================

    /// Insert a new account
    pub fn insert_account(&self, account: &Account) -> StorageResult<()> {
        self.conn.execute(
            r"INSERT INTO accounts (id, handle, server, access_token, display_name, avatar_url,
                                    always_open_spoiler, always_show_sensitive_media, is_active,
                                    created_at, last_used_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                account.id.to_string(),
                account.handle,
                account.server,
                account.access_token,
                account.display_name,
                account.avatar_url,
                account.always_open_spoiler,
                account.always_show_sensitive_media,
                account.is_active,
                account.created_at.to_rfc3339(),
                account.last_used_at.map(|dt| dt.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Get all accounts
    pub fn get_accounts(&self) -> StorageResult<Vec<Account>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY server, handle"
        ))?;

        let accounts = stmt.query_map([], Self::row_to_account)?;
        accounts.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Get an account by id
    pub fn get_account(&self, id: Uuid) -> StorageResult<Option<Account>> {
        self.conn
            .query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
                params![id.to_string()],
                Self::row_to_account,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Find an account by handle (`alice`, `@alice@example.social`)
    pub fn find_account(&self, handle: &str) -> StorageResult<Option<Account>> {
        Ok(self
            .get_accounts()?
            .into_iter()
            .find(|account| account.matches_handle(handle)))
    }

    /// The account commands act on: the active one, else the first one
    pub fn active_account(&self) -> StorageResult<Option<Account>> {
        let accounts = self.get_accounts()?;
        let active = accounts.iter().position(|a| a.is_active).unwrap_or(0);
        Ok(accounts.into_iter().nth(active))
    }

    /// Make an account the active one
    pub fn set_active_account(&self, id: Uuid) -> StorageResult<()> {
        if self.get_account(id)?.is_none() {
            return Err(StorageError::NotFound {
                entity: "account",
                id: id.to_string(),
            });
        }
        self.conn.execute(
            "UPDATE accounts
             SET is_active = (id = ?1),
                 last_used_at = CASE WHEN id = ?1 THEN ?2 ELSE last_used_at END",
            params![id.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Update the display preferences used for new cache entries
    pub fn update_account_preferences(
        &self,
        id: Uuid,
        always_open_spoiler: bool,
        always_show_sensitive_media: bool,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE accounts SET always_open_spoiler = ?2, always_show_sensitive_media = ?3 WHERE id = ?1",
            params![id.to_string(), always_open_spoiler, always_show_sensitive_media],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound {
                entity: "account",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Delete an account together with its cached timelines and cursors
    pub fn delete_account(&mut self, id: Uuid) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        timeline::clear_account(&tx, id)?;
        remote_keys::clear_account(&tx, id)?;
        tx.execute("DELETE FROM accounts WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;
        Ok(())
    }

    /// Helper to convert a row to `Account`
    fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
        Ok(Account {
            id: parse_uuid(row, 0)?,
            handle: row.get(1)?,
            server: row.get(2)?,
            access_token: row.get(3)?,
            display_name: row.get(4)?,
            avatar_url: row.get(5)?,
            always_open_spoiler: row.get(6)?,
            always_show_sensitive_media: row.get(7)?,
            is_active: row.get(8)?,
            created_at: parse_time(row, 9)?,
            last_used_at: row
                .get::<_, Option<String>>(10)?
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        })
    }
}

fn parse_uuid(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_time(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
