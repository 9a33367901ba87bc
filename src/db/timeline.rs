//! Timeline cache store: cached statuses, their UI flags and referenced authors
//!
//! Ids are ordered by length first, then lexicographically, so every range
//! and ordering query below compares `length(server_id)` before the text.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::error::StorageResult;
use crate::models::{Author, Status, StatusId, TimelineEntry, TimelineId, UiState, UiStateChange};

/// Upper bound on bound parameters per `IN (...)` lookup
const LOOKUP_CHUNK: usize = 500;

/// Delete every cached status of one timeline whose id lies in `[low, high]`
pub fn delete_range(
    conn: &Connection,
    account_id: Uuid,
    timeline: &TimelineId,
    low: &StatusId,
    high: &StatusId,
) -> StorageResult<usize> {
    let count = conn.execute(
        r"DELETE FROM timeline_statuses
           WHERE account_id = ?1 AND timeline_id = ?2
             AND (length(server_id) > length(?3)
                  OR (length(server_id) = length(?3) AND server_id >= ?3))
             AND (length(server_id) < length(?4)
                  OR (length(server_id) = length(?4) AND server_id <= ?4))",
        params![
            account_id.to_string(),
            timeline.key(),
            low.as_str(),
            high.as_str()
        ],
    )?;
    Ok(count)
}

/// UI state of already-cached statuses among `ids`.
///
/// Looks across every timeline of the account; when a status is cached in
/// several timelines the row from `timeline` wins.
pub fn find_existing(
    conn: &Connection,
    account_id: Uuid,
    timeline: &TimelineId,
    ids: &[StatusId],
) -> StorageResult<HashMap<StatusId, UiState>> {
    let mut found = HashMap::with_capacity(ids.len());

    for chunk in ids.chunks(LOOKUP_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "SELECT server_id, expanded, content_showing, content_collapsed
             FROM timeline_statuses
             WHERE account_id = ? AND server_id IN ({placeholders})
             ORDER BY timeline_id = ? ASC"
        );

        let mut values = Vec::with_capacity(chunk.len() + 2);
        values.push(account_id.to_string());
        values.extend(chunk.iter().map(|id| id.as_str().to_string()));
        values.push(timeline.key());

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), |row| {
            Ok((
                StatusId::new(row.get::<_, String>(0)?),
                UiState {
                    expanded: row.get(1)?,
                    content_showing: row.get(2)?,
                    content_collapsed: row.get(3)?,
                },
            ))
        })?;

        // Rows of the requested timeline come last and overwrite the others
        for row in rows {
            let (id, ui) = row?;
            found.insert(id, ui);
        }
    }

    Ok(found)
}

/// Insert or replace cached entries
pub fn upsert_entries(conn: &Connection, entries: &[TimelineEntry]) -> StorageResult<()> {
    let cached_at = Utc::now().to_rfc3339();
    let mut stmt = conn.prepare_cached(
        r"INSERT OR REPLACE INTO timeline_statuses
           (account_id, timeline_id, server_id, author_id, reblog_author_id, status_json,
            expanded, content_showing, content_collapsed, cached_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;

    for entry in entries {
        let status_json = serde_json::to_string(&entry.status)?;
        stmt.execute(params![
            entry.account_id.to_string(),
            entry.timeline.key(),
            entry.status.id.as_str(),
            entry.status.author.id,
            entry.status.reblog.as_ref().map(|r| r.author.id.as_str()),
            status_json,
            entry.ui.expanded,
            entry.ui.content_showing,
            entry.ui.content_collapsed,
            cached_at,
        ])?;
    }

    Ok(())
}

/// Store the authors referenced by `statuses`, one row per author id
pub fn upsert_authors(
    conn: &Connection,
    account_id: Uuid,
    statuses: &[Status],
) -> StorageResult<usize> {
    let authors: BTreeMap<&str, &Author> = statuses
        .iter()
        .flat_map(Status::authors)
        .map(|author| (author.id.as_str(), author))
        .collect();

    let mut stmt = conn.prepare_cached(
        r"INSERT OR REPLACE INTO timeline_accounts
           (account_id, server_id, username, acct, display_name, avatar, url)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;

    for author in authors.values() {
        stmt.execute(params![
            account_id.to_string(),
            author.id,
            author.username,
            author.acct,
            author.display_name,
            author.avatar,
            author.url,
        ])?;
    }

    Ok(authors.len())
}

/// Timelines of an account that hold a cached copy of `status_id`
pub fn timelines_containing(
    conn: &Connection,
    account_id: Uuid,
    status_id: &StatusId,
) -> StorageResult<Vec<TimelineId>> {
    let mut stmt = conn.prepare_cached(
        "SELECT DISTINCT timeline_id FROM timeline_statuses
         WHERE account_id = ?1 AND server_id = ?2
         ORDER BY timeline_id",
    )?;
    let keys = stmt.query_map(params![account_id.to_string(), status_id.as_str()], |row| {
        row.get::<_, String>(0)
    })?;

    let mut timelines = Vec::new();
    for key in keys {
        let key = key?;
        match TimelineId::parse(&key) {
            Some(timeline) => timelines.push(timeline),
            None => tracing::warn!("Skipping unknown timeline key '{key}'"),
        }
    }
    Ok(timelines)
}

/// Cached entries of one timeline, newest first
pub fn entries(
    conn: &Connection,
    account_id: Uuid,
    timeline: &TimelineId,
    limit: usize,
) -> StorageResult<Vec<TimelineEntry>> {
    let mut stmt = conn.prepare(
        r"SELECT status_json, expanded, content_showing, content_collapsed
           FROM timeline_statuses
           WHERE account_id = ?1 AND timeline_id = ?2
           ORDER BY length(server_id) DESC, server_id DESC
           LIMIT ?3",
    )?;

    let rows = stmt.query_map(
        params![account_id.to_string(), timeline.key(), limit as i64],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                UiState {
                    expanded: row.get(1)?,
                    content_showing: row.get(2)?,
                    content_collapsed: row.get(3)?,
                },
            ))
        },
    )?;

    let mut entries = Vec::new();
    for row in rows {
        let (json, ui) = row?;
        entries.push(TimelineEntry {
            account_id,
            timeline: timeline.clone(),
            status: serde_json::from_str(&json)?,
            ui,
        });
    }
    Ok(entries)
}

/// Number of cached statuses in one timeline
pub fn count(conn: &Connection, account_id: Uuid, timeline: &TimelineId) -> StorageResult<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM timeline_statuses WHERE account_id = ?1 AND timeline_id = ?2",
        params![account_id.to_string(), timeline.key()],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Oldest cached status id of one timeline
pub fn oldest(
    conn: &Connection,
    account_id: Uuid,
    timeline: &TimelineId,
) -> StorageResult<Option<StatusId>> {
    conn.query_row(
        r"SELECT server_id FROM timeline_statuses
           WHERE account_id = ?1 AND timeline_id = ?2
           ORDER BY length(server_id) ASC, server_id ASC
           LIMIT 1",
        params![account_id.to_string(), timeline.key()],
        |row| row.get::<_, String>(0),
    )
    .optional()
    .map(|id| id.map(StatusId::new))
    .map_err(Into::into)
}

/// Apply a user toggle to every cached copy of a status
pub fn set_ui_state(
    conn: &Connection,
    account_id: Uuid,
    status_id: &StatusId,
    change: UiStateChange,
) -> StorageResult<usize> {
    let (sql, value) = match change {
        UiStateChange::Expanded(v) => (
            "UPDATE timeline_statuses SET expanded = ?3 WHERE account_id = ?1 AND server_id = ?2",
            v,
        ),
        UiStateChange::ContentShowing(v) => (
            "UPDATE timeline_statuses SET content_showing = ?3 WHERE account_id = ?1 AND server_id = ?2",
            v,
        ),
        UiStateChange::ContentCollapsed(v) => (
            "UPDATE timeline_statuses SET content_collapsed = ?3 WHERE account_id = ?1 AND server_id = ?2",
            v,
        ),
    };
    let updated = conn.execute(
        sql,
        params![account_id.to_string(), status_id.as_str(), value],
    )?;
    Ok(updated)
}

/// Keep only the newest `keep` statuses of a timeline; returns rows removed
pub fn trim(
    conn: &Connection,
    account_id: Uuid,
    timeline: &TimelineId,
    keep: usize,
) -> StorageResult<usize> {
    let removed = conn.execute(
        r"DELETE FROM timeline_statuses
           WHERE account_id = ?1 AND timeline_id = ?2
             AND server_id NOT IN (
                 SELECT server_id FROM timeline_statuses
                 WHERE account_id = ?1 AND timeline_id = ?2
                 ORDER BY length(server_id) DESC, server_id DESC
                 LIMIT ?3)",
        params![account_id.to_string(), timeline.key(), keep as i64],
    )?;
    Ok(removed)
}

/// Drop author rows no cached status refers to
pub fn delete_orphan_authors(conn: &Connection, account_id: Uuid) -> StorageResult<usize> {
    let removed = conn.execute(
        r"DELETE FROM timeline_accounts
           WHERE account_id = ?1
             AND server_id NOT IN (
                 SELECT author_id FROM timeline_statuses WHERE account_id = ?1
                 UNION
                 SELECT reblog_author_id FROM timeline_statuses
                 WHERE account_id = ?1 AND reblog_author_id IS NOT NULL)",
        params![account_id.to_string()],
    )?;
    Ok(removed)
}

/// Remove one cached timeline
pub fn clear_timeline(
    conn: &Connection,
    account_id: Uuid,
    timeline: &TimelineId,
) -> StorageResult<usize> {
    let removed = conn.execute(
        "DELETE FROM timeline_statuses WHERE account_id = ?1 AND timeline_id = ?2",
        params![account_id.to_string(), timeline.key()],
    )?;
    delete_orphan_authors(conn, account_id)?;
    Ok(removed)
}

/// Remove everything cached for an account
pub fn clear_account(conn: &Connection, account_id: Uuid) -> StorageResult<()> {
    conn.execute(
        "DELETE FROM timeline_statuses WHERE account_id = ?1",
        params![account_id.to_string()],
    )?;
    conn.execute(
        "DELETE FROM timeline_accounts WHERE account_id = ?1",
        params![account_id.to_string()],
    )?;
    Ok(())
}
