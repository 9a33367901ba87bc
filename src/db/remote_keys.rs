//! Remote key store: one pagination cursor per (account, timeline, kind)

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::error::StorageResult;
use crate::models::{RemoteKeyKind, TimelineId};

/// Stored cursor, `None` when missing or explicitly cleared
pub fn get(
    conn: &Connection,
    account_id: Uuid,
    timeline: &TimelineId,
    kind: RemoteKeyKind,
) -> StorageResult<Option<String>> {
    let key = conn
        .query_row(
            "SELECT key FROM remote_keys WHERE account_id = ?1 AND timeline_id = ?2 AND kind = ?3",
            params![account_id.to_string(), timeline.key(), kind.as_str()],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?;
    Ok(key.flatten())
}

/// Upsert a cursor; `None` is stored as NULL
pub fn put(
    conn: &Connection,
    account_id: Uuid,
    timeline: &TimelineId,
    kind: RemoteKeyKind,
    key: Option<&str>,
) -> StorageResult<()> {
    conn.execute(
        r"INSERT INTO remote_keys (account_id, timeline_id, kind, key)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(account_id, timeline_id, kind) DO UPDATE SET key = excluded.key",
        params![account_id.to_string(), timeline.key(), kind.as_str(), key],
    )?;
    Ok(())
}

/// Forget every cursor of one timeline
pub fn clear(conn: &Connection, account_id: Uuid, timeline: &TimelineId) -> StorageResult<()> {
    conn.execute(
        "DELETE FROM remote_keys WHERE account_id = ?1 AND timeline_id = ?2",
        params![account_id.to_string(), timeline.key()],
    )?;
    Ok(())
}

/// Forget every cursor of an account
pub fn clear_account(conn: &Connection, account_id: Uuid) -> StorageResult<()> {
    conn.execute(
        "DELETE FROM remote_keys WHERE account_id = ?1",
        params![account_id.to_string()],
    )?;
    Ok(())
}
