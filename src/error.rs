//! Error types for fetching, storage and timeline loads

use thiserror::Error;

use crate::models::TimelineId;

/// Result alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Failure talking to the server
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, TLS or timeout failure
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with a non-2xx status
    #[error("server returned {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// Response did not have the expected shape
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// HTTP status code, if the server answered
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether retrying later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Malformed(_) => false,
        }
    }

    /// Whether the access token was rejected
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Http { status: 401 | 403, .. })
    }
}

/// Failure reading or writing the local cache
#[derive(Debug, Error)]
pub enum StorageError {
    /// `SQLite` error
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Cached payload could not be (de)serialized
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Blocking storage task panicked or was aborted
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Directory creation or other filesystem failure
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound {
        /// What kind of record
        entity: &'static str,
        /// The identifier looked up
        id: String,
    },
}

/// Failure of a timeline load
#[derive(Debug, Error)]
pub enum LoadError {
    /// The fetch failed; nothing was written
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The commit failed; cache and cursors are unchanged
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Another load for the same timeline is running
    #[error("a load for {timeline} is already in progress")]
    Busy {
        /// The contended timeline
        timeline: TimelineId,
    },
}

impl From<rusqlite::Error> for LoadError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.into())
    }
}
