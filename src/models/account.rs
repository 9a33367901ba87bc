//! Account model for signed-in Mastodon accounts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A signed-in account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Local identifier, scopes every cached row
    pub id: Uuid,
    /// Handle/username (e.g., user or user@mastodon.social)
    pub handle: String,
    /// Server URL (e.g., `https://mastodon.social`)
    pub server: String,
    /// OAuth bearer token
    #[serde(skip_serializing, default)]
    pub access_token: String,
    /// Display name (for UI)
    pub display_name: String,
    /// Avatar URL (cached)
    pub avatar_url: Option<String>,
    /// Expand content warnings by default
    pub always_open_spoiler: bool,
    /// Reveal sensitive media by default
    pub always_show_sensitive_media: bool,
    /// Whether this is the account commands act on
    pub is_active: bool,
    /// When the account was added
    pub created_at: DateTime<Utc>,
    /// Last used timestamp
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Create a new account
    pub fn new(handle: &str, server: &str, access_token: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            handle: handle.to_string(),
            server: server.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            display_name: handle.to_string(),
            avatar_url: None,
            always_open_spoiler: false,
            always_show_sensitive_media: false,
            is_active: false,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }

    /// Server host without scheme
    pub fn domain(&self) -> &str {
        self.server
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
    }

    /// Get the full handle with instance
    pub fn full_handle(&self) -> String {
        if self.handle.contains('@') {
            format!("@{}", self.handle.trim_start_matches('@'))
        } else {
            format!("@{}@{}", self.handle, self.domain())
        }
    }

    /// Whether `query` names this account (`alice`, `@alice@host`, ...)
    pub fn matches_handle(&self, query: &str) -> bool {
        let query = query.trim_start_matches('@');
        query.eq_ignore_ascii_case(&self.handle)
            || query.eq_ignore_ascii_case(self.full_handle().trim_start_matches('@'))
    }
}
