//! Status payload as cached locally

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StatusId;

/// A status (post) as returned by the server and stored in the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Server-assigned id
    pub id: StatusId,
    /// URL to the status on the web
    pub url: Option<String>,
    /// Who wrote (or boosted) it
    pub author: Author,
    /// Content as HTML
    pub content: String,
    /// Content warning, empty when none
    #[serde(default)]
    pub spoiler_text: String,
    /// Whether media is marked sensitive
    #[serde(default)]
    pub sensitive: bool,
    /// Visibility (public, unlisted, private, direct)
    #[serde(default)]
    pub visibility: String,
    /// When the status was created
    pub created_at: DateTime<Utc>,
    /// Number of favourites
    #[serde(default)]
    pub favourites_count: u32,
    /// Number of boosts
    #[serde(default)]
    pub reblogs_count: u32,
    /// Number of replies
    #[serde(default)]
    pub replies_count: u32,
    /// Whether the viewing account favourited it
    #[serde(default)]
    pub favourited: bool,
    /// Whether the viewing account boosted it
    #[serde(default)]
    pub reblogged: bool,
    /// Whether the viewing account bookmarked it
    #[serde(default)]
    pub bookmarked: bool,
    /// Parent status id when this is a reply
    pub in_reply_to_id: Option<String>,
    /// Media attachments
    #[serde(default)]
    pub media: Vec<MediaAttachment>,
    /// The boosted status, when this status is a boost
    pub reblog: Option<Box<Status>>,
}

/// Author of a status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Server-assigned account id
    pub id: String,
    /// Local username
    pub username: String,
    /// `user` for local accounts, `user@domain` for remote ones
    pub acct: String,
    /// Display name
    pub display_name: String,
    /// Avatar URL
    pub avatar: Option<String>,
    /// Profile URL
    pub url: Option<String>,
}

impl Author {
    /// Display name, falling back to the username when blank
    pub fn name(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.username
        } else {
            &self.display_name
        }
    }
}

/// Media attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    /// Media URL
    pub url: String,
    /// Preview/thumbnail URL
    pub preview_url: Option<String>,
    /// Media type
    pub media_type: MediaType,
    /// Alt text description
    pub alt_text: Option<String>,
}

/// Media type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Image (JPEG, PNG, GIF, WebP)
    Image,
    /// Video (MP4, WebM)
    Video,
    /// Animated GIF served as video
    Gifv,
    /// Audio file
    Audio,
    /// Unknown or unsupported media type
    Unknown,
}

impl MediaType {
    /// Map the wire `type` field
    pub fn from_wire(s: &str) -> Self {
        match s {
            "image" => Self::Image,
            "video" => Self::Video,
            "gifv" => Self::Gifv,
            "audio" => Self::Audio,
            _ => Self::Unknown,
        }
    }
}

impl Status {
    /// The status the user interacts with: the boosted one for boosts
    pub fn actionable(&self) -> &Status {
        self.reblog.as_deref().unwrap_or(self)
    }

    /// Whether a content warning hides the body
    pub fn has_spoiler(&self) -> bool {
        !self.actionable().spoiler_text.trim().is_empty()
    }

    /// Authors referenced by this status, booster first
    pub fn authors(&self) -> impl Iterator<Item = &Author> {
        std::iter::once(&self.author).chain(self.reblog.as_deref().map(|r| &r.author))
    }

    /// Content with HTML stripped (for terminal display)
    pub fn plain_text(&self) -> String {
        strip_html(&self.actionable().content)
    }

    /// Get a short preview of the content (for list display)
    pub fn preview(&self, max_len: usize) -> String {
        let content = self.plain_text().replace('\n', " ");
        if content.chars().count() <= max_len {
            content
        } else {
            let cut: String = content.chars().take(max_len.saturating_sub(3)).collect();
            format!("{cut}...")
        }
    }

    /// Get relative time string (e.g., "5m", "2h", "3d")
    pub fn relative_time(&self) -> String {
        let created_at = self.actionable().created_at;
        let duration = Utc::now().signed_duration_since(created_at);

        if duration.num_seconds() < 60 {
            format!("{}s", duration.num_seconds().max(0))
        } else if duration.num_minutes() < 60 {
            format!("{}m", duration.num_minutes())
        } else if duration.num_hours() < 24 {
            format!("{}h", duration.num_hours())
        } else if duration.num_days() < 7 {
            format!("{}d", duration.num_days())
        } else {
            created_at.format("%b %d").to_string()
        }
    }
}

/// Turn Mastodon HTML into plain text
pub fn strip_html(html: &str) -> String {
    let text = html
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n")
        .replace("</p><p>", "\n\n");

    let text = regex_lite::Regex::new(r"<[^>]+>")
        .map(|re| re.replace_all(&text, "").to_string())
        .unwrap_or(text);

    html_escape::decode_html_entities(&text).to_string()
}
