//! Mastodon API client

use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, LINK};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::FetchError;
use crate::models::{Account, Author, MediaAttachment, MediaType, Status, StatusId, TimelineId};

use super::{Page, PageRequest, TimelineFetcher, link};

/// Longest error body kept in [`FetchError::Http`]
const MAX_ERROR_BODY: usize = 512;

/// Mastodon API client, shared by every account
#[derive(Debug, Clone, Default)]
pub struct MastodonClient {
    client: Client,
}

/// Profile returned by `verify_credentials`
#[derive(Debug, Clone)]
pub struct VerifiedAccount {
    /// Local username
    pub username: String,
    /// Display name
    pub display_name: String,
    /// Avatar URL
    pub avatar: Option<String>,
}

impl MastodonClient {
    /// Create a new Mastodon client
    pub fn new() -> Self {
        Self::default()
    }

    /// Build API URL
    fn api_url(server: &str, endpoint: &str) -> String {
        format!("{}/api/v1{}", server.trim_end_matches('/'), endpoint)
    }

    /// Path and fixed query of a timeline endpoint
    fn timeline_endpoint(timeline: &TimelineId) -> (String, Vec<(&'static str, String)>) {
        match timeline {
            TimelineId::Home => ("/timelines/home".to_string(), Vec::new()),
            TimelineId::Local => (
                "/timelines/public".to_string(),
                vec![("local", "true".to_string())],
            ),
            TimelineId::Federated => ("/timelines/public".to_string(), Vec::new()),
            TimelineId::Tag(tag) => (
                format!("/timelines/tag/{}", urlencoding::encode(tag)),
                Vec::new(),
            ),
            TimelineId::List(id) => (
                format!("/timelines/list/{}", urlencoding::encode(id)),
                Vec::new(),
            ),
        }
    }

    /// Full URL for one page request
    fn page_url(server: &str, timeline: &TimelineId, request: &PageRequest) -> String {
        let (path, mut query) = Self::timeline_endpoint(timeline);
        if let Some(max_id) = &request.max_id {
            query.push(("max_id", max_id.clone()));
        }
        if let Some(min_id) = &request.min_id {
            query.push(("min_id", min_id.clone()));
        }
        query.push(("limit", request.limit.to_string()));

        let query = query
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{query}", Self::api_url(server, &path))
    }

    /// Verify an access token and get the profile behind it
    pub async fn verify_credentials(
        &self,
        server: &str,
        access_token: &str,
    ) -> Result<VerifiedAccount, FetchError> {
        let url = Self::api_url(server, "/accounts/verify_credentials");

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .send()
            .await?;

        let account: MastodonAccount = read_json(response).await?;

        Ok(VerifiedAccount {
            username: account.username,
            display_name: account.display_name,
            avatar: (!account.avatar.is_empty()).then_some(account.avatar),
        })
    }
}

impl TimelineFetcher for MastodonClient {
    async fn fetch_page(
        &self,
        account: &Account,
        timeline: &TimelineId,
        request: &PageRequest,
    ) -> Result<Page, FetchError> {
        let url = Self::page_url(&account.server, timeline, request);
        tracing::debug!("GET {url}");

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", account.access_token))
            .send()
            .await?;

        let link_header = response
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let (next, prev) = link::cursors(link_header.as_deref());

        let statuses: Vec<MastodonStatus> = read_json(response).await?;

        Ok(Page {
            items: statuses
                .into_iter()
                .map(MastodonStatus::into_status)
                .collect(),
            next,
            prev,
        })
    }
}

/// Check the status code, then decode the body
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, FetchError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let mut body = body;
        if body.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|&i| body.is_char_boundary(i))
                .unwrap_or(0);
            body.truncate(cut);
        }
        return Err(FetchError::Http {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))
}

// ==================== API Types ====================

#[derive(Debug, Deserialize)]
struct MastodonStatus {
    id: String,
    created_at: String,
    #[serde(default)]
    content: String,
    url: Option<String>,
    account: MastodonAccount,
    reblog: Option<Box<Self>>,
    #[serde(default)]
    spoiler_text: String,
    #[serde(default)]
    sensitive: bool,
    #[serde(default)]
    visibility: String,
    #[serde(default)]
    favourites_count: u32,
    #[serde(default)]
    reblogs_count: u32,
    #[serde(default)]
    replies_count: u32,
    favourited: Option<bool>,
    reblogged: Option<bool>,
    bookmarked: Option<bool>,
    in_reply_to_id: Option<String>,
    #[serde(default)]
    media_attachments: Vec<MastodonMedia>,
}

#[derive(Debug, Deserialize)]
struct MastodonAccount {
    id: String,
    username: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    avatar: String,
    #[serde(default)]
    acct: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MastodonMedia {
    url: String,
    preview_url: Option<String>,
    #[serde(rename = "type")]
    media_type: String,
    description: Option<String>,
}

impl MastodonAccount {
    fn into_author(self) -> Author {
        Author {
            acct: if self.acct.is_empty() {
                self.username.clone()
            } else {
                self.acct
            },
            id: self.id,
            username: self.username,
            display_name: self.display_name,
            avatar: (!self.avatar.is_empty()).then_some(self.avatar),
            url: self.url,
        }
    }
}

impl MastodonStatus {
    fn into_status(self) -> Status {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

        Status {
            id: StatusId::new(self.id),
            url: self.url,
            author: self.account.into_author(),
            content: self.content,
            spoiler_text: self.spoiler_text,
            sensitive: self.sensitive,
            visibility: self.visibility,
            created_at,
            favourites_count: self.favourites_count,
            reblogs_count: self.reblogs_count,
            replies_count: self.replies_count,
            favourited: self.favourited.unwrap_or(false),
            reblogged: self.reblogged.unwrap_or(false),
            bookmarked: self.bookmarked.unwrap_or(false),
            in_reply_to_id: self.in_reply_to_id,
            media: self
                .media_attachments
                .into_iter()
                .map(|m| MediaAttachment {
                    url: m.url,
                    preview_url: m.preview_url,
                    media_type: MediaType::from_wire(&m.media_type),
                    alt_text: m.description,
                })
                .collect(),
            reblog: self.reblog.map(|r| Box::new(r.into_status())),
        }
    }
}

/// OAuth authentication flow for Mastodon
pub mod oauth {
    use super::{Client, Context, Deserialize};

    const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";
    const SCOPES: &str = "read write follow";

    /// Registered OAuth application credentials
    #[derive(Debug, Deserialize)]
    pub struct OAuthApp {
        /// OAuth client ID
        pub client_id: String,
        /// OAuth client secret
        pub client_secret: String,
    }

    /// OAuth access token response
    #[derive(Debug, Deserialize)]
    pub struct OAuthToken {
        /// Access token for API requests
        pub access_token: String,
        /// Token type (usually "Bearer")
        pub token_type: String,
    }

    /// Register an OAuth application with an instance
    pub async fn register_app(instance: &str) -> anyhow::Result<OAuthApp> {
        let client = Client::new();
        let url = format!("{}/api/v1/apps", instance.trim_end_matches('/'));

        let params = [
            ("client_name", "Roost"),
            ("redirect_uris", REDIRECT_URI),
            ("scopes", SCOPES),
        ];

        let response = client
            .post(&url)
            .form(&params)
            .send()
            .await
            .context("Failed to register app")?
            .error_for_status()
            .context("Instance rejected app registration")?;

        response
            .json()
            .await
            .context("Failed to parse app registration response")
    }

    /// Get the authorization URL for the user to visit
    pub fn get_auth_url(instance: &str, client_id: &str) -> String {
        format!(
            "{}/oauth/authorize?client_id={}&redirect_uri={}&response_type=code&scope={}",
            instance.trim_end_matches('/'),
            urlencoding::encode(client_id),
            urlencoding::encode(REDIRECT_URI),
            urlencoding::encode(SCOPES),
        )
    }

    /// Exchange authorization code for access token
    pub async fn get_token(
        instance: &str,
        client_id: &str,
        client_secret: &str,
        code: &str,
    ) -> anyhow::Result<OAuthToken> {
        let client = Client::new();
        let url = format!("{}/oauth/token", instance.trim_end_matches('/'));

        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", REDIRECT_URI),
            ("code", code),
            ("scope", SCOPES),
        ];

        let response = client
            .post(&url)
            .form(&params)
            .send()
            .await
            .context("Failed to get access token")?
            .error_for_status()
            .context("Instance rejected the authorization code")?;

        response
            .json()
            .await
            .context("Failed to parse token response")
    }
}
