pub mod client;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of the logged-in user, as returned by the auth endpoints and
/// persisted alongside the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: String,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Author info embedded in tweets and comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_liked_by_me: bool,
    #[serde(default)]
    pub likes_count: u32,
    #[serde(default)]
    pub replies_count: u32,
    pub user: UserSummary,
}

impl Tweet {
    pub fn is_authored_by(&self, username: &str) -> bool {
        self.user.username == username
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub user: UserSummary,
}

/// A user's profile as served by `GET /users/:username`, with the viewer's
/// follow edge and the user's tweets embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub followers_count: u32,
    #[serde(default)]
    pub following_count: u32,
    #[serde(default)]
    pub tweets_count: u32,
    #[serde(default)]
    pub is_following: bool,
    #[serde(default)]
    pub tweets: Vec<Tweet>,
}

/// Row of the explore listing (`GET /users?page=N`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExploreUser {
    pub id: String,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub followers_count: u32,
    #[serde(default)]
    pub is_following: bool,
    #[serde(default)]
    pub latest_tweet: Option<LatestTweet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestTweet {
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserIdentity,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

// Response envelopes. List endpoints wrap as {data, meta}; single-resource
// endpoints wrap as {data} (extra sibling fields like `success` are ignored);
// errors carry {message}.

#[derive(Debug, Deserialize)]
pub struct ListEnvelope<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Meta {
    pub total: u32,
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct ItemEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

/// One page of a paged listing, with the page count derived from `meta`.
#[derive(Debug, Clone)]
pub struct PageOf<T> {
    pub items: Vec<T>,
    pub total_pages: u32,
}

impl<T> PageOf<T> {
    pub fn from_envelope(envelope: ListEnvelope<T>) -> Self {
        let total_pages = envelope
            .meta
            .map(|m| total_pages(m.total, m.limit))
            .unwrap_or(0);
        Self {
            items: envelope.data,
            total_pages,
        }
    }
}

/// Number of pages needed for `total` items at `limit` per page.
pub fn total_pages(total: u32, limit: u32) -> u32 {
    if limit == 0 {
        0
    } else {
        total.div_ceil(limit)
    }
}

/// Client-side classification of request failures. The reconciler and the
/// views branch on these kinds, so they are typed rather than stringly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Any 401. The gateway has already cleared the session when this is
    /// returned; callers must not assume the request succeeded.
    #[error("session expired, please sign in again")]
    AuthenticationExpired,
    /// 409 on a create-relation call.
    #[error("{message}")]
    Conflict { message: String },
    /// 404 on a delete-relation call.
    #[error("{message}")]
    NotFound { message: String },
    /// Other 4xx with a server-supplied message, surfaced verbatim.
    #[error("{message}")]
    Validation { message: String },
    /// 5xx from the server.
    #[error("server error ({status}), try again")]
    Server { status: u16 },
    /// Transport failure: no response, DNS, timeout, bad body.
    #[error("network error: {message}")]
    Network { message: String },
}

impl ApiError {
    /// Failures worth suggesting a retry for, as opposed to user errors.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Server { .. } | ApiError::Network { .. })
    }
}

/// Everything the remote Growtwitter service exposes to this client. One
/// method per REST operation; implementations attach credentials and map
/// failures to `ApiError`, nothing more.
#[async_trait]
pub trait ApiGateway: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError>;
    async fn register(&self, request: &RegisterRequest) -> Result<(), ApiError>;

    async fn feed(&self) -> Result<Vec<Tweet>, ApiError>;
    async fn global_tweets(&self, page: u32) -> Result<PageOf<Tweet>, ApiError>;
    async fn create_tweet(&self, content: &str) -> Result<Tweet, ApiError>;
    async fn delete_tweet(&self, tweet_id: &str) -> Result<(), ApiError>;

    async fn like(&self, tweet_id: &str) -> Result<(), ApiError>;
    async fn unlike(&self, tweet_id: &str) -> Result<(), ApiError>;

    async fn comments(&self, tweet_id: &str) -> Result<Vec<Comment>, ApiError>;
    async fn create_comment(&self, tweet_id: &str, content: &str) -> Result<Comment, ApiError>;

    async fn users(&self, page: u32) -> Result<PageOf<ExploreUser>, ApiError>;
    async fn profile(&self, username: &str) -> Result<Profile, ApiError>;
    async fn update_profile(
        &self,
        name: &str,
        image_url: Option<&str>,
    ) -> Result<UserIdentity, ApiError>;

    async fn follow(&self, user_id: &str) -> Result<(), ApiError>;
    async fn unfollow(&self, user_id: &str) -> Result<(), ApiError>;
}
