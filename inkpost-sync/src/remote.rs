//! The boundary to the blog host.
//!
//! Every failure is classified exactly once, inside the client, into a
//! [`RemoteError`] variant. Callers match on the variant and never inspect
//! fault codes or message text.

use serde::Serialize;
use thiserror::Error;

use inkpost_core::PostId;

/// What gets sent when creating or editing a post.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostContent {
    pub title: String,
    pub body: String,
    /// Document categories; the client adds its configured defaults.
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

/// A post as stored on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemotePost {
    pub id: PostId,
    pub title: String,
    pub body: String,
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

/// One entry of the recent-posts listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostSummary {
    pub id: PostId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The host is throttling mutations; retrying later will work.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The host rejected the payload itself (e.g. markup it refuses).
    #[error("content rejected by host: {0}; does the document contain raw `<tag>` text?")]
    MalformedContent(String),

    #[error("post not found: {0}")]
    NotFound(String),

    #[error("remote fault {code}: {message}")]
    Fault { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Remote content operations used by the publish flow.
pub trait RemoteContentClient {
    /// Publish a new post and return the id the host assigned.
    fn create(&mut self, post: &PostContent) -> Result<PostId, RemoteError>;

    fn update(&mut self, id: &PostId, post: &PostContent) -> Result<bool, RemoteError>;

    fn delete(&mut self, id: &PostId) -> Result<bool, RemoteError>;

    fn fetch(&mut self, id: &PostId) -> Result<RemotePost, RemoteError>;

    fn list_recent(&mut self, limit: usize) -> Result<Vec<PostSummary>, RemoteError>;
}
