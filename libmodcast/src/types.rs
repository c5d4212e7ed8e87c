//! Core types for Modcast

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a submitted post.
///
/// Rejected and cleaned-up posts are removed from the repository rather than
/// kept as a tombstone state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Pending,
    Approved,
    Published,
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Published => write!(f, "published"),
        }
    }
}

/// Media kind of a single attachment.
///
/// A tagged variant so that adding a kind means one new enum arm, not a new
/// branch at every send site.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Photo,
    Video,
    Audio,
}

impl std::fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Photo => write!(f, "photo"),
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// One media item inside a post, referenced by the transport's file handle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    /// Transport-side reference to the media (e.g. a file id), never raw bytes.
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl Attachment {
    pub fn new(kind: AttachmentKind, reference: impl Into<String>) -> Self {
        Self {
            kind,
            reference: reference.into(),
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

/// Who is talking to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub username: Option<String>,
}

impl Identity {
    pub fn new(id: i64) -> Self {
        Self { id, username: None }
    }

    pub fn with_username(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: Some(username.into()),
        }
    }

    /// Human-readable label, falling back to the numeric id.
    pub fn label(&self) -> String {
        match &self.username {
            Some(name) => name.clone(),
            None => self.id.to_string(),
        }
    }
}

/// A unit of submitted content awaiting or having completed moderation
/// and publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub submitter_id: i64,
    pub submitter_label: String,
    pub content: Vec<Attachment>,
    pub status: PostStatus,
    /// Feed this post was bound to at submission time. `None` when the
    /// submitter was not privileged and no feed was current.
    pub destination_feed: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Present only once approved; `None` means "publish at the next daily
    /// fallback slot".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
    /// Set exactly once, by the scheduler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Post {
    /// Whether the due-schedule scan should publish this post at `now`.
    ///
    /// Posts without an explicit schedule are never due; they advance through
    /// the daily fallback instead.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == PostStatus::Approved
            && self.scheduled_time.map(|t| t <= now).unwrap_or(false)
    }
}

/// An external broadcast target a published post is sent to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Feed {
    pub id: String,
    pub title: String,
    pub added_at: DateTime<Utc>,
}

/// Aggregate counts over the whole repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub published: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}
