//! Durable snapshot store for posts and feed registrations
//!
//! Two independent JSON documents, rewritten whole on every mutating save:
//! the posts collection (with the monotonic id counter) and the feeds
//! collection (with the current-feed pointer). There is no append log.
//!
//! Saves write to a temp file next to the target and atomically rename it
//! into place, so a crash mid-write can lose at most the last mutation and
//! can never leave a reader with a corrupt document. Loads tolerate missing
//! or unreadable files and fall back to empty state with a warning.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::repo::Repository;
use crate::types::{Feed, Post};

#[derive(Debug, Default, Serialize, Deserialize)]
struct PostsDocument {
    #[serde(default = "default_next_post_id")]
    next_post_id: u64,
    #[serde(default)]
    posts: Vec<Post>,
}

fn default_next_post_id() -> u64 {
    1
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FeedsDocument {
    #[serde(default)]
    feeds: Vec<Feed>,
    #[serde(default)]
    current_feed: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    posts_path: PathBuf,
    feeds_path: PathBuf,
}

impl SnapshotStore {
    pub fn new(posts_path: impl Into<PathBuf>, feeds_path: impl Into<PathBuf>) -> Self {
        Self {
            posts_path: posts_path.into(),
            feeds_path: feeds_path.into(),
        }
    }

    /// Load both collections and build a repository.
    ///
    /// Never fails: a missing store is first run, an unreadable one is
    /// treated as empty after logging what was wrong.
    pub async fn load(&self) -> Repository {
        let posts: PostsDocument = read_document(&self.posts_path).await;
        let feeds: FeedsDocument = read_document(&self.feeds_path).await;
        Repository::from_snapshot(
            posts.posts,
            posts.next_post_id,
            feeds.feeds,
            feeds.current_feed,
        )
    }

    /// Persist both collections as whole-snapshot documents.
    pub async fn save(&self, repo: &Repository) -> Result<()> {
        let posts = PostsDocument {
            next_post_id: repo.next_post_id(),
            posts: repo.posts().to_vec(),
        };
        let feeds = FeedsDocument {
            feeds: repo.feeds().to_vec(),
            current_feed: repo.current_feed_id().map(str::to_string),
        };
        write_document(&self.posts_path, &posts).await?;
        write_document(&self.feeds_path, &feeds).await?;
        Ok(())
    }
}

async fn read_document<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> T {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read store, starting empty");
            return T::default();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "store unreadable, starting empty");
            T::default()
        }
    }
}

/// Write-then-rename so the document at `path` is always complete.
async fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(StoreError::Io)?;
        }
    }
    let json = serde_json::to_vec_pretty(value).map_err(StoreError::Serialize)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &json).await.map_err(StoreError::Io)?;
    fs::rename(&tmp, path).await.map_err(StoreError::Io)?;
    Ok(())
}
