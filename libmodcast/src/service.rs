//! Service facade for the moderation-and-publishing pipeline
//!
//! `ModcastService` is the single entry point shared by the message-handling
//! surface and the publish scheduler. It owns the repository behind one
//! async mutex, so a state transition and its durable save are one logical
//! unit from the perspective of the next reader, and it routes every
//! human-facing notification through the gateway's best-effort helper.
//!
//! The repository lock is never held across a feed send: a stalled transport
//! blocks only the post being published, not message handling.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use tokio::sync::Mutex;
use tracing::info;

use crate::config::Config;
use crate::error::{ModcastError, Result};
use crate::gateway::{notify_best_effort, MessagingGateway};
use crate::moderation::ScheduleChoice;
use crate::publisher::FeedPublisher;
use crate::repo::Repository;
use crate::store::SnapshotStore;
use crate::types::{Attachment, Feed, Identity, Post, RepoStats};

#[derive(Clone)]
pub struct ModcastService {
    repo: Arc<Mutex<Repository>>,
    store: SnapshotStore,
    gateway: Arc<dyn MessagingGateway>,
    publisher: Arc<FeedPublisher>,
}

impl ModcastService {
    /// Build a service from configuration, expanding `~` in store paths and
    /// loading the persisted snapshot (empty on first run).
    pub async fn open(config: &Config, gateway: Arc<dyn MessagingGateway>) -> Self {
        let store = SnapshotStore::new(
            shellexpand::tilde(&config.store.posts_path).to_string(),
            shellexpand::tilde(&config.store.feeds_path).to_string(),
        );
        let operator_target = config.operator.id.map(|id| id.to_string());
        Self::with_store(
            store,
            gateway,
            Duration::from_secs(config.scheduler.send_timeout),
            operator_target,
        )
        .await
    }

    /// Build a service over an explicit store, mainly for tests.
    pub async fn with_store(
        store: SnapshotStore,
        gateway: Arc<dyn MessagingGateway>,
        send_timeout: Duration,
        operator_target: Option<String>,
    ) -> Self {
        let repo = store.load().await;
        let publisher = Arc::new(FeedPublisher::new(
            gateway.clone(),
            send_timeout,
            operator_target,
        ));
        Self {
            repo: Arc::new(Mutex::new(repo)),
            store,
            gateway,
            publisher,
        }
    }

    // ------------------------------------------------------------------
    // Submission and queries
    // ------------------------------------------------------------------

    /// Create a pending post from a submission, bound to the current feed.
    pub async fn submit(&self, submitter: &Identity, content: Vec<Attachment>) -> Result<u64> {
        let privileged = self.gateway.is_operator(submitter);
        let mut repo = self.repo.lock().await;
        let id = repo.add(submitter, content, privileged, Utc::now())?;
        self.store.save(&repo).await?;
        info!(post_id = id, submitter = %submitter.label(), "post queued for moderation");
        Ok(id)
    }

    /// Pending posts for operator review, most recent first.
    pub async fn pending_queue(&self) -> Vec<Post> {
        self.repo.lock().await.list_pending()
    }

    pub async fn post(&self, id: u64) -> Option<Post> {
        self.repo.lock().await.get(id).cloned()
    }

    pub async fn stats(&self) -> RepoStats {
        self.repo.lock().await.stats()
    }

    // ------------------------------------------------------------------
    // Moderation (operator decisions)
    // ------------------------------------------------------------------

    /// Approve a pending post with the operator's time choice; `None` leaves
    /// the post for the daily fallback slot. Returns whether a post changed.
    pub async fn approve(
        &self,
        actor: &Identity,
        id: u64,
        choice: Option<ScheduleChoice>,
    ) -> Result<bool> {
        self.require_operator(actor)?;
        let scheduled = choice.map(|c| c.resolve(Local::now()));

        let submitter = {
            let mut repo = self.repo.lock().await;
            if !repo.approve(id, scheduled) {
                return Ok(false);
            }
            self.store.save(&repo).await?;
            repo.get(id).map(|p| p.submitter_id)
        };

        info!(post_id = id, scheduled = ?scheduled, "post approved");
        if let Some(submitter_id) = submitter {
            notify_best_effort(
                self.gateway.as_ref(),
                &submitter_id.to_string(),
                "Your post has been approved. Thank you for contributing!",
            )
            .await;
        }
        Ok(true)
    }

    /// Reject a pending post: notify the submitter (best-effort) and delete
    /// it. Deletion proceeds even when the submitter is unreachable.
    pub async fn reject(&self, actor: &Identity, id: u64) -> Result<bool> {
        self.require_operator(actor)?;

        let submitter = {
            let repo = self.repo.lock().await;
            match repo.get(id) {
                Some(post) => post.submitter_id,
                None => return Ok(false),
            }
        };

        notify_best_effort(
            self.gateway.as_ref(),
            &submitter.to_string(),
            "Your post did not pass moderation.",
        )
        .await;

        let mut repo = self.repo.lock().await;
        let removed = repo.delete(id);
        if removed {
            self.store.save(&repo).await?;
            info!(post_id = id, "post rejected and removed");
        }
        Ok(removed)
    }

    /// Delete a post directly, without notifying anyone.
    pub async fn delete_post(&self, actor: &Identity, id: u64) -> Result<bool> {
        self.require_operator(actor)?;
        let mut repo = self.repo.lock().await;
        let removed = repo.delete(id);
        if removed {
            self.store.save(&repo).await?;
            info!(post_id = id, "post deleted");
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Destination feeds
    // ------------------------------------------------------------------

    /// Register a destination feed, resolving its display title through the
    /// gateway when none is given. Returns `false` on a duplicate id.
    pub async fn register_feed(
        &self,
        actor: &Identity,
        feed_id: &str,
        title: Option<String>,
    ) -> Result<bool> {
        self.require_operator(actor)?;
        let title = match title {
            Some(title) => Some(title),
            None => self.gateway.feed_title(feed_id).await,
        };

        let mut repo = self.repo.lock().await;
        let registered = repo.register_feed(feed_id, title, Utc::now());
        if registered {
            self.store.save(&repo).await?;
            info!(feed = %feed_id, "destination feed registered");
        }
        Ok(registered)
    }

    pub async fn unregister_feed(&self, actor: &Identity, feed_id: &str) -> Result<bool> {
        self.require_operator(actor)?;
        let mut repo = self.repo.lock().await;
        let removed = repo.unregister_feed(feed_id);
        if removed {
            self.store.save(&repo).await?;
            info!(feed = %feed_id, "destination feed unregistered");
        }
        Ok(removed)
    }

    pub async fn set_current_feed(&self, actor: &Identity, feed_id: &str) -> Result<bool> {
        self.require_operator(actor)?;
        let mut repo = self.repo.lock().await;
        let changed = repo.set_current_feed(feed_id);
        if changed {
            self.store.save(&repo).await?;
        }
        Ok(changed)
    }

    pub async fn feeds(&self) -> Vec<Feed> {
        self.repo.lock().await.feeds().to_vec()
    }

    pub async fn current_feed(&self) -> Option<Feed> {
        self.repo.lock().await.current_feed().cloned()
    }

    // ------------------------------------------------------------------
    // Cleanup
    // ------------------------------------------------------------------

    /// Operator-initiated removal of posts older than the given age.
    pub async fn purge_older_than(&self, actor: &Identity, days: i64) -> Result<usize> {
        self.require_operator(actor)?;
        self.sweep_older_than(days, Utc::now()).await
    }

    /// Operator-initiated removal of all published posts.
    pub async fn purge_published(&self, actor: &Identity) -> Result<usize> {
        self.require_operator(actor)?;
        let mut repo = self.repo.lock().await;
        let removed = repo.purge_published();
        self.store.save(&repo).await?;
        info!(removed, "published posts purged");
        Ok(removed)
    }

    /// Age-based removal used by the scheduler's daily retention sweep.
    pub async fn sweep_older_than(&self, days: i64, now: DateTime<Utc>) -> Result<usize> {
        let mut repo = self.repo.lock().await;
        let removed = repo.purge_older_than(days, now);
        self.store.save(&repo).await?;
        info!(removed, days, "retention sweep complete");
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Publishing (scheduler-driven)
    // ------------------------------------------------------------------

    /// Ids of approved posts whose schedule has elapsed, in ascending order.
    pub async fn due_posts(&self, now: DateTime<Utc>) -> Vec<u64> {
        self.repo.lock().await.due_ids(now)
    }

    /// The earliest-submitted approved post bound to the current feed, if it
    /// has no explicit schedule. This is what the daily fallback publishes.
    pub async fn fallback_candidate(&self) -> Option<u64> {
        let repo = self.repo.lock().await;
        let feed = repo.current_feed_id()?;
        repo.next_due(feed)
            .filter(|p| p.scheduled_time.is_none())
            .map(|p| p.id)
    }

    /// Publish one approved post: deliver to its feed, then mark it
    /// published, persist, and notify the operator. On delivery failure the
    /// post stays approved and will be retried by the next due scan.
    pub async fn publish_post(&self, id: u64) -> Result<bool> {
        // Snapshot the post without holding the lock across the sends
        let post = {
            let repo = self.repo.lock().await;
            match repo.get(id) {
                Some(post) => post.clone(),
                None => return Ok(false),
            }
        };

        self.publisher.publish(&post).await?;

        let feed_label = {
            let mut repo = self.repo.lock().await;
            if !repo.mark_published(id, Utc::now()) {
                // Deleted while the sends were in flight
                return Ok(false);
            }
            self.store.save(&repo).await?;
            post.destination_feed
                .as_deref()
                .map(|feed_id| {
                    repo.feeds()
                        .iter()
                        .find(|f| f.id == feed_id)
                        .map(|f| f.title.clone())
                        .unwrap_or_else(|| feed_id.to_string())
                })
                .unwrap_or_default()
        };

        if let Some(operator) = self.operator_target() {
            notify_best_effort(
                self.gateway.as_ref(),
                &operator,
                &format!("Post #{} published to {}", id, feed_label),
            )
            .await;
        }
        Ok(true)
    }

    /// Best-effort message to the operator chat, when one is configured.
    pub async fn notify_operator(&self, text: &str) {
        if let Some(operator) = self.operator_target() {
            notify_best_effort(self.gateway.as_ref(), &operator, text).await;
        }
    }

    /// Final persistence flush, used on shutdown.
    pub async fn flush(&self) -> Result<()> {
        let repo = self.repo.lock().await;
        self.store.save(&repo).await
    }

    fn operator_target(&self) -> Option<String> {
        self.publisher.operator_target().map(str::to_string)
    }

    fn require_operator(&self, actor: &Identity) -> Result<()> {
        if self.gateway.is_operator(actor) {
            Ok(())
        } else {
            Err(ModcastError::PermissionDenied)
        }
    }
}
