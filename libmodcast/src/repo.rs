//! In-memory post and feed repository
//!
//! Holds the whole collection of posts and destination feeds, including the
//! single "current feed" pointer new submissions bind to. The repository is
//! an owned instance behind the service facade, never a process-wide global.
//!
//! Unknown-id operations are no-ops reported through `bool`/`Option` returns
//! rather than errors, so callers decide the user-facing messaging.

use chrono::{DateTime, Duration, Utc};

use crate::error::{ModcastError, Result};
use crate::types::{Attachment, Feed, Identity, Post, PostStatus, RepoStats};

#[derive(Debug, Default)]
pub struct Repository {
    posts: Vec<Post>,
    /// Strictly monotonic; persisted with the posts so ids are never reused
    /// after deletion.
    next_post_id: u64,
    feeds: Vec<Feed>,
    current_feed: Option<String>,
}

impl Repository {
    pub fn new() -> Self {
        Self {
            posts: Vec::new(),
            next_post_id: 1,
            feeds: Vec::new(),
            current_feed: None,
        }
    }

    /// Rebuild from a loaded snapshot.
    ///
    /// The id counter is clamped to `max(stored, highest id + 1)` so a
    /// snapshot written by an older version can never hand out a duplicate.
    /// A current-feed pointer naming an unregistered feed is discarded.
    pub fn from_snapshot(
        posts: Vec<Post>,
        next_post_id: u64,
        feeds: Vec<Feed>,
        current_feed: Option<String>,
    ) -> Self {
        let highest = posts.iter().map(|p| p.id).max().unwrap_or(0);
        let next_post_id = next_post_id.max(highest + 1);
        let current_feed =
            current_feed.filter(|id| feeds.iter().any(|f| &f.id == id));
        Self {
            posts,
            next_post_id,
            feeds,
            current_feed,
        }
    }

    // ------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------

    /// Create a pending post bound to the current destination feed.
    ///
    /// A privileged submitter with no feed configured is refused so the
    /// operator notices the missing setup; non-privileged submissions queue
    /// anyway (with no bound feed) to preserve them for review.
    pub fn add(
        &mut self,
        submitter: &Identity,
        content: Vec<Attachment>,
        privileged: bool,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        if content.is_empty() {
            return Err(ModcastError::InvalidInput(
                "post must contain at least one attachment".to_string(),
            ));
        }
        if self.current_feed.is_none() && privileged {
            return Err(ModcastError::NoDestinationConfigured);
        }

        let id = self.next_post_id;
        self.next_post_id += 1;
        self.posts.push(Post {
            id,
            submitter_id: submitter.id,
            submitter_label: submitter.label(),
            content,
            status: PostStatus::Pending,
            destination_feed: self.current_feed.clone(),
            created_at: now,
            scheduled_time: None,
            published_at: None,
        });
        Ok(id)
    }

    pub fn get(&self, id: u64) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == id)
    }

    /// Pending posts, most recent first (review recency for the operator
    /// queue; deliberately the opposite of the fallback publish order).
    pub fn list_pending(&self) -> Vec<Post> {
        let mut pending: Vec<Post> = self
            .posts
            .iter()
            .filter(|p| p.status == PostStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        pending
    }

    /// Approve a pending post, storing the operator's chosen publish time.
    ///
    /// `None` means "publish at the next daily fallback slot". Unknown ids
    /// and posts that are not pending are left untouched.
    pub fn approve(&mut self, id: u64, scheduled_time: Option<DateTime<Utc>>) -> bool {
        match self.posts.iter_mut().find(|p| p.id == id) {
            Some(post) if post.status == PostStatus::Pending => {
                post.status = PostStatus::Approved;
                post.scheduled_time = scheduled_time;
                true
            }
            _ => false,
        }
    }

    /// The earliest-submitted approved post bound to the given feed.
    ///
    /// Submission order, not schedule order: this feeds the daily fallback,
    /// which is about fairness of publish order. Ties on `created_at` break
    /// by id so repeated calls are stable.
    pub fn next_due(&self, destination_feed: &str) -> Option<&Post> {
        self.posts
            .iter()
            .filter(|p| {
                p.status == PostStatus::Approved
                    && p.destination_feed.as_deref() == Some(destination_feed)
            })
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
    }

    /// Ids of approved posts whose schedule has elapsed, ascending so each
    /// tick processes them in a stable order.
    pub fn due_ids(&self, now: DateTime<Utc>) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .posts
            .iter()
            .filter(|p| p.is_due(now))
            .map(|p| p.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Transition an approved post to published. Only the scheduler calls
    /// this; `published_at` is set exactly once.
    pub fn mark_published(&mut self, id: u64, now: DateTime<Utc>) -> bool {
        match self.posts.iter_mut().find(|p| p.id == id) {
            Some(post) if post.status == PostStatus::Approved => {
                post.status = PostStatus::Published;
                post.published_at = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Remove the post unconditionally, whatever its status.
    pub fn delete(&mut self, id: u64) -> bool {
        let before = self.posts.len();
        self.posts.retain(|p| p.id != id);
        self.posts.len() != before
    }

    /// Remove posts whose `created_at` precedes `now - days`, regardless of
    /// status. Returns how many were removed.
    pub fn purge_older_than(&mut self, days: i64, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::days(days);
        let before = self.posts.len();
        self.posts.retain(|p| p.created_at >= cutoff);
        before - self.posts.len()
    }

    /// Remove all published posts. Returns how many were removed.
    pub fn purge_published(&mut self) -> usize {
        let before = self.posts.len();
        self.posts.retain(|p| p.status != PostStatus::Published);
        before - self.posts.len()
    }

    pub fn stats(&self) -> RepoStats {
        let count = |status: PostStatus| self.posts.iter().filter(|p| p.status == status).count();
        RepoStats {
            total: self.posts.len(),
            pending: count(PostStatus::Pending),
            approved: count(PostStatus::Approved),
            published: count(PostStatus::Published),
            oldest: self.posts.iter().map(|p| p.created_at).min(),
            newest: self.posts.iter().map(|p| p.created_at).max(),
        }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn next_post_id(&self) -> u64 {
        self.next_post_id
    }

    // ------------------------------------------------------------------
    // Destination feeds
    // ------------------------------------------------------------------

    /// Register a destination feed. Returns `false` if the id is already
    /// registered. The first-ever feed automatically becomes current.
    pub fn register_feed(
        &mut self,
        id: impl Into<String>,
        title: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        let id = id.into();
        if self.feeds.iter().any(|f| f.id == id) {
            return false;
        }
        let title = title.unwrap_or_else(|| id.clone());
        self.feeds.push(Feed {
            id: id.clone(),
            title,
            added_at: now,
        });
        if self.current_feed.is_none() {
            self.current_feed = Some(id);
        }
        true
    }

    /// Unregister a feed. If it was current, current moves to an arbitrary
    /// remaining feed, or to none when the list empties. Already-bound posts
    /// keep their feed id.
    pub fn unregister_feed(&mut self, id: &str) -> bool {
        let before = self.feeds.len();
        self.feeds.retain(|f| f.id != id);
        let removed = self.feeds.len() != before;
        if removed && self.current_feed.as_deref() == Some(id) {
            self.current_feed = self.feeds.first().map(|f| f.id.clone());
        }
        removed
    }

    /// Make a registered feed the current one. Returns `false` if unknown.
    pub fn set_current_feed(&mut self, id: &str) -> bool {
        if self.feeds.iter().any(|f| f.id == id) {
            self.current_feed = Some(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn feeds(&self) -> &[Feed] {
        &self.feeds
    }

    pub fn current_feed(&self) -> Option<&Feed> {
        let id = self.current_feed.as_deref()?;
        self.feeds.iter().find(|f| f.id == id)
    }

    pub fn current_feed_id(&self) -> Option<&str> {
        self.current_feed.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttachmentKind;

    fn attachment() -> Attachment {
        Attachment::new(AttachmentKind::Photo, "file-1")
    }

    fn repo_with_feed() -> Repository {
        let mut repo = Repository::new();
        repo.register_feed("@feed", None, Utc::now());
        repo
    }

    fn submit(repo: &mut Repository, at: DateTime<Utc>) -> u64 {
        repo.add(&Identity::with_username(10, "alice"), vec![attachment()], false, at)
            .unwrap()
    }

    #[test]
    fn test_add_assigns_monotonic_ids() {
        let mut repo = repo_with_feed();
        let now = Utc::now();
        let a = submit(&mut repo, now);
        let b = submit(&mut repo, now);
        assert_eq!(b, a + 1);

        // Deleting must not cause id reuse
        assert!(repo.delete(b));
        let c = submit(&mut repo, now);
        assert_eq!(c, b + 1);
    }

    #[test]
    fn test_add_binds_current_feed_at_submission() {
        let mut repo = repo_with_feed();
        repo.register_feed("@other", None, Utc::now());
        let id = submit(&mut repo, Utc::now());

        // Switching current later never rebinds existing posts
        assert!(repo.set_current_feed("@other"));
        let later = submit(&mut repo, Utc::now());

        assert_eq!(repo.get(id).unwrap().destination_feed.as_deref(), Some("@feed"));
        assert_eq!(repo.get(later).unwrap().destination_feed.as_deref(), Some("@other"));
    }

    #[test]
    fn test_add_privileged_without_feed_fails() {
        let mut repo = Repository::new();
        let result = repo.add(
            &Identity::new(1),
            vec![attachment()],
            true,
            Utc::now(),
        );
        assert!(matches!(result, Err(ModcastError::NoDestinationConfigured)));
        assert_eq!(repo.stats().total, 0);
    }

    #[test]
    fn test_add_unprivileged_without_feed_queues() {
        let mut repo = Repository::new();
        let id = repo
            .add(&Identity::new(1), vec![attachment()], false, Utc::now())
            .unwrap();
        assert_eq!(repo.get(id).unwrap().destination_feed, None);
    }

    #[test]
    fn test_add_rejects_empty_content() {
        let mut repo = repo_with_feed();
        let result = repo.add(&Identity::new(1), vec![], false, Utc::now());
        assert!(matches!(result, Err(ModcastError::InvalidInput(_))));
    }

    #[test]
    fn test_list_pending_most_recent_first() {
        let mut repo = repo_with_feed();
        let base = Utc::now();
        let old = submit(&mut repo, base - Duration::hours(2));
        let new = submit(&mut repo, base);
        let mid = submit(&mut repo, base - Duration::hours(1));

        let pending: Vec<u64> = repo.list_pending().iter().map(|p| p.id).collect();
        assert_eq!(pending, vec![new, mid, old]);
    }

    #[test]
    fn test_approve_only_from_pending() {
        let mut repo = repo_with_feed();
        let now = Utc::now();
        let id = submit(&mut repo, now);

        assert!(repo.approve(id, Some(now)));
        assert_eq!(repo.get(id).unwrap().status, PostStatus::Approved);

        // Re-approving or approving a published post is a no-op
        assert!(!repo.approve(id, None));
        assert!(repo.mark_published(id, now));
        assert!(!repo.approve(id, None));

        // Unknown id fails silently
        assert!(!repo.approve(9999, None));
    }

    #[test]
    fn test_mark_published_only_from_approved() {
        let mut repo = repo_with_feed();
        let now = Utc::now();
        let id = submit(&mut repo, now);

        // Pending posts cannot jump straight to published
        assert!(!repo.mark_published(id, now));

        repo.approve(id, None);
        assert!(repo.mark_published(id, now));
        let post = repo.get(id).unwrap();
        assert_eq!(post.status, PostStatus::Published);
        assert_eq!(post.published_at, Some(now));

        // published_at is set exactly once
        assert!(!repo.mark_published(id, now + Duration::seconds(5)));
        assert_eq!(repo.get(id).unwrap().published_at, Some(now));

        assert!(!repo.mark_published(9999, now));
    }

    #[test]
    fn test_next_due_oldest_first_per_feed() {
        let mut repo = repo_with_feed();
        let base = Utc::now();
        let newer = submit(&mut repo, base);
        let older = submit(&mut repo, base - Duration::hours(1));
        repo.approve(newer, None);
        repo.approve(older, None);

        assert_eq!(repo.next_due("@feed").unwrap().id, older);
        assert!(repo.next_due("@elsewhere").is_none());
    }

    #[test]
    fn test_next_due_tie_break_is_stable() {
        let mut repo = repo_with_feed();
        let at = Utc::now();
        let first = submit(&mut repo, at);
        let second = submit(&mut repo, at);
        repo.approve(first, None);
        repo.approve(second, None);

        for _ in 0..5 {
            assert_eq!(repo.next_due("@feed").unwrap().id, first);
        }
    }

    #[test]
    fn test_next_due_ignores_pending_and_published() {
        let mut repo = repo_with_feed();
        let now = Utc::now();
        let pending = submit(&mut repo, now - Duration::hours(3));
        let published = submit(&mut repo, now - Duration::hours(2));
        let approved = submit(&mut repo, now - Duration::hours(1));

        repo.approve(published, None);
        repo.mark_published(published, now);
        repo.approve(approved, None);

        let _ = pending;
        assert_eq!(repo.next_due("@feed").unwrap().id, approved);
    }

    #[test]
    fn test_due_ids_ascending_and_filtered() {
        let mut repo = repo_with_feed();
        let now = Utc::now();
        let due_late = submit(&mut repo, now);
        let due_early = submit(&mut repo, now);
        let future = submit(&mut repo, now);
        let unscheduled = submit(&mut repo, now);

        repo.approve(due_late, Some(now - Duration::seconds(5)));
        repo.approve(due_early, Some(now - Duration::minutes(10)));
        repo.approve(future, Some(now + Duration::minutes(10)));
        repo.approve(unscheduled, None);

        let _ = unscheduled;
        let _ = future;
        // Ascending id order, future and unscheduled excluded
        assert_eq!(repo.due_ids(now), vec![due_late, due_early]);
    }

    #[test]
    fn test_delete_unconditional() {
        let mut repo = repo_with_feed();
        let now = Utc::now();
        let id = submit(&mut repo, now);
        repo.approve(id, None);

        assert!(repo.delete(id));
        assert!(repo.get(id).is_none());
        assert!(!repo.delete(id));
    }

    #[test]
    fn test_purge_older_than_ignores_status() {
        let mut repo = repo_with_feed();
        let now = Utc::now();
        let ancient = submit(&mut repo, now - Duration::days(40));
        let aged_published = submit(&mut repo, now - Duration::days(31));
        let fresh = submit(&mut repo, now - Duration::days(5));
        repo.approve(aged_published, None);
        repo.mark_published(aged_published, now);

        let removed = repo.purge_older_than(30, now);
        assert_eq!(removed, 2);
        assert!(repo.get(ancient).is_none());
        assert!(repo.get(aged_published).is_none());
        assert!(repo.get(fresh).is_some());
    }

    #[test]
    fn test_purge_published_only() {
        let mut repo = repo_with_feed();
        let now = Utc::now();
        let pending = submit(&mut repo, now);
        let approved = submit(&mut repo, now);
        let published = submit(&mut repo, now);
        repo.approve(approved, None);
        repo.approve(published, None);
        repo.mark_published(published, now);

        let removed = repo.purge_published();
        assert_eq!(removed, 1);
        assert!(repo.get(pending).is_some());
        assert!(repo.get(approved).is_some());
        assert!(repo.get(published).is_none());
    }

    #[test]
    fn test_stats() {
        let mut repo = repo_with_feed();
        let base = Utc::now();
        let oldest = base - Duration::days(3);
        submit(&mut repo, oldest);
        let approved = submit(&mut repo, base - Duration::days(1));
        let published = submit(&mut repo, base);
        repo.approve(approved, None);
        repo.approve(published, None);
        repo.mark_published(published, base);

        let stats = repo.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.published, 1);
        assert_eq!(stats.oldest, Some(oldest));
        assert_eq!(stats.newest, Some(base));
    }

    #[test]
    fn test_stats_empty() {
        let repo = Repository::new();
        let stats = repo.stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.oldest, None);
        assert_eq!(stats.newest, None);
    }

    #[test]
    fn test_register_feed_rejects_duplicates() {
        let mut repo = Repository::new();
        let now = Utc::now();
        assert!(repo.register_feed("@feed", Some("The Feed".to_string()), now));
        assert!(!repo.register_feed("@feed", Some("Renamed".to_string()), now));

        assert_eq!(repo.feeds().len(), 1);
        assert_eq!(repo.feeds()[0].title, "The Feed");
    }

    #[test]
    fn test_register_feed_title_defaults_to_id() {
        let mut repo = Repository::new();
        repo.register_feed("@feed", None, Utc::now());
        assert_eq!(repo.feeds()[0].title, "@feed");
    }

    #[test]
    fn test_first_feed_becomes_current() {
        let mut repo = Repository::new();
        assert!(repo.current_feed().is_none());
        repo.register_feed("@first", None, Utc::now());
        repo.register_feed("@second", None, Utc::now());
        assert_eq!(repo.current_feed().unwrap().id, "@first");
    }

    #[test]
    fn test_unregister_current_reassigns() {
        let mut repo = Repository::new();
        let now = Utc::now();
        repo.register_feed("@a", None, now);
        repo.register_feed("@b", None, now);

        assert!(repo.unregister_feed("@a"));
        assert_eq!(repo.current_feed().unwrap().id, "@b");

        assert!(repo.unregister_feed("@b"));
        assert!(repo.current_feed().is_none());

        assert!(!repo.unregister_feed("@missing"));
    }

    #[test]
    fn test_set_current_unknown_feed() {
        let mut repo = Repository::new();
        repo.register_feed("@a", None, Utc::now());
        assert!(!repo.set_current_feed("@nope"));
        assert_eq!(repo.current_feed().unwrap().id, "@a");
    }

    #[test]
    fn test_from_snapshot_clamps_id_counter() {
        let mut repo = repo_with_feed();
        let now = Utc::now();
        submit(&mut repo, now);
        let second = submit(&mut repo, now);

        // Counter lost (older snapshot format): must still exceed highest id
        let restored = Repository::from_snapshot(
            repo.posts().to_vec(),
            1,
            repo.feeds().to_vec(),
            Some("@feed".to_string()),
        );
        assert_eq!(restored.next_post_id(), second + 1);
    }

    #[test]
    fn test_from_snapshot_drops_stale_current_feed() {
        let restored = Repository::from_snapshot(vec![], 1, vec![], Some("@gone".to_string()));
        assert!(restored.current_feed().is_none());
    }
}
