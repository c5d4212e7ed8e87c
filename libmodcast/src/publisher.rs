//! Feed publisher: delivers an approved post to its destination feed
//!
//! Sends each attachment in content order, then one attribution message
//! naming the submitter. A post with no bound feed is a definite,
//! non-retriable failure and is left untouched for manual intervention.
//!
//! On any send error the remaining sends are aborted and the post's status
//! stays unchanged, so the next due scan retries it. Retries restart from
//! the first attachment: a persistent mid-sequence error therefore produces
//! duplicate partial deliveries in the feed. That is a known limitation,
//! kept deliberately in line with the original behavior.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, warn};

use crate::error::{GatewayError, ModcastError, Result};
use crate::gateway::{notify_best_effort, MessagingGateway};
use crate::types::{Attachment, Post};

pub struct FeedPublisher {
    gateway: Arc<dyn MessagingGateway>,
    send_timeout: Duration,
    /// Chat that receives publish failure reports, when configured.
    operator_target: Option<String>,
}

impl FeedPublisher {
    pub fn new(
        gateway: Arc<dyn MessagingGateway>,
        send_timeout: Duration,
        operator_target: Option<String>,
    ) -> Self {
        Self {
            gateway,
            send_timeout,
            operator_target,
        }
    }

    pub fn operator_target(&self) -> Option<&str> {
        self.operator_target.as_deref()
    }

    /// Deliver the post's attachments and attribution to its bound feed.
    ///
    /// Does not transition the post; the caller marks it published only
    /// after this returns `Ok`.
    pub async fn publish(&self, post: &Post) -> Result<()> {
        let feed = match post.destination_feed.as_deref() {
            Some(feed) => feed,
            None => {
                warn!(post_id = post.id, "post has no destination feed, leaving for manual resolution");
                return Err(ModcastError::MissingDestination { post_id: post.id });
            }
        };

        for attachment in &post.content {
            if let Err(e) = self.send_attachment(feed, attachment).await {
                self.report_failure(post, feed, &e).await;
                return Err(e);
            }
        }

        let attribution = format!("Submitted by @{}", post.submitter_label);
        if let Err(e) = self.send_text(feed, &attribution).await {
            self.report_failure(post, feed, &e).await;
            return Err(e);
        }

        info!(post_id = post.id, feed = %feed, "post delivered to feed");
        Ok(())
    }

    async fn send_attachment(&self, feed: &str, attachment: &Attachment) -> Result<()> {
        match timeout(self.send_timeout, self.gateway.send_attachment(feed, attachment)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.send_timeout.as_secs()).into()),
        }
    }

    async fn send_text(&self, feed: &str, text: &str) -> Result<()> {
        match timeout(self.send_timeout, self.gateway.send_text(feed, text)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.send_timeout.as_secs()).into()),
        }
    }

    async fn report_failure(&self, post: &Post, feed: &str, error: &ModcastError) {
        warn!(post_id = post.id, feed = %feed, error = %error, "publish failed, post stays approved");
        if let Some(operator) = &self.operator_target {
            let text = format!(
                "Failed to publish post #{} to {}: {}",
                post.id, feed, error
            );
            notify_best_effort(self.gateway.as_ref(), operator, &text).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::{MockGateway, SentPayload};
    use crate::types::{AttachmentKind, PostStatus};
    use chrono::Utc;

    const OPERATOR: &str = "999";

    fn post(feed: Option<&str>, refs: &[&str]) -> Post {
        Post {
            id: 1,
            submitter_id: 10,
            submitter_label: "alice".to_string(),
            content: refs
                .iter()
                .map(|r| Attachment::new(AttachmentKind::Photo, *r))
                .collect(),
            status: PostStatus::Approved,
            destination_feed: feed.map(str::to_string),
            created_at: Utc::now(),
            scheduled_time: Some(Utc::now()),
            published_at: None,
        }
    }

    fn publisher(gateway: &MockGateway) -> FeedPublisher {
        FeedPublisher::new(
            Arc::new(gateway.clone()),
            Duration::from_secs(5),
            Some(OPERATOR.to_string()),
        )
    }

    #[tokio::test]
    async fn test_publish_sends_attachments_then_attribution() {
        let gateway = MockGateway::new();
        let result = publisher(&gateway).publish(&post(Some("@feed"), &["a", "b"])).await;
        assert!(result.is_ok());

        let sent = gateway.sent_to("@feed");
        assert_eq!(sent.len(), 3);
        assert!(matches!(&sent[0], SentPayload::Attachment(att) if att.reference == "a"));
        assert!(matches!(&sent[1], SentPayload::Attachment(att) if att.reference == "b"));
        assert_eq!(sent[2], SentPayload::Text("Submitted by @alice".to_string()));
    }

    #[tokio::test]
    async fn test_publish_missing_destination_has_no_side_effects() {
        let gateway = MockGateway::new();
        let result = publisher(&gateway).publish(&post(None, &["a"])).await;

        assert!(matches!(
            result,
            Err(ModcastError::MissingDestination { post_id: 1 })
        ));
        assert!(gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn test_publish_aborts_on_mid_sequence_failure() {
        let gateway = MockGateway::new().fail_attachment_ref("b");
        let result = publisher(&gateway)
            .publish(&post(Some("@feed"), &["a", "b", "c"]))
            .await;
        assert!(result.is_err());

        // First attachment went out, third was never attempted
        let feed_sends = gateway.sent_to("@feed");
        assert_eq!(feed_sends.len(), 1);
        assert!(matches!(&feed_sends[0], SentPayload::Attachment(att) if att.reference == "a"));

        // Operator got a failure report naming the destination
        let operator_msgs = gateway.sent_to(OPERATOR);
        assert_eq!(operator_msgs.len(), 1);
        assert!(matches!(&operator_msgs[0], SentPayload::Text(t) if t.contains("@feed")));
    }

    #[tokio::test]
    async fn test_publish_retry_restarts_from_first_attachment() {
        let gateway = MockGateway::new().fail_attachment_ref("b");
        let publisher = publisher(&gateway);
        let post = post(Some("@feed"), &["a", "b"]);

        assert!(publisher.publish(&post).await.is_err());
        assert!(publisher.publish(&post).await.is_err());

        // "a" delivered twice: the documented duplication risk
        let duplicates = gateway
            .sent_to("@feed")
            .iter()
            .filter(|p| matches!(p, SentPayload::Attachment(att) if att.reference == "a"))
            .count();
        assert_eq!(duplicates, 2);
    }

    #[tokio::test]
    async fn test_publish_attribution_failure_is_a_failure() {
        // All sends from ordinal 1 fail: the attachment lands, attribution does not
        let gateway = MockGateway::failing_from(1);
        let result = publisher(&gateway).publish(&post(Some("@feed"), &["a"])).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_publish_stalled_send_times_out() {
        let gateway = MockGateway::new().with_delay(Duration::from_millis(100));
        let publisher = FeedPublisher::new(
            Arc::new(gateway.clone()),
            Duration::from_millis(10),
            None,
        );

        let result = publisher.publish(&post(Some("@feed"), &["a"])).await;
        assert!(matches!(
            result,
            Err(ModcastError::Gateway(GatewayError::Timeout(_)))
        ));
    }
}
