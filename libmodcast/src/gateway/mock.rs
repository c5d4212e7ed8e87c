//! Mock gateway implementation for testing
//!
//! A configurable in-memory gateway that records every delivery and can
//! simulate failures and latency, so pipeline logic can be verified without
//! a real chat transport.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::error::{GatewayError, Result};
use crate::gateway::MessagingGateway;
use crate::types::{Attachment, Identity};

/// What a send delivered, in order of delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentItem {
    pub target: String,
    pub payload: SentPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentPayload {
    Text(String),
    Attachment(Attachment),
}

#[derive(Default)]
struct MockState {
    sent: Vec<SentItem>,
    deleted: Vec<(String, i64)>,
    send_count: usize,
    failing_refs: HashSet<String>,
}

/// Mock gateway for tests. Clones share recorded state.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
    /// Every send with a global ordinal >= this fails
    fail_all_from: Option<usize>,
    delay: Duration,
    operators: Vec<Identity>,
    feed_titles: HashMap<String, String>,
}

impl MockGateway {
    /// A gateway where every delivery succeeds and nobody is operator.
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway where every send at or after the given ordinal fails.
    pub fn failing_from(ordinal: usize) -> Self {
        Self {
            fail_all_from: Some(ordinal),
            ..Self::default()
        }
    }

    pub fn with_operator(mut self, operator: Identity) -> Self {
        self.operators.push(operator);
        self
    }

    pub fn with_feed_title(mut self, feed_id: &str, title: &str) -> Self {
        self.feed_titles.insert(feed_id.to_string(), title.to_string());
        self
    }

    /// Every attachment send with this reference fails, until cleared.
    pub fn fail_attachment_ref(self, reference: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_refs
            .insert(reference.to_string());
        self
    }

    pub fn clear_attachment_failures(&self) {
        self.state.lock().unwrap().failing_refs.clear();
    }

    /// Simulated transport latency per send.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn sent(&self) -> Vec<SentItem> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Payloads delivered to one target, in order.
    pub fn sent_to(&self, target: &str) -> Vec<SentPayload> {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|s| s.target == target)
            .map(|s| s.payload.clone())
            .collect()
    }

    pub fn deleted(&self) -> Vec<(String, i64)> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn send_count(&self) -> usize {
        self.state.lock().unwrap().send_count
    }

    fn record(&self, target: &str, payload: SentPayload, failing_ref: Option<&str>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let ordinal = state.send_count;
        state.send_count += 1;

        if let Some(from) = self.fail_all_from {
            if ordinal >= from {
                return Err(GatewayError::Send("mock send failure".to_string()).into());
            }
        }
        if let Some(reference) = failing_ref {
            if state.failing_refs.contains(reference) {
                return Err(GatewayError::Send(format!(
                    "mock failure delivering {reference}"
                ))
                .into());
            }
        }

        state.sent.push(SentItem {
            target: target.to_string(),
            payload,
        });
        Ok(())
    }
}

#[async_trait]
impl MessagingGateway for MockGateway {
    async fn send_text(&self, target: &str, text: &str) -> Result<()> {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.record(target, SentPayload::Text(text.to_string()), None)
    }

    async fn send_attachment(&self, target: &str, attachment: &Attachment) -> Result<()> {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.record(
            target,
            SentPayload::Attachment(attachment.clone()),
            Some(attachment.reference.as_str()),
        )
    }

    async fn delete_message(&self, target: &str, message_id: i64) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .deleted
            .push((target.to_string(), message_id));
        Ok(())
    }

    async fn feed_title(&self, feed_id: &str) -> Option<String> {
        self.feed_titles.get(feed_id).cloned()
    }

    fn is_operator(&self, identity: &Identity) -> bool {
        self.operators.iter().any(|op| {
            op.id == identity.id
                || (op.username.is_some() && op.username == identity.username)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttachmentKind;

    #[tokio::test]
    async fn test_mock_records_sends_in_order() {
        let gateway = MockGateway::new();
        gateway.send_text("a", "first").await.unwrap();
        gateway
            .send_attachment("a", &Attachment::new(AttachmentKind::Video, "file-1"))
            .await
            .unwrap();

        let sent = gateway.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].payload, SentPayload::Text("first".to_string()));
        assert!(matches!(sent[1].payload, SentPayload::Attachment(_)));
    }

    #[tokio::test]
    async fn test_failing_from_ordinal() {
        let gateway = MockGateway::failing_from(1);
        assert!(gateway.send_text("a", "ok").await.is_ok());
        assert!(gateway.send_text("a", "fails").await.is_err());
        assert_eq!(gateway.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_attachment_ref() {
        let gateway = MockGateway::new().fail_attachment_ref("bad");
        let good = Attachment::new(AttachmentKind::Photo, "good");
        let bad = Attachment::new(AttachmentKind::Photo, "bad");

        assert!(gateway.send_attachment("f", &good).await.is_ok());
        assert!(gateway.send_attachment("f", &bad).await.is_err());

        gateway.clear_attachment_failures();
        assert!(gateway.send_attachment("f", &bad).await.is_ok());
    }

    #[tokio::test]
    async fn test_is_operator_by_id_or_username() {
        let gateway = MockGateway::new().with_operator(Identity::with_username(1, "mod"));

        assert!(gateway.is_operator(&Identity::new(1)));
        assert!(gateway.is_operator(&Identity::with_username(99, "mod")));
        assert!(!gateway.is_operator(&Identity::with_username(99, "rando")));
    }

    #[tokio::test]
    async fn test_feed_title_lookup() {
        let gateway = MockGateway::new().with_feed_title("@feed", "The Feed");
        assert_eq!(gateway.feed_title("@feed").await.as_deref(), Some("The Feed"));
        assert_eq!(gateway.feed_title("@unknown").await, None);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let gateway = MockGateway::new();
        let clone = gateway.clone();
        clone.send_text("a", "hello").await.unwrap();
        assert_eq!(gateway.send_count(), 1);
    }
}
