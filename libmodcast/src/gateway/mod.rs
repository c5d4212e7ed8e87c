//! Messaging gateway abstraction
//!
//! The chat transport (receiving submissions, rendering menus, delivering
//! media) lives outside this crate. The pipeline only needs the thin
//! capability surface below: sending text and media to a target, best-effort
//! message deletion and feed metadata lookup, and the single privileged
//! operator check.
//!
//! Targets are transport-side addresses as strings: a submitter's chat id,
//! a feed handle like `@channel`, or the operator's chat.

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::types::{Attachment, Identity};

pub mod log;
// Mock gateway is available for all builds (not just tests) to support
// integration tests
pub mod mock;

pub use log::LogGateway;
pub use mock::{MockGateway, SentItem};

/// Capability surface the pipeline requires from the chat transport.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Deliver a plain text message to a target.
    async fn send_text(&self, target: &str, text: &str) -> Result<()>;

    /// Deliver one media attachment to a target, dispatched on its kind.
    async fn send_attachment(&self, target: &str, attachment: &Attachment) -> Result<()>;

    /// Remove a previously sent message. Callers treat failure as
    /// best-effort and swallow it.
    async fn delete_message(&self, target: &str, message_id: i64) -> Result<()>;

    /// Look up the display title of a feed. `None` when the transport cannot
    /// resolve it; callers fall back to the feed id.
    async fn feed_title(&self, feed_id: &str) -> Option<String>;

    /// Whether this identity is the configured privileged operator.
    fn is_operator(&self, identity: &Identity) -> bool;
}

/// Send a message whose delivery must never block the owning operation.
///
/// Errors are logged at debug level and never propagated: a submitter who
/// blocked the bot must not stop their post from being rejected, and a
/// missing operator chat must not stop a publish.
pub async fn notify_best_effort(gateway: &dyn MessagingGateway, target: &str, text: &str) {
    if let Err(e) = gateway.send_text(target, text).await {
        debug!(recipient = %target, error = %e, "best-effort notification dropped");
    }
}
