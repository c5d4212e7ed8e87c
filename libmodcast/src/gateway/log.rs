//! Tracing-backed gateway for running the daemon without a chat transport
//!
//! Every delivery is emitted to the log instead of a real transport. Useful
//! for dry runs and for operating the scheduler while the transport side is
//! deployed separately. The operator check is driven by the configured
//! operator identity.

use async_trait::async_trait;
use tracing::info;

use crate::config::OperatorConfig;
use crate::error::Result;
use crate::gateway::MessagingGateway;
use crate::types::{Attachment, Identity};

pub struct LogGateway {
    operator: OperatorConfig,
}

impl LogGateway {
    pub fn new(operator: OperatorConfig) -> Self {
        Self { operator }
    }
}

#[async_trait]
impl MessagingGateway for LogGateway {
    async fn send_text(&self, target: &str, text: &str) -> Result<()> {
        info!(recipient = %target, text = %text, "send_text");
        Ok(())
    }

    async fn send_attachment(&self, target: &str, attachment: &Attachment) -> Result<()> {
        info!(
            recipient = %target,
            kind = %attachment.kind,
            reference = %attachment.reference,
            "send_attachment"
        );
        Ok(())
    }

    async fn delete_message(&self, target: &str, message_id: i64) -> Result<()> {
        info!(recipient = %target, message_id, "delete_message");
        Ok(())
    }

    async fn feed_title(&self, _feed_id: &str) -> Option<String> {
        None
    }

    fn is_operator(&self, identity: &Identity) -> bool {
        if let Some(id) = self.operator.id {
            if id == identity.id {
                return true;
            }
        }
        match (&self.operator.username, &identity.username) {
            (Some(configured), Some(actual)) => configured == actual,
            _ => false,
        }
    }
}
