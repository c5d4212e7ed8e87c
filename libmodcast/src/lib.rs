//! Modcast - moderation-and-publishing pipeline for user-submitted media
//!
//! This library provides the post lifecycle state machine, the moderation
//! queue, and the publishing scheduler that delivers approved posts to a
//! destination feed at their scheduled time.

pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod moderation;
pub mod publisher;
pub mod repo;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{ModcastError, Result};
pub use gateway::MessagingGateway;
pub use moderation::ScheduleChoice;
pub use repo::Repository;
pub use scheduler::Scheduler;
pub use service::ModcastService;
pub use store::SnapshotStore;
pub use types::{Attachment, AttachmentKind, Feed, Identity, Post, PostStatus};
