//! Error types for Modcast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModcastError>;

#[derive(Error, Debug)]
pub enum ModcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("No destination feed is configured")]
    NoDestinationConfigured,

    #[error("Post {post_id} has no destination feed bound")]
    MissingDestination { post_id: u64 },

    #[error("Operation requires operator privileges")]
    PermissionDenied,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ModcastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ModcastError::Config(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Errors while persisting a snapshot.
///
/// Load-time corruption is deliberately not represented here: a missing or
/// unreadable store falls back to empty state and is only logged.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("Send failed: {0}")]
    Send(String),

    #[error("Send timed out after {0}s")]
    Timeout(u64),

    #[error("Target unreachable: {0}")]
    Unreachable(String),
}
