//! Error types for the suspension channel

use thiserror::Error;

/// Errors raised while building or starting a channel
///
/// Runtime failures (broker unreachable, bad payloads) never surface here;
/// they are recorded in the alert state instead.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Invalid channel configuration: {0}")]
    Config(#[from] ConfigError),

    /// `spawn` was called outside a Tokio runtime
    #[error("No Tokio runtime available: {0}")]
    NoRuntime(String),

    /// The dedicated worker thread or its runtime could not be created
    #[error("Failed to start channel worker: {0}")]
    WorkerStart(#[from] std::io::Error),
}

/// Configuration problems found by `ChannelConfig::validate` or `from_env`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid broker URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Broker URL must use ws or wss, got '{0}'")]
    UnsupportedScheme(String),

    #[error("Topic must not be empty")]
    EmptyTopic,

    #[error("{0} must be greater than 0")]
    ZeroDuration(&'static str),

    #[error("Invalid value for {name}: '{value}'")]
    InvalidEnv { name: String, value: String },
}

/// Why an inbound payload is not a valid suspension
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not well-formed JSON
    #[error("Malformed suspension payload: {0}")]
    Malformed(String),

    /// Well-formed JSON that does not match the suspension schema
    #[error("Suspension payload does not match schema: {0}")]
    Schema(String),

    #[error("Invalid suspension field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        use serde_json::error::Category;

        match err.classify() {
            Category::Data => DecodeError::Schema(err.to_string()),
            Category::Syntax | Category::Eof | Category::Io => DecodeError::Malformed(err.to_string()),
        }
    }
}

/// Failures reported synchronously by a `ProtocolClient`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    Protocol(String),
}

impl From<stomp_client::StompError> for ClientError {
    fn from(err: stomp_client::StompError) -> Self {
        if err.is_protocol() {
            ClientError::Protocol(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

/// Result type for channel construction
pub type Result<T> = std::result::Result<T, ChannelError>;
