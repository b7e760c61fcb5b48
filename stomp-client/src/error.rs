//! Error types for the STOMP client

use std::time::Duration;
use thiserror::Error;

/// Errors produced while decoding a STOMP frame
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The command line is not a STOMP 1.2 command
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// A header line has no `:` separator
    #[error("Malformed header line: {0}")]
    MalformedHeader(String),

    /// A header contains an escape sequence STOMP 1.2 does not define
    #[error("Invalid escape sequence in header: {0}")]
    InvalidEscape(String),

    /// The `content-length` header is not a valid byte count
    #[error("Invalid content-length: {0}")]
    InvalidContentLength(String),

    /// The frame ended before the header block or body was complete
    #[error("Frame is truncated")]
    Truncated,

    /// No NUL octet after the body
    #[error("Frame is missing its NUL terminator")]
    MissingTerminator,

    /// Command, headers or body are not UTF-8
    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,

    /// A heart-beat header value is not `<ms>,<ms>`
    #[error("Invalid heart-beat header: {0}")]
    InvalidHeartBeat(String),
}

/// Errors that can occur during a STOMP session
#[derive(Debug, Error)]
pub enum StompError {
    /// The broker URL cannot be used for a WebSocket session
    #[error("Invalid broker URL: {0}")]
    InvalidUrl(String),

    /// Network or WebSocket failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// No CONNECTED frame arrived in time
    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// The broker answered CONNECT with an ERROR frame
    #[error("Broker rejected connection: {0}")]
    Rejected(String),

    /// The broker sent something other than CONNECTED during the handshake
    #[error("Unexpected {0} frame during handshake")]
    UnexpectedFrame(String),

    /// A frame could not be decoded
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// The session task is no longer running
    #[error("Session closed")]
    SessionClosed,
}

impl StompError {
    /// Whether the error originates from the STOMP layer rather than the
    /// network underneath it
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            StompError::Rejected(_) | StompError::UnexpectedFrame(_) | StompError::Frame(_)
        )
    }
}

/// Result type for STOMP operations
pub type Result<T> = std::result::Result<T, StompError>;
