//! # STOMP over WebSocket client
//!
//! A small STOMP 1.2 client for consuming broker topics over a WebSocket
//! connection. It covers the subset a subscriber needs: CONNECT with
//! heart-beat negotiation, SUBSCRIBE/UNSUBSCRIBE, MESSAGE delivery and a
//! receipted DISCONNECT.
//!
//! Each session runs as its own Tokio task. The [`StompHandle`] sends it
//! commands and a channel of [`SessionEvent`]s reports what happens, ending
//! with exactly one terminal event.
//!
//! ```text
//! ┌──────────────┐  commands   ┌──────────────┐  ws frames  ┌────────┐
//! │ StompHandle  │────────────>│ session task │<───────────>│ broker │
//! └──────────────┘             └──────────────┘             └────────┘
//!         ^                           │
//!         └──────── SessionEvent ─────┘
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod frame;
pub mod heartbeat;
mod session;

pub use client::{SessionEvent, StompClient, StompHandle, SubscriptionId};
pub use config::StompConfig;
pub use error::{FrameError, Result, StompError};
pub use frame::{Command, Frame, Inbound};
pub use heartbeat::{HeartBeat, Negotiated};
