//! # Suspension Channel
//!
//! Realtime notification channel for metro line suspensions. One
//! [`SuspensionChannel`] keeps a single broker subscription, decodes the
//! suspension broadcasts it receives and exposes a decaying alert state:
//! an alert is cleared automatically once it has gone 30 seconds without
//! being replaced.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐   Input queue   ┌──────────────────────────┐
//! │ SuspensionChannel    │────────────────>│ Worker (single loop)     │
//! │ connect/disconnect   │                 │  ├─ ProtocolClient       │
//! └──────────────────────┘                 │  ├─ decoder              │
//!           │                              │  └─ ExpiryScheduler      │
//!           │ get_state/subscribe          └────────────┬─────────────┘
//!           v                                           │ mutations
//! ┌──────────────────────┐                              │
//! │ AlertStore           │<─────────────────────────────┘
//! │ {suspension,         │──> listeners (registration order)
//! │  connection_state,   │
//! │  last_error}         │
//! └──────────────────────┘
//! ```
//!
//! Errors never escape `connect`/`disconnect`; they are recorded in
//! [`AlertState::last_error`] and the connection state. Reconnecting is the
//! caller's decision.
//!
//! ## Example
//!
//! ```rust,no_run
//! use suspension_channel::{ChannelConfig, SuspensionChannel};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = SuspensionChannel::connect_stomp(ChannelConfig::new("ws://localhost:8080/ws"))?;
//! channel.connect();
//!
//! for change in channel.changes() {
//!     if let Some(suspension) = &change.state.suspension {
//!         println!("{}: {}", suspension.metro_line_id, suspension.title);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod alert;
pub mod config;
pub mod decoder;
pub mod error;
mod expiry;
pub mod logging;
pub mod manager;
pub mod model;
pub mod stomp;
pub mod testing;
pub mod transport;
mod worker;

pub use alert::AlertStore;
pub use config::{ChannelConfig, DEFAULT_ALERT_TTL, DEFAULT_TOPIC};
pub use decoder::decode_suspension;
pub use error::{ChannelError, ClientError, ConfigError, DecodeError, Result};
pub use manager::SuspensionChannel;
pub use model::{
    AlertState, ConnectionState, ErrorKind, LastError, MetroLineId, Suspension, SuspensionId,
    SuspensionType,
};
pub use stomp::{StompClientFactory, StompProtocolClient};
pub use transport::{ClientEvent, ClientFactory, EventSink, ProtocolClient};

pub use state_store::{ChangeEvent, ChangeIterator, Unsubscribe};
