//! Public client handle and session events

use std::fmt;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::StompConfig;
use crate::error::{Result, StompError};
use crate::session;

/// Identifier of one SUBSCRIBE on a session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub(crate) fn generate() -> Self {
        Self(format!("sub-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events reported by a running session
///
/// Exactly one terminal event (`TransportError`, `ProtocolError` or
/// `Closed`) is sent before the event channel closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The broker accepted CONNECT
    Connected {
        version: Option<String>,
        server: Option<String>,
    },

    /// A MESSAGE frame for one of our subscriptions
    Message {
        subscription: SubscriptionId,
        destination: String,
        message_id: Option<String>,
        body: String,
    },

    /// Network failure, refused connection or heart-beat timeout
    TransportError(String),

    /// ERROR frame or a handshake the broker did not complete properly
    ProtocolError(String),

    /// The session ended cleanly, from either side
    Closed,
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::TransportError(_) | SessionEvent::ProtocolError(_) | SessionEvent::Closed
        )
    }

    pub(crate) fn from_error(error: StompError) -> Self {
        if error.is_protocol() {
            SessionEvent::ProtocolError(error.to_string())
        } else {
            SessionEvent::TransportError(error.to_string())
        }
    }
}

/// Commands the handle sends to the session task
#[derive(Debug)]
pub(crate) enum SessionCommand {
    Subscribe {
        id: SubscriptionId,
        destination: String,
    },
    Unsubscribe {
        id: SubscriptionId,
    },
    Disconnect,
}

/// STOMP over WebSocket client
///
/// # Example
///
/// ```no_run
/// use stomp_client::{SessionEvent, StompClient, StompConfig};
///
/// # async fn run() -> stomp_client::Result<()> {
/// let config = StompConfig::parse("ws://localhost:8080/ws")?;
/// let (handle, mut events) = StompClient::new(config).spawn();
///
/// while let Some(event) = events.recv().await {
///     match event {
///         SessionEvent::Connected { .. } => {
///             handle.subscribe("/topic/line-suspensions")?;
///         }
///         SessionEvent::Message { body, .. } => println!("{body}"),
///         other if other.is_terminal() => break,
///         _ => {}
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct StompClient {
    config: StompConfig,
}

impl StompClient {
    pub fn new(config: StompConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StompConfig {
        &self.config
    }

    /// Start the session task
    ///
    /// Returns immediately; the outcome of the handshake arrives on the
    /// event channel. Must be called from within a Tokio runtime.
    pub fn spawn(self) -> (StompHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tracing::debug!("Starting STOMP session to {}", self.config.url);
        let task = tokio::spawn(session::run(self.config, command_rx, event_tx));

        (
            StompHandle {
                commands: command_tx,
                task,
            },
            event_rx,
        )
    }
}

/// Control handle for a running session
///
/// Dropping the handle closes the session gracefully.
#[derive(Debug)]
pub struct StompHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    task: JoinHandle<()>,
}

impl StompHandle {
    /// Subscribe to a destination
    ///
    /// Commands issued before the handshake completes are queued and sent
    /// once the session is connected.
    pub fn subscribe(&self, destination: impl Into<String>) -> Result<SubscriptionId> {
        let id = SubscriptionId::generate();
        self.send(SessionCommand::Subscribe {
            id: id.clone(),
            destination: destination.into(),
        })?;
        Ok(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        self.send(SessionCommand::Unsubscribe { id })
    }

    /// Unsubscribe everything, send DISCONNECT and close the socket
    pub fn disconnect(&self) -> Result<()> {
        self.send(SessionCommand::Disconnect)
    }

    /// Whether the session task has ended
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the session task without a goodbye
    pub fn abort(&self) {
        self.task.abort();
    }

    fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| StompError::SessionClosed)
    }
}
