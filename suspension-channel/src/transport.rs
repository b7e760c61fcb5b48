//! Protocol client boundary
//!
//! The channel drives any publish/subscribe client through the four
//! operations of `ProtocolClient`. Clients report back through an
//! `EventSink`, which stamps each event with the session generation it
//! was handed out for so the channel can drop events from torn-down
//! sessions.

use tokio::sync::mpsc;

use crate::config::ChannelConfig;
use crate::error::ClientError;
use crate::worker::Input;

/// Events a protocol client reports about its session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Handshake completed
    Connected,

    /// Application message delivered on a subscribed topic
    Message { destination: String, body: String },

    /// Network failure, refused connection or lost heart-beat
    TransportError(String),

    /// The broker rejected the session or sent an ERROR frame
    ProtocolError(String),

    /// Clean close, from either side
    Closed,
}

/// Callback target handed to `ProtocolClient::connect`
///
/// Cheap to clone. Events emitted after the channel moved on to another
/// session, or shut down, are discarded.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    inputs: mpsc::UnboundedSender<Input>,
}

impl EventSink {
    pub(crate) fn new(generation: u64, inputs: mpsc::UnboundedSender<Input>) -> Self {
        Self { generation, inputs }
    }

    /// Session generation this sink belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver an event to the channel
    ///
    /// Returns false once the channel worker has stopped.
    pub fn emit(&self, event: ClientEvent) -> bool {
        self.inputs
            .send(Input::Client {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// Connection to a publish/subscribe broker
///
/// Methods are called from the channel worker and must not block; results
/// arrive later through the `EventSink`.
pub trait ProtocolClient: Send {
    /// Start the handshake; report `Connected` or an error through `sink`
    fn connect(&mut self, sink: EventSink) -> Result<(), ClientError>;

    /// Subscribe to `topic`; only valid after `Connected`
    fn subscribe(&mut self, topic: &str) -> Result<(), ClientError>;

    /// Unsubscribe and close gracefully; safe to call at any time
    fn disconnect(&mut self);
}

/// Creates a fresh client for every connect attempt
pub trait ClientFactory: Send + 'static {
    fn create(&self, config: &ChannelConfig) -> Box<dyn ProtocolClient>;
}

impl<F> ClientFactory for F
where
    F: Fn(&ChannelConfig) -> Box<dyn ProtocolClient> + Send + 'static,
{
    fn create(&self, config: &ChannelConfig) -> Box<dyn ProtocolClient> {
        self(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_stamps_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(7, tx);

        assert!(sink.emit(ClientEvent::Connected));
        match rx.try_recv().unwrap() {
            Input::Client { generation, event } => {
                assert_eq!(generation, 7);
                assert_eq!(event, ClientEvent::Connected);
            }
            other => panic!("Unexpected input {other:?}"),
        }
    }

    #[test]
    fn test_sink_reports_stopped_worker() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(1, tx);
        drop(rx);

        assert!(!sink.emit(ClientEvent::Closed));
    }

    #[test]
    fn test_closure_factory() {
        struct Inert;

        impl ProtocolClient for Inert {
            fn connect(&mut self, _sink: EventSink) -> Result<(), ClientError> {
                Ok(())
            }
            fn subscribe(&mut self, _topic: &str) -> Result<(), ClientError> {
                Ok(())
            }
            fn disconnect(&mut self) {}
        }

        let factory = |_config: &ChannelConfig| -> Box<dyn ProtocolClient> { Box::new(Inert) };
        let mut client = factory.create(&ChannelConfig::default());
        assert!(client.subscribe("/topic/x").is_ok());
    }
}
