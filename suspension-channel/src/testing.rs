//! In-memory protocol client for tests and demos
//!
//! `MockBroker` is a `ClientFactory` that records what the channel asks of
//! each client and keeps the `EventSink`s so a test can play the broker's
//! side by emitting events directly.
//!
//! ```rust,ignore
//! let broker = MockBroker::new();
//! let channel = SuspensionChannel::spawn(ChannelConfig::default(), broker.clone())?;
//!
//! channel.connect();
//! // ...let the worker run...
//! broker.emit(ClientEvent::Connected);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ChannelConfig;
use crate::error::ClientError;
use crate::transport::{ClientEvent, ClientFactory, EventSink, ProtocolClient};

#[derive(Debug, Default)]
struct ClientRecord {
    sink: Option<EventSink>,
    subscriptions: Vec<String>,
    disconnected: bool,
}

#[derive(Debug, Default)]
struct BrokerState {
    clients: Vec<ClientRecord>,
    fail_connect: Option<ClientError>,
    fail_subscribe: Option<ClientError>,
}

/// Factory of recording clients; clones share the same record
#[derive(Debug, Clone, Default)]
pub struct MockBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `connect` call fail synchronously
    pub fn fail_next_connect(&self, error: ClientError) {
        self.state.lock().fail_connect = Some(error);
    }

    /// Make the next `subscribe` call fail synchronously
    pub fn fail_next_subscribe(&self, error: ClientError) {
        self.state.lock().fail_subscribe = Some(error);
    }

    /// Number of clients asked to connect
    pub fn connect_count(&self) -> usize {
        self.state
            .lock()
            .clients
            .iter()
            .filter(|c| c.sink.is_some())
            .count()
    }

    /// Number of clients told to disconnect
    pub fn disconnect_count(&self) -> usize {
        self.state
            .lock()
            .clients
            .iter()
            .filter(|c| c.disconnected)
            .count()
    }

    /// Subscriptions held by clients that have not been disconnected
    pub fn active_subscriptions(&self) -> Vec<String> {
        self.state
            .lock()
            .clients
            .iter()
            .filter(|c| !c.disconnected)
            .flat_map(|c| c.subscriptions.iter().cloned())
            .collect()
    }

    /// Sink handed to the `index`th client
    pub fn sink(&self, index: usize) -> Option<EventSink> {
        self.state
            .lock()
            .clients
            .get(index)
            .and_then(|c| c.sink.clone())
    }

    /// Sink handed to the most recent client
    pub fn last_sink(&self) -> Option<EventSink> {
        self.state
            .lock()
            .clients
            .iter()
            .rev()
            .find_map(|c| c.sink.clone())
    }

    /// Emit through the most recent client's sink
    ///
    /// Returns false if no client connected yet or the channel stopped.
    pub fn emit(&self, event: ClientEvent) -> bool {
        match self.last_sink() {
            Some(sink) => sink.emit(event),
            None => false,
        }
    }

    /// Deliver a message on `destination` through the most recent client
    pub fn publish(&self, destination: &str, body: &str) -> bool {
        self.emit(ClientEvent::Message {
            destination: destination.to_string(),
            body: body.to_string(),
        })
    }
}

impl ClientFactory for MockBroker {
    fn create(&self, _config: &ChannelConfig) -> Box<dyn ProtocolClient> {
        let index = {
            let mut state = self.state.lock();
            state.clients.push(ClientRecord::default());
            state.clients.len() - 1
        };
        Box::new(MockClient {
            index,
            state: self.state.clone(),
        })
    }
}

struct MockClient {
    index: usize,
    state: Arc<Mutex<BrokerState>>,
}

impl MockClient {
    fn with_record<R>(&self, f: impl FnOnce(&mut ClientRecord) -> R) -> Option<R> {
        self.state.lock().clients.get_mut(self.index).map(f)
    }
}

impl ProtocolClient for MockClient {
    fn connect(&mut self, sink: EventSink) -> Result<(), ClientError> {
        let failure = self.state.lock().fail_connect.take();
        self.with_record(|record| record.sink = Some(sink));
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), ClientError> {
        if let Some(error) = self.state.lock().fail_subscribe.take() {
            return Err(error);
        }
        self.with_record(|record| record.subscriptions.push(topic.to_string()));
        Ok(())
    }

    fn disconnect(&mut self) {
        self.with_record(|record| record.disconnected = true);
    }
}
