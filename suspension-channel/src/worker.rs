//! Channel worker - the single event loop behind `SuspensionChannel`
//!
//! Every input (API command, client event, expiry fire) goes through one
//! queue and is handled to completion before the next, so state changes
//! never interleave. Client events carry the generation of the session
//! they came from and expiry fires carry their ticket; both are checked
//! before anything is mutated.

use tokio::sync::mpsc;

use crate::alert::AlertStore;
use crate::config::ChannelConfig;
use crate::decoder::decode_suspension;
use crate::error::ClientError;
use crate::expiry::ExpiryScheduler;
use crate::model::{ConnectionState, LastError};
use crate::transport::{ClientEvent, ClientFactory, EventSink, ProtocolClient};

/// Everything the worker reacts to
#[derive(Debug)]
pub(crate) enum Input {
    /// `SuspensionChannel::connect`
    Connect,
    /// `SuspensionChannel::disconnect`
    Disconnect,
    /// Stop the worker
    Shutdown,
    /// Event reported by the client of session `generation`
    Client { generation: u64, event: ClientEvent },
    /// Expiry timer armed with `ticket` fired
    Expired { ticket: u64 },
}

/// The live session and the generation it was created for
struct Session {
    generation: u64,
    client: Box<dyn ProtocolClient>,
}

pub(crate) struct Worker {
    config: ChannelConfig,
    factory: Box<dyn ClientFactory>,
    store: AlertStore,
    expiry: ExpiryScheduler,
    inputs: mpsc::UnboundedSender<Input>,
    session: Option<Session>,
    generation: u64,
}

impl Worker {
    pub(crate) fn new(
        config: ChannelConfig,
        factory: Box<dyn ClientFactory>,
        store: AlertStore,
        inputs: mpsc::UnboundedSender<Input>,
    ) -> Self {
        Self {
            config,
            factory,
            store,
            expiry: ExpiryScheduler::new(inputs.clone()),
            inputs,
            session: None,
            generation: 0,
        }
    }

    /// Main loop; runs until `Shutdown` or every sender is gone
    pub(crate) async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<Input>) {
        tracing::debug!("Suspension channel worker started for topic {}", self.config.topic);

        while let Some(input) = inputs.recv().await {
            if !self.handle(input) {
                break;
            }
        }

        self.teardown();
        tracing::debug!("Suspension channel worker stopped");
    }

    /// Apply one input; returns false when the worker should stop
    pub(crate) fn handle(&mut self, input: Input) -> bool {
        match input {
            Input::Connect => self.connect(),
            Input::Disconnect => self.disconnect(),
            Input::Shutdown => {
                tracing::debug!("Worker received shutdown");
                return false;
            }
            Input::Client { generation, event } => self.on_client_event(generation, event),
            Input::Expired { ticket } => self.on_expired(ticket),
        }
        true
    }

    fn connect(&mut self) {
        let state = self.store.connection_state();
        if matches!(state, ConnectionState::Connected | ConnectionState::Connecting) {
            tracing::debug!("connect() ignored: channel is already {}", state);
            return;
        }

        // An errored session is already gone, but never keep two around
        if let Some(mut stale) = self.session.take() {
            stale.client.disconnect();
        }

        self.generation += 1;
        let generation = self.generation;
        tracing::info!(
            "Connecting to {} (session {})",
            self.config.broker_url,
            generation
        );

        self.store.apply(|state| {
            state.connection_state = ConnectionState::Connecting;
            state.last_error = None;
        });

        let mut client = self.factory.create(&self.config);
        match client.connect(EventSink::new(generation, self.inputs.clone())) {
            Ok(()) => self.session = Some(Session { generation, client }),
            Err(e) => {
                tracing::warn!("Connect failed: {}", e);
                self.fail(e.into());
            }
        }
    }

    fn disconnect(&mut self) {
        let idle = self.session.is_none()
            && !self.expiry.is_armed()
            && self.store.read(|state| {
                state.suspension.is_none()
                    && state.connection_state == ConnectionState::Disconnected
            });
        if idle {
            tracing::debug!("disconnect() ignored: channel is already disconnected");
            return;
        }

        if let Some(mut session) = self.session.take() {
            tracing::info!("Disconnecting session {}", session.generation);
            session.client.disconnect();
        }
        self.expiry.cancel();

        self.store.apply(|state| {
            state.suspension = None;
            state.connection_state = ConnectionState::Disconnected;
        });
    }

    fn on_client_event(&mut self, generation: u64, event: ClientEvent) {
        let current = self.session.as_ref().map(|s| s.generation);
        if current != Some(generation) {
            tracing::trace!(
                "Dropping {:?} from stale session {} (current {:?})",
                event,
                generation,
                current
            );
            return;
        }

        match event {
            ClientEvent::Connected => self.on_connected(),
            ClientEvent::Message { destination, body } => self.on_message(&destination, &body),
            ClientEvent::TransportError(message) => {
                tracing::warn!("Transport error: {}", message);
                self.fail(LastError::transport(message));
            }
            ClientEvent::ProtocolError(message) => {
                tracing::warn!("Protocol error: {}", message);
                self.fail(LastError::protocol(message));
            }
            ClientEvent::Closed => {
                tracing::info!("Session {} closed", generation);
                self.session = None;
                self.store.set_connection_state(ConnectionState::Disconnected);
            }
        }
    }

    fn on_connected(&mut self) {
        if self.store.connection_state() == ConnectionState::Connected {
            tracing::debug!("Duplicate Connected event ignored");
            return;
        }

        let topic = self.config.topic.clone();
        let subscribed = match self.session.as_mut() {
            Some(session) => session.client.subscribe(&topic),
            None => return,
        };

        match subscribed {
            Ok(()) => {
                tracing::info!("Connected, subscribed to {}", topic);
                self.store.set_connection_state(ConnectionState::Connected);
            }
            Err(e) => {
                tracing::warn!("Subscribe to {} failed: {}", topic, e);
                self.fail(e.into());
            }
        }
    }

    fn on_message(&mut self, destination: &str, body: &str) {
        if destination != self.config.topic {
            tracing::debug!("Ignoring message for {}", destination);
            return;
        }

        match decode_suspension(body) {
            Ok(suspension) => {
                tracing::debug!(
                    "Suspension {} on line {} ({})",
                    suspension.id,
                    suspension.metro_line_id,
                    suspension.suspension_type
                );
                self.store.set_suspension(Some(suspension));
                self.expiry.arm(self.config.alert_ttl);
            }
            Err(e) => {
                // The current alert stays as it is
                tracing::warn!("Dropping undecodable message: {}", e);
                self.store.set_error(Some(LastError::decode(e.to_string())));
            }
        }
    }

    fn on_expired(&mut self, ticket: u64) {
        if !self.expiry.fire(ticket) {
            tracing::trace!("Ignoring stale expiry ticket {}", ticket);
            return;
        }

        tracing::debug!("Alert expired after {:?}", self.config.alert_ttl);
        self.store.set_suspension(None);
    }

    /// Drop the session and record the failure; the suspension and its
    /// timer are left alone
    fn fail(&mut self, error: LastError) {
        if let Some(mut session) = self.session.take() {
            session.client.disconnect();
        }

        self.store.apply(|state| {
            state.connection_state = ConnectionState::Error;
            state.last_error = Some(error);
        });
    }

    fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.client.disconnect();
        }
        self.expiry.cancel();
    }
}

impl From<ClientError> for LastError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Transport(message) => LastError::transport(message),
            ClientError::Protocol(message) => LastError::protocol(message),
        }
    }
}
