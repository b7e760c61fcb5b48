//! Suspension Channel Manager
//!
//! The one object the application builds to receive line suspensions. It
//! owns the worker that owns the protocol client; callers only enqueue
//! commands and read the alert store.

use std::thread;

use state_store::{ChangeIterator, Unsubscribe};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::alert::AlertStore;
use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};
use crate::model::AlertState;
use crate::stomp::StompClientFactory;
use crate::transport::ClientFactory;
use crate::worker::{Input, Worker};

enum WorkerHandle {
    /// Task on the caller's runtime
    Task(JoinHandle<()>),
    /// Dedicated thread with its own single-threaded runtime
    Thread(thread::JoinHandle<()>),
}

/// Realtime line-suspension channel
///
/// Build one per application and share it by reference. `connect` and
/// `disconnect` return immediately; outcomes show up in the alert state.
///
/// # Example
///
/// ```rust,ignore
/// use suspension_channel::{ChannelConfig, SuspensionChannel};
///
/// let channel = SuspensionChannel::connect_stomp(ChannelConfig::from_env()?)?;
///
/// let banner = channel.subscribe(|state| match &state.suspension {
///     Some(s) => println!("Line {} suspended: {}", s.metro_line_id, s.title),
///     None => println!("All lines running"),
/// });
///
/// channel.connect();
/// // ...
/// channel.disconnect();
/// banner.unsubscribe();
/// ```
pub struct SuspensionChannel {
    inputs: mpsc::UnboundedSender<Input>,
    store: AlertStore,
    worker: Option<WorkerHandle>,
}

impl SuspensionChannel {
    /// Start the worker as a task on the current Tokio runtime
    pub fn spawn(config: ChannelConfig, factory: impl ClientFactory) -> Result<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ChannelError::NoRuntime(e.to_string()))?;

        let (inputs, rx) = mpsc::unbounded_channel();
        let store = AlertStore::new();
        let worker = Worker::new(config, Box::new(factory), store.clone(), inputs.clone());

        let task = runtime.spawn(worker.run(rx));

        Ok(Self {
            inputs,
            store,
            worker: Some(WorkerHandle::Task(task)),
        })
    }

    /// Start the worker on a dedicated thread
    ///
    /// For applications without a Tokio runtime of their own. The thread
    /// runs a single-threaded runtime until `shutdown` or drop.
    pub fn with_worker_thread(config: ChannelConfig, factory: impl ClientFactory) -> Result<Self> {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (inputs, rx) = mpsc::unbounded_channel();
        let store = AlertStore::new();
        let worker = Worker::new(config, Box::new(factory), store.clone(), inputs.clone());

        let thread = thread::Builder::new()
            .name("suspension-channel".to_string())
            .spawn(move || runtime.block_on(worker.run(rx)))?;

        Ok(Self {
            inputs,
            store,
            worker: Some(WorkerHandle::Thread(thread)),
        })
    }

    /// `with_worker_thread` using the STOMP client
    pub fn connect_stomp(config: ChannelConfig) -> Result<Self> {
        Self::with_worker_thread(config, StompClientFactory)
    }

    /// Open the broker session if there is none
    ///
    /// No-op while connected or connecting. Never fails; see
    /// `AlertState::connection_state` and `last_error` for the outcome.
    pub fn connect(&self) {
        self.send(Input::Connect);
    }

    /// Close the session, cancel the expiry timer and clear the alert
    ///
    /// No-op when already disconnected with nothing to clear.
    pub fn disconnect(&self) {
        self.send(Input::Disconnect);
    }

    /// Snapshot of the alert state
    pub fn get_state(&self) -> AlertState {
        self.store.get_state()
    }

    /// Register a listener called after every state change
    pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&AlertState) + Send + Sync + 'static,
    {
        self.store.subscribe(listener)
    }

    /// Blocking iterator over state changes
    pub fn changes(&self) -> ChangeIterator<AlertState> {
        self.store.changes()
    }

    pub fn store(&self) -> &AlertStore {
        &self.store
    }

    /// Whether the worker is still running
    pub fn is_running(&self) -> bool {
        match &self.worker {
            Some(WorkerHandle::Task(task)) => !task.is_finished(),
            Some(WorkerHandle::Thread(thread)) => !thread.is_finished(),
            None => false,
        }
    }

    /// Stop the worker, closing any session
    ///
    /// Waits for a dedicated worker thread to exit.
    pub fn shutdown(mut self) {
        self.stop();
        if let Some(WorkerHandle::Thread(thread)) = self.worker.take() {
            if thread.join().is_err() {
                tracing::error!("Suspension channel worker thread panicked");
            }
        }
    }

    fn stop(&self) {
        // Already gone is fine
        let _ = self.inputs.send(Input::Shutdown);
    }

    fn send(&self, input: Input) {
        if self.inputs.send(input).is_err() {
            tracing::warn!("Suspension channel worker is not running");
        }
    }
}

impl Drop for SuspensionChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SuspensionChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuspensionChannel")
            .field("state", &self.get_state())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConnectionState;
    use crate::testing::MockBroker;
    use crate::transport::ClientEvent;
    use std::time::{Duration, Instant};

    fn wait_for(channel: &SuspensionChannel, check: impl Fn(&AlertState) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if check(&channel.get_state()) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_spawn_requires_runtime() {
        let err = SuspensionChannel::spawn(ChannelConfig::default(), MockBroker::new()).unwrap_err();
        assert!(matches!(err, ChannelError::NoRuntime(_)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ChannelConfig::default().with_topic("");
        let err = SuspensionChannel::with_worker_thread(config, MockBroker::new()).unwrap_err();
        assert!(matches!(err, ChannelError::Config(_)));
    }

    #[test]
    fn test_worker_thread_round_trip() {
        let broker = MockBroker::new();
        let channel =
            SuspensionChannel::with_worker_thread(ChannelConfig::default(), broker.clone())
                .unwrap();
        assert!(channel.is_running());

        channel.connect();
        assert!(wait_for(&channel, |s| s.connection_state == ConnectionState::Connecting));

        assert!(broker.emit(ClientEvent::Connected));
        assert!(wait_for(&channel, |s| s.is_connected()));

        channel.disconnect();
        assert!(wait_for(&channel, |s| {
            s.connection_state == ConnectionState::Disconnected
        }));
        assert_eq!(broker.disconnect_count(), 1);

        channel.shutdown();
    }

    #[test]
    fn test_drop_stops_worker() {
        let broker = MockBroker::new();
        let channel =
            SuspensionChannel::with_worker_thread(ChannelConfig::default(), broker.clone())
                .unwrap();
        channel.connect();
        assert!(wait_for(&channel, |s| s.connection_state == ConnectionState::Connecting));

        drop(channel);

        // The worker exits and releases its sink
        let deadline = Instant::now() + Duration::from_secs(5);
        while broker.emit(ClientEvent::Connected) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!broker.emit(ClientEvent::Connected));
        assert_eq!(broker.disconnect_count(), 1);
    }
}
