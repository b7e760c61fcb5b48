//! Alert State Store
//!
//! Wraps a `StateStore<AlertState>`. UI consumers read snapshots and
//! register listeners; only the channel worker mutates it.

use state_store::{ChangeIterator, StateStore, Unsubscribe};

use crate::model::{AlertState, ConnectionState, LastError, Suspension};

/// Observable holder of the current alert state
///
/// Cloning is cheap and every clone observes the same state. Each mutation
/// produces exactly one notification round, delivered to listeners in
/// registration order on the thread that made the change.
#[derive(Clone, Default)]
pub struct AlertStore {
    inner: StateStore<AlertState>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current state
    pub fn get_state(&self) -> AlertState {
        self.inner.get()
    }

    pub fn suspension(&self) -> Option<Suspension> {
        self.inner.read(|state| state.suspension.clone())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.read(|state| state.connection_state)
    }

    pub fn last_error(&self) -> Option<LastError> {
        self.inner.read(|state| state.last_error.clone())
    }

    /// Register a listener called after every mutation
    ///
    /// Call `unsubscribe()` on the returned handle to deregister. Dropping
    /// the handle leaves the listener registered.
    pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&AlertState) + Send + Sync + 'static,
    {
        self.inner.subscribe(listener)
    }

    /// Blocking iterator over future states
    pub fn changes(&self) -> ChangeIterator<AlertState> {
        self.inner.changes()
    }

    /// Number of mutations applied so far
    pub fn revision(&self) -> u64 {
        self.inner.revision()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listener_count()
    }

    pub(crate) fn set_suspension(&self, suspension: Option<Suspension>) {
        self.inner.update(|state| state.suspension = suspension);
    }

    pub(crate) fn set_connection_state(&self, connection_state: ConnectionState) {
        self.inner
            .update(|state| state.connection_state = connection_state);
    }

    pub(crate) fn set_error(&self, error: Option<LastError>) {
        self.inner.update(|state| state.last_error = error);
    }

    /// Change several fields as one logical event
    pub(crate) fn apply<R>(&self, change: impl FnOnce(&mut AlertState) -> R) -> R {
        self.inner.update(change)
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&AlertState) -> R) -> R {
        self.inner.read(f)
    }
}

impl std::fmt::Debug for AlertStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertStore")
            .field("state", &self.get_state())
            .field("revision", &self.revision())
            .finish()
    }
}
