//! Blocking iterator over state change events
//!
//! Provides various iteration patterns for consuming change events:
//! - Blocking: `recv()`, `for event in iter`
//! - Non-blocking: `try_recv()`, `try_iter()`
//! - Timeout: `recv_timeout()`, `timeout_iter()`

use std::sync::mpsc;
use std::time::Duration;

use crate::event::ChangeEvent;
use crate::listener::Unsubscribe;

/// Blocking iterator over state change events
///
/// Created by `StateStore::changes()`. Receives one event per mutation made
/// after its creation. Dropping the iterator removes its listener.
///
/// # Example
///
/// ```rust,ignore
/// // Blocking iteration
/// for event in store.changes() {
///     println!("{:?}", event.state);
/// }
///
/// // Non-blocking check
/// let changes = store.changes();
/// for event in changes.try_iter() {
///     println!("revision {}", event.revision);
/// }
/// ```
pub struct ChangeIterator<S> {
    rx: mpsc::Receiver<ChangeEvent<S>>,
    handle: Option<Unsubscribe>,
}

impl<S> ChangeIterator<S> {
    pub(crate) fn new(rx: mpsc::Receiver<ChangeEvent<S>>, handle: Unsubscribe) -> Self {
        Self {
            rx,
            handle: Some(handle),
        }
    }

    /// Block until the next event is available
    ///
    /// Returns `None` if the store has been dropped.
    pub fn recv(&self) -> Option<ChangeEvent<S>> {
        self.rx.recv().ok()
    }

    /// Block until the next event or timeout expires
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChangeEvent<S>> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<ChangeEvent<S>> {
        self.rx.try_recv().ok()
    }

    /// Non-blocking iterator over events already queued
    pub fn try_iter(&self) -> TryIter<'_, S> {
        TryIter { inner: self }
    }

    /// Blocking iterator that stops after `timeout` without events
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIter<'_, S> {
        TimeoutIter {
            inner: self,
            timeout,
        }
    }
}

impl<S> Iterator for ChangeIterator<S> {
    type Item = ChangeEvent<S>;

    /// Block until the next change event
    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

impl<S> Drop for ChangeIterator<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.unsubscribe();
        }
    }
}

/// Non-blocking iterator over currently available events
pub struct TryIter<'a, S> {
    inner: &'a ChangeIterator<S>,
}

impl<'a, S> Iterator for TryIter<'a, S> {
    type Item = ChangeEvent<S>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

/// Blocking iterator with timeout
pub struct TimeoutIter<'a, S> {
    inner: &'a ChangeIterator<S>,
    timeout: Duration,
}

impl<'a, S> Iterator for TimeoutIter<'a, S> {
    type Item = ChangeEvent<S>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use crate::store::StateStore;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_try_recv_empty() {
        let store = StateStore::new(0u8);
        let changes = store.changes();

        assert!(changes.try_recv().is_none());
    }

    #[test]
    fn test_recv_timeout_empty() {
        let store = StateStore::new(0u8);
        let changes = store.changes();

        let start = Instant::now();
        assert!(changes.recv_timeout(Duration::from_millis(50)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn test_try_iter_drains_queue() {
        let store = StateStore::new(0u8);
        let changes = store.changes();

        for n in 1..=3 {
            store.set(n);
        }

        let states: Vec<u8> = changes.try_iter().map(|event| event.state).collect();
        assert_eq!(states, vec![1, 2, 3]);
        assert!(changes.try_recv().is_none());
    }

    #[test]
    fn test_timeout_iter_stops_when_idle() {
        let store = StateStore::new(0u8);
        let changes = store.changes();

        store.set(5);

        let collected: Vec<_> = changes.timeout_iter(Duration::from_millis(20)).collect();
        assert_eq!(collected.len(), 1);
    }

    #[test]
    fn test_blocking_recv_across_threads() {
        let store = StateStore::new(0u8);
        let changes = store.changes();

        let writer = store.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            writer.set(42);
        });

        let event = changes.recv().unwrap();
        assert_eq!(event.state, 42);

        handle.join().unwrap();
    }

    #[test]
    fn test_events_only_after_creation() {
        let store = StateStore::new(0u8);
        store.set(1);

        let changes = store.changes();
        assert!(changes.try_recv().is_none());

        store.set(2);
        assert_eq!(changes.try_recv().map(|e| e.state), Some(2));
    }
}
