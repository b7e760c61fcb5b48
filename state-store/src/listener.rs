//! Listener registration and removal
//!
//! Listeners live in an ordered registry. Each entry carries an `active`
//! flag shared with its [`Unsubscribe`] handle, so removal takes effect for
//! the remainder of a notification round already in progress.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Callback invoked with the state snapshot and the revision it belongs to
pub(crate) type Callback<S> = Arc<dyn Fn(&S, u64) + Send + Sync>;

/// Identifier assigned to a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

struct ListenerEntry<S> {
    id: ListenerId,
    active: Arc<AtomicBool>,
    callback: Callback<S>,
}

/// Ordered set of listeners for one store
pub(crate) struct ListenerRegistry<S> {
    next_id: u64,
    entries: Vec<ListenerEntry<S>>,
}

impl<S> ListenerRegistry<S> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    /// Append a listener; returns its id and liveness flag
    pub(crate) fn register(&mut self, callback: Callback<S>) -> (ListenerId, Arc<AtomicBool>) {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        let active = Arc::new(AtomicBool::new(true));

        self.entries.push(ListenerEntry {
            id,
            active: Arc::clone(&active),
            callback,
        });

        (id, active)
    }

    /// Remove a listener, returning whether it was registered
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| {
            if entry.id == id {
                entry.active.store(false, Ordering::Release);
                false
            } else {
                true
            }
        });
        before != self.entries.len()
    }

    /// Copy the current listeners in registration order
    ///
    /// Callers invoke the copies after releasing the registry lock and must
    /// check the flag before each call.
    pub(crate) fn snapshot(&self) -> Vec<(Arc<AtomicBool>, Callback<S>)> {
        self.entries
            .iter()
            .map(|entry| (Arc::clone(&entry.active), Arc::clone(&entry.callback)))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        for entry in self.entries.drain(..) {
            entry.active.store(false, Ordering::Release);
        }
    }
}

/// Handle returned by `StateStore::subscribe`
///
/// Dropping the handle does **not** remove the listener; call
/// [`Unsubscribe::unsubscribe`] to stop receiving notifications.
pub struct Unsubscribe {
    id: ListenerId,
    active: Arc<AtomicBool>,
    detach: Box<dyn Fn(ListenerId) -> bool + Send + Sync>,
}

impl Unsubscribe {
    pub(crate) fn new(
        id: ListenerId,
        active: Arc<AtomicBool>,
        detach: Box<dyn Fn(ListenerId) -> bool + Send + Sync>,
    ) -> Self {
        Self { id, active, detach }
    }

    /// The id of the listener this handle controls
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Whether the listener is still registered
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Deregister the listener
    ///
    /// Returns `false` if it had already been removed (or the store is gone).
    pub fn unsubscribe(self) -> bool {
        self.active.store(false, Ordering::Release);
        (self.detach)(self.id)
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Callback<u32> {
        Arc::new(|_: &u32, _: u64| {})
    }

    #[test]
    fn test_register_assigns_increasing_ids() {
        let mut registry = ListenerRegistry::new();
        let (a, _) = registry.register(noop());
        let (b, _) = registry.register(noop());

        assert!(a < b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_clears_active_flag() {
        let mut registry = ListenerRegistry::new();
        let (id, active) = registry.register(noop());

        assert!(registry.remove(id));
        assert!(!active.load(Ordering::Acquire));
        assert_eq!(registry.len(), 0);

        // Second removal is a no-op
        assert!(!registry.remove(id));
    }

    #[test]
    fn test_snapshot_preserves_order() {
        let mut registry = ListenerRegistry::new();
        let (first, first_flag) = registry.register(noop());
        let (_, second_flag) = registry.register(noop());
        registry.remove(first);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(Arc::ptr_eq(&snapshot[0].0, &second_flag));
        assert!(!first_flag.load(Ordering::Acquire));
    }

    #[test]
    fn test_clear_deactivates_everything() {
        let mut registry = ListenerRegistry::new();
        let (_, a) = registry.register(noop());
        let (_, b) = registry.register(noop());

        registry.clear();

        assert_eq!(registry.len(), 0);
        assert!(!a.load(Ordering::Acquire));
        assert!(!b.load(Ordering::Acquire));
    }

    #[test]
    fn test_listener_id_display() {
        let mut registry = ListenerRegistry::new();
        let (id, _) = registry.register(noop());
        assert_eq!(id.to_string(), "listener-1");
        assert_eq!(id.as_u64(), 1);
    }
}
