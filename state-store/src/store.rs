//! Observable state container
//!
//! `StateStore<S>` owns one value of type `S` and calls every registered
//! listener exactly once per mutation, in registration order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, RwLock};

use crate::event::ChangeEvent;
use crate::iter::ChangeIterator;
use crate::listener::{Callback, ListenerId, ListenerRegistry, Unsubscribe};

struct Shared<S> {
    state: RwLock<S>,
    revision: AtomicU64,
    /// Held across mutate + notify so rounds never interleave between
    /// threads. Reentrant so a listener may itself call `update`.
    round: ReentrantMutex<()>,
    listeners: Mutex<ListenerRegistry<S>>,
}

/// Observable state store with synchronous fan-out
///
/// Cloning the store is cheap and every clone shares the same state and
/// listeners.
///
/// # Guarantees
///
/// - Each call to [`update`](Self::update), [`set`](Self::set) or
///   [`replace`](Self::replace) runs exactly one notification round.
/// - Listeners run in registration order, with no store lock held, so they
///   may read the store or mutate it again.
/// - A listener removed during a round is not called for the rest of it.
///
/// # Example
///
/// ```rust
/// use state_store::StateStore;
///
/// let store = StateStore::new(0u32);
/// let handle = store.subscribe(|n: &u32| println!("now {n}"));
///
/// store.update(|n| *n += 1);
/// assert_eq!(store.get(), 1);
///
/// handle.unsubscribe();
/// ```
pub struct StateStore<S>
where
    S: Clone + Send + Sync + 'static,
{
    shared: Arc<Shared<S>>,
}

impl<S> StateStore<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Create a store holding `initial`
    pub fn new(initial: S) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(initial),
                revision: AtomicU64::new(0),
                round: ReentrantMutex::new(()),
                listeners: Mutex::new(ListenerRegistry::new()),
            }),
        }
    }

    /// Snapshot of the current state
    pub fn get(&self) -> S {
        self.shared.state.read().clone()
    }

    /// Borrow the current state without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.shared.state.read())
    }

    /// Number of mutations applied so far
    pub fn revision(&self) -> u64 {
        self.shared.revision.load(Ordering::Acquire)
    }

    /// Apply a mutation and notify listeners once
    ///
    /// Any number of fields may change inside `mutate`; listeners see only
    /// the final result.
    pub fn update<R>(&self, mutate: impl FnOnce(&mut S) -> R) -> R {
        let _round = self.shared.round.lock();

        let (result, snapshot) = {
            let mut state = self.shared.state.write();
            let result = mutate(&mut state);
            (result, state.clone())
        };
        let revision = self.shared.revision.fetch_add(1, Ordering::AcqRel) + 1;

        self.notify(&snapshot, revision);
        result
    }

    /// Replace the whole state and notify listeners once
    pub fn set(&self, value: S) {
        self.update(move |state| *state = value);
    }

    /// Replace the whole state, returning the previous value
    pub fn replace(&self, value: S) -> S {
        self.update(move |state| std::mem::replace(state, value))
    }

    /// Register a listener called after every mutation
    ///
    /// Listeners are called in the order they were registered.
    pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        self.register(Arc::new(move |state: &S, _revision: u64| listener(state)))
    }

    /// Create a blocking iterator over future changes
    ///
    /// The iterator holds its own listener, removed when it is dropped.
    pub fn changes(&self) -> ChangeIterator<S> {
        let (tx, rx) = mpsc::channel();
        let handle = self.register(Arc::new(move |state: &S, revision: u64| {
            // Receiver gone means the iterator is being dropped
            let _ = tx.send(ChangeEvent::new(state.clone(), revision));
        }));
        ChangeIterator::new(rx, handle)
    }

    /// Number of registered listeners, including open iterators
    pub fn listener_count(&self) -> usize {
        self.shared.listeners.lock().len()
    }

    /// Remove every listener
    pub fn clear_listeners(&self) {
        self.shared.listeners.lock().clear();
    }

    fn register(&self, callback: Callback<S>) -> Unsubscribe {
        let (id, active) = self.shared.listeners.lock().register(callback);
        tracing::trace!("registered {}", id);

        let weak: Weak<Shared<S>> = Arc::downgrade(&self.shared);
        let detach = Box::new(move |id: ListenerId| match weak.upgrade() {
            Some(shared) => {
                let removed = shared.listeners.lock().remove(id);
                if removed {
                    tracing::trace!("removed {}", id);
                }
                removed
            }
            None => false,
        });

        Unsubscribe::new(id, active, detach)
    }

    fn notify(&self, snapshot: &S, revision: u64) {
        // Release the registry lock before calling out
        let listeners = self.shared.listeners.lock().snapshot();

        for (active, callback) in listeners {
            if active.load(Ordering::Acquire) {
                callback(snapshot, revision);
            }
        }
    }
}

impl<S> Default for StateStore<S>
where
    S: Clone + Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S> Clone for StateStore<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> std::fmt::Debug for StateStore<S>
where
    S: Clone + Send + Sync + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("state", &*self.shared.state.read())
            .field("revision", &self.revision())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}
