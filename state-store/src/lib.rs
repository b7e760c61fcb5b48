//! Generic Observable State
//!
//! A small, type-safe state container that notifies listeners synchronously
//! after every mutation.
//!
//! # Features
//!
//! - **Snapshot Reads**: `get()` returns a clone of the current state
//! - **Ordered Fan-out**: listeners are called in registration order
//! - **Batched Updates**: one `update()` call is one notification round,
//!   however many fields it touches
//! - **Explicit Unsubscribe**: `subscribe()` hands back an [`Unsubscribe`]
//!   handle; a listener removed mid-round is not called again
//! - **Blocking Iteration**: consume changes via [`ChangeIterator`]
//!
//! # Quick Start
//!
//! ```rust
//! use state_store::StateStore;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! #[derive(Clone, Debug, Default, PartialEq)]
//! struct Banner {
//!     text: Option<String>,
//!     dismissed: bool,
//! }
//!
//! let store = StateStore::new(Banner::default());
//! let calls = Arc::new(AtomicUsize::new(0));
//!
//! let counter = Arc::clone(&calls);
//! let handle = store.subscribe(move |_banner: &Banner| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! // Two fields, one notification
//! store.update(|banner| {
//!     banner.text = Some("Line 2 suspended".to_string());
//!     banner.dismissed = false;
//! });
//! assert_eq!(calls.load(Ordering::SeqCst), 1);
//!
//! handle.unsubscribe();
//! store.update(|banner| banner.dismissed = true);
//! assert_eq!(calls.load(Ordering::SeqCst), 1);
//! ```
//!
//! # Architecture
//!
//! ```text
//! StateStore<S>
//!     │
//!     ├── state: RwLock<S>
//!     │
//!     ├── revision: AtomicU64
//!     │
//!     ├── round: ReentrantMutex<()>   (serializes mutate + notify)
//!     │
//!     └── listeners: Mutex<ListenerRegistry<S>>
//!             │
//!             ├── user callbacks  ──> Unsubscribe
//!             └── channel sender  ──> ChangeIterator<S>
//! ```

// Modules
pub mod event;
pub mod iter;
pub mod listener;
pub mod store;

// Re-exports - Public API
pub use event::ChangeEvent;
pub use iter::{ChangeIterator, TimeoutIter, TryIter};
pub use listener::{ListenerId, Unsubscribe};
pub use store::StateStore;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::event::ChangeEvent;
    pub use crate::iter::ChangeIterator;
    pub use crate::listener::{ListenerId, Unsubscribe};
    pub use crate::store::StateStore;
}
