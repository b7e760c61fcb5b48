//! Change events for state updates
//!
//! Every mutation of a `StateStore` produces one `ChangeEvent` for each
//! open `ChangeIterator`, carrying a snapshot of the state after the change.

use std::time::Instant;

/// A change event emitted after a store mutation
///
/// Unlike listener callbacks, which borrow the snapshot, events own a clone
/// of it so they can cross threads through a channel.
///
/// # Example
///
/// ```rust,ignore
/// for event in store.changes() {
///     println!("revision {} -> {:?}", event.revision, event.state);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ChangeEvent<S> {
    /// State snapshot taken right after the mutation
    pub state: S,

    /// Store revision produced by the mutation (starts at 1)
    pub revision: u64,

    /// When the change was applied
    pub timestamp: Instant,
}

impl<S> ChangeEvent<S> {
    /// Create a new change event
    pub fn new(state: S, revision: u64) -> Self {
        Self {
            state,
            revision,
            timestamp: Instant::now(),
        }
    }

    /// Create a new change event with a specific timestamp
    pub fn with_timestamp(state: S, revision: u64, timestamp: Instant) -> Self {
        Self {
            state,
            revision,
            timestamp,
        }
    }
}

impl<S: PartialEq> PartialEq for ChangeEvent<S> {
    fn eq(&self, other: &Self) -> bool {
        // Timestamp not included in equality
        self.revision == other.revision && self.state == other.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_event_creation() {
        let event = ChangeEvent::new("open".to_string(), 3);

        assert_eq!(event.state, "open");
        assert_eq!(event.revision, 3);
    }

    #[test]
    fn test_change_event_equality_ignores_timestamp() {
        let earlier = Instant::now();
        let event1 = ChangeEvent::with_timestamp("open", 1, earlier);
        let event2 = ChangeEvent::new("open", 1);
        let event3 = ChangeEvent::new("open", 2);
        let event4 = ChangeEvent::new("closed", 1);

        assert_eq!(event1, event2);
        assert_ne!(event1, event3);
        assert_ne!(event1, event4);
    }
}
