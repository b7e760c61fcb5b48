//! Property tests for listener fan-out.
//!
//! Random interleavings of subscribe, unsubscribe and update must always
//! deliver exactly one call per update to each listener registered at that
//! moment, in registration order.

use parking_lot::Mutex;
use proptest::prelude::*;
use state_store::{StateStore, Unsubscribe};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Subscribe,
    Unsubscribe(usize),
    Update,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => Just(Op::Subscribe),
        1 => (0usize..16).prop_map(Op::Unsubscribe),
        3 => Just(Op::Update),
    ]
}

proptest! {
    #[test]
    fn every_live_listener_sees_every_update(ops in prop::collection::vec(op_strategy(), 1..64)) {
        let store = StateStore::new(0u64);
        let log: Arc<Mutex<Vec<(usize, u64)>>> = Arc::new(Mutex::new(Vec::new()));

        let mut handles: Vec<Option<Unsubscribe>> = Vec::new();
        let mut expected: Vec<(usize, u64)> = Vec::new();
        let mut value = 0u64;

        for op in ops {
            match op {
                Op::Subscribe => {
                    let index = handles.len();
                    let log = Arc::clone(&log);
                    let handle = store.subscribe(move |n: &u64| log.lock().push((index, *n)));
                    handles.push(Some(handle));
                }
                Op::Unsubscribe(pick) => {
                    if !handles.is_empty() {
                        let index = pick % handles.len();
                        if let Some(handle) = handles[index].take() {
                            prop_assert!(handle.unsubscribe());
                        }
                    }
                }
                Op::Update => {
                    value += 1;
                    store.set(value);
                    for (index, handle) in handles.iter().enumerate() {
                        if handle.is_some() {
                            expected.push((index, value));
                        }
                    }
                }
            }
        }

        prop_assert_eq!(&*log.lock(), &expected);
        prop_assert_eq!(
            store.listener_count(),
            handles.iter().filter(|h| h.is_some()).count()
        );
    }
}
