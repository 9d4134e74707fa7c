//! Integration tests for Store state fan-out
//!
//! Every reader holds a `watch` receiver, so after a change lands no reader
//! can still observe the previous value.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use brainstorm_core::reducer::Reducer;
use brainstorm_runtime::Store;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum CounterAction {
    Set(u32),
}

#[derive(Debug, Clone, Default, PartialEq)]
struct CounterState {
    value: u32,
    writes: u32,
}

struct CounterReducer;

impl Reducer for CounterReducer {
    type State = CounterState;
    type Action = CounterAction;
    type Environment = ();

    fn reduce(&self, state: &mut Self::State, action: Self::Action, _env: &Self::Environment) {
        let CounterAction::Set(value) = action;
        state.value = value;
        state.writes += 1;
    }
}

fn store() -> Store<CounterState, CounterAction, (), CounterReducer> {
    Store::new(CounterState::default(), CounterReducer, ())
}

#[tokio::test]
async fn all_readers_see_the_same_value() {
    let store = store();
    let readers: Vec<_> = (0..4).map(|_| store.subscribe()).collect();

    store.dispatch(CounterAction::Set(5)).unwrap();

    for reader in &readers {
        assert_eq!(reader.borrow().value, 5);
    }
}

#[tokio::test]
async fn reader_is_woken_on_change() {
    let store = store();
    let mut reader = store.subscribe();

    let writer = store.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        writer.dispatch(CounterAction::Set(9)).unwrap();
    });

    tokio::time::timeout(Duration::from_secs(1), reader.changed())
        .await
        .expect("change should arrive")
        .unwrap();
    assert_eq!(reader.borrow_and_update().value, 9);
}

#[tokio::test]
async fn dispatch_from_another_thread_wakes_waiters() {
    let store = store();
    let mut reader = store.subscribe();

    let writer = store.clone();
    std::thread::spawn(move || writer.dispatch(CounterAction::Set(3)).unwrap());

    let state = tokio::time::timeout(Duration::from_secs(1), reader.wait_for(|s| s.value == 3))
        .await
        .expect("change should arrive")
        .unwrap()
        .clone();
    assert_eq!(state, CounterState { value: 3, writes: 1 });
}

#[tokio::test]
async fn last_write_wins() {
    let store = store();

    for value in [1, 2, 3] {
        store.dispatch(CounterAction::Set(value)).unwrap();
    }

    assert_eq!(store.state(|s| (s.value, s.writes)), (3, 3));
}
