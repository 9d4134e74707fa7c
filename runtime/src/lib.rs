//! # Brainstorm Runtime
//!
//! Runtime implementation for the Brainstorm client architecture.
//!
//! This crate provides the Store runtime that runs reducers and fans every
//! state change out to its readers.
//!
//! ## Core Components
//!
//! - **Store**: Owns state and runs the reducer
//! - **State fan-out**: Every reader holds a live `watch` receiver, so no
//!   reader can keep a stale copy across a change
//!
//! ## Example
//!
//! ```ignore
//! use brainstorm_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Apply an action synchronously (observer callbacks use this path)
//! store.dispatch(Action::DoSomething)?;
//!
//! // Read state
//! let value = store.state(|s| s.some_field);
//! ```

use brainstorm_core::reducer::Reducer;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        #[error("Store is shutting down")]
        ShutdownInProgress,
    }
}

pub use error::StoreError;
pub use store::Store;

/// Store module - The runtime for reducers
pub mod store {
    use super::{Arc, AtomicBool, Ordering, Reducer, StoreError, watch};

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (inside a `watch` channel, so readers always see the latest value)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    ///
    /// Cloning a Store yields another handle to the same state.
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<watch::Sender<S>>,
        reducer: Arc<R>,
        environment: Arc<E>,
        shutdown: Arc<AtomicBool>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            let (state, _) = watch::channel(initial_state);

            Self {
                state: Arc::new(state),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
                shutdown: Arc::new(AtomicBool::new(false)),
            }
        }

        /// Apply an action synchronously
        ///
        /// The reducer runs while the state channel is locked, so the new
        /// state is visible to every reader before this call returns.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        pub fn dispatch(&self, action: A) -> Result<(), StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejecting action, store is shutting down");
                return Err(StoreError::ShutdownInProgress);
            }

            self.state.send_modify(|state| {
                self.reducer.reduce(state, action, &self.environment);
            });
            metrics::counter!("store.actions.processed").increment(1);
            Ok(())
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let name = store.state(|s| s.user.clone());
        /// ```
        pub fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            f(&self.state.borrow())
        }

        /// Subscribe to state changes
        ///
        /// The receiver always yields the latest state; intermediate values
        /// may be skipped by slow readers but never observed out of order.
        #[must_use]
        pub fn subscribe(&self) -> watch::Receiver<S> {
            self.state.subscribe()
        }

        /// Returns `true` once shutdown has started
        #[must_use]
        pub fn is_shutting_down(&self) -> bool {
            self.shutdown.load(Ordering::Acquire)
        }

        /// Stop accepting actions
        ///
        /// Readers keep the last state. Idempotent.
        pub fn shutdown(&self) {
            if !self.shutdown.swap(true, Ordering::AcqRel) {
                tracing::info!("Store shut down");
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                shutdown: Arc::clone(&self.shutdown),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum TestAction {
        Increment,
        Note(&'static str),
    }

    #[derive(Debug, Clone, Default)]
    struct TestState {
        count: u32,
        notes: Vec<&'static str>,
    }

    struct TestReducer;

    impl Reducer for TestReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = ();

        fn reduce(&self, state: &mut TestState, action: TestAction, _env: &()) {
            match action {
                TestAction::Increment => state.count += 1,
                TestAction::Note(note) => state.notes.push(note),
            }
        }
    }

    fn store() -> Store<TestState, TestAction, (), TestReducer> {
        Store::new(TestState::default(), TestReducer, ())
    }

    #[test]
    fn test_dispatch_is_visible_immediately() {
        let store = store();
        let reader = store.subscribe();

        store.dispatch(TestAction::Increment).unwrap();

        assert_eq!(store.state(|s| s.count), 1);
        assert_eq!(reader.borrow().count, 1);
    }

    #[test]
    fn test_actions_apply_in_dispatch_order() {
        let store = store();

        store.dispatch(TestAction::Note("first")).unwrap();
        store.clone().dispatch(TestAction::Note("second")).unwrap();

        assert_eq!(store.state(|s| s.notes.clone()), vec!["first", "second"]);
    }

    #[test]
    fn test_shutdown_rejects_new_actions() {
        let store = store();
        let reader = store.subscribe();
        store.dispatch(TestAction::Increment).unwrap();

        store.shutdown();
        store.shutdown();

        assert!(store.is_shutting_down());
        assert_eq!(
            store.dispatch(TestAction::Increment),
            Err(StoreError::ShutdownInProgress)
        );
        assert_eq!(reader.borrow().count, 1);
    }
}
