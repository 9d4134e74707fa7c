//! # Brainstorm Core
//!
//! Core traits and types shared by every Brainstorm crate.
//!
//! The client keeps its shared state (who is signed in, what the assignment
//! board looks like) in reducers driven by a Store. Screens never mutate that
//! state directly: they send actions, and read back snapshots.
//!
//! ## Core Concepts
//!
//! - **State**: Domain state for a feature
//! - **Action**: All possible inputs to a reducer
//! - **Reducer**: Pure function `(State, Action, Environment) → State`
//! - **Environment**: Injected dependencies via traits
//! - **Observer**: Explicit `register` / `unregister` callback registry
//!
//! ## Example
//!
//! ```
//! use brainstorm_core::reducer::Reducer;
//!
//! #[derive(Clone, Debug, Default)]
//! struct BadgeState {
//!     unread: u32,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum BadgeAction {
//!     Notified,
//!     Cleared,
//! }
//!
//! struct BadgeReducer;
//!
//! impl Reducer for BadgeReducer {
//!     type State = BadgeState;
//!     type Action = BadgeAction;
//!     type Environment = ();
//!
//!     fn reduce(&self, state: &mut BadgeState, action: BadgeAction, _env: &()) {
//!         match action {
//!             BadgeAction::Notified => state.unread += 1,
//!             BadgeAction::Cleared => state.unread = 0,
//!         }
//!     }
//! }
//!
//! let mut state = BadgeState::default();
//! BadgeReducer.reduce(&mut state, BadgeAction::Notified, &());
//! assert_eq!(state.unread, 1);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

/// Observer registry with explicit subscription handles
pub mod observer;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → State`
///
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place
        ///
        /// Rejected actions are recorded in the state, not returned.
        fn reduce(&self, state: &mut Self::State, action: Self::Action, env: &Self::Environment);
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use brainstorm_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
