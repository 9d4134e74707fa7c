//! # Brainstorm Testing
//!
//! Testing utilities for the Brainstorm crates.
//!
//! This crate provides:
//! - Deterministic clocks for reducers that stamp times
//! - A Given-When-Then builder for reducer tests
//! - One-line tracing setup for tests that want log output
//!
//! ## Example
//!
//! ```ignore
//! use brainstorm_testing::{test_clock, ReducerTest};
//!
//! ReducerTest::new(SessionReducer)
//!     .with_env(SessionEnvironment::new(Arc::new(test_clock())))
//!     .given_state(SessionState::default())
//!     .when_action(SessionAction::AuthStateChanged { user: None })
//!     .then_state(|s| assert!(s.resolved))
//!     .run();
//! ```

use brainstorm_core::environment::Clock;
use chrono::{DateTime, Duration, Utc};


pub use reducer_test::ReducerTest;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Duration, Utc};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use brainstorm_testing::mocks::FixedClock;
    /// use brainstorm_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to
    ///
    /// Clones share the same time.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a manual clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(epoch())
    }

    /// The instant every test clock starts from (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }
}

/// Install a test tracing subscriber honouring `RUST_LOG`
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{epoch, test_clock, FixedClock, ManualClock};
