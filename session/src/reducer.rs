//! Session reducer.
//!
//! Both actions replace the snapshot wholesale, so whichever lands last wins.

use crate::actions::SessionAction;
use crate::state::SessionState;
use brainstorm_core::environment::{Clock, SystemClock};
use brainstorm_core::reducer::Reducer;
use std::sync::Arc;

/// Dependencies of the session reducer.
#[derive(Clone)]
pub struct SessionEnvironment {
    /// Stamps `last_changed_at`
    pub clock: Arc<dyn Clock>,
}

impl SessionEnvironment {
    /// Environment with the given clock.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Default for SessionEnvironment {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for SessionEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEnvironment").finish_non_exhaustive()
    }
}

/// Reducer applying identity changes to [`SessionState`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionReducer;

impl Reducer for SessionReducer {
    type State = SessionState;
    type Action = SessionAction;
    type Environment = SessionEnvironment;

    fn reduce(&self, state: &mut Self::State, action: Self::Action, env: &Self::Environment) {
        match action {
            SessionAction::AuthStateChanged { user } => {
                tracing::debug!(
                    uid = user.as_ref().map(|u| u.uid.as_str()),
                    first = !state.resolved,
                    "Auth state changed"
                );
                state.user = user;
                state.resolved = true;
            },
            SessionAction::ProfileReloaded { user } => {
                // Must not bypass the Unresolved guard
                if !state.resolved {
                    tracing::debug!(uid = %user.uid, "Ignoring profile reload before resolution");
                    return;
                }
                tracing::debug!(uid = %user.uid, "Profile reloaded");
                state.user = Some(user);
            },
        }

        state.revision += 1;
        state.last_changed_at = Some(env.clock.now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{IdentitySnapshot, SessionPhase};
    use brainstorm_testing::{epoch, test_clock, ManualClock, ReducerTest};
    use chrono::Duration;

    fn env() -> SessionEnvironment {
        SessionEnvironment::new(Arc::new(test_clock()))
    }

    fn ann() -> IdentitySnapshot {
        IdentitySnapshot::new("u-ann")
            .with_display_name("Ann")
            .with_email("ann@example.com")
    }

    #[test]
    fn test_first_callback_resolves_anonymous() {
        ReducerTest::new(SessionReducer)
            .with_env(env())
            .given_state(SessionState::default())
            .when_action(SessionAction::AuthStateChanged { user: None })
            .then_state(|state| {
                assert!(state.resolved);
                assert_eq!(state.phase(), SessionPhase::Anonymous);
                assert_eq!(state.revision, 1);
                assert_eq!(state.last_changed_at, Some(test_clock().now()));
            })
            .run();
    }

    #[test]
    fn test_sign_in_then_out() {
        ReducerTest::new(SessionReducer)
            .with_env(env())
            .given_state(SessionState::default())
            .when_actions([
                SessionAction::AuthStateChanged { user: Some(ann()) },
                SessionAction::AuthStateChanged { user: None },
            ])
            .then_state(|state| {
                assert!(state.resolved);
                assert!(state.user.is_none());
                assert_eq!(state.revision, 2);
            })
            .run();
    }

    #[test]
    fn test_each_change_is_stamped_with_the_clock() {
        let clock = ManualClock::new(epoch());
        let env = SessionEnvironment::new(Arc::new(clock.clone()));
        let mut state = SessionState::default();

        SessionReducer.reduce(&mut state, SessionAction::AuthStateChanged { user: Some(ann()) }, &env);
        assert_eq!(state.last_changed_at, Some(epoch()));

        clock.advance(Duration::minutes(5));
        SessionReducer.reduce(&mut state, SessionAction::AuthStateChanged { user: None }, &env);

        assert_eq!(state.last_changed_at, Some(epoch() + Duration::minutes(5)));
        assert_eq!(state.revision, 2);
    }

    #[test]
    fn test_profile_reload_before_resolution_is_ignored() {
        ReducerTest::new(SessionReducer)
            .with_env(env())
            .given_state(SessionState::default())
            .when_action(SessionAction::ProfileReloaded { user: ann() })
            .then_state(|state| {
                assert_eq!(*state, SessionState::default());
            })
            .run();
    }

    #[test]
    fn test_profile_reload_replaces_snapshot() {
        let renamed = ann().with_display_name("Annie");
        let expected = renamed.clone();

        ReducerTest::new(SessionReducer)
            .with_env(env())
            .given_state(SessionState::default())
            .when_actions([
                SessionAction::AuthStateChanged { user: Some(ann()) },
                SessionAction::ProfileReloaded { user: renamed },
            ])
            .then_state(move |state| {
                assert_eq!(state.user.as_ref(), Some(&expected));
                assert!(state.resolved);
            })
            .run();
    }
}
