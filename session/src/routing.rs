//! Route guard.
//!
//! Decides which screen to show from the session state. Nothing redirects
//! until the session is resolved.

use crate::state::{SessionPhase, SessionState};

/// Top-level screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Waiting for the identity provider to report
    Splash,
    /// Onboarding with login and sign-up
    Onboarding,
    /// Home tab of the signed-in area
    Home,
}

impl Route {
    /// Navigation path of the screen.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Splash => "/splash",
            Self::Onboarding => "/",
            Self::Home => "/(tabs)/home",
        }
    }

    /// Returns `true` for screens that need a signed-in principal.
    #[must_use]
    pub const fn requires_auth(self) -> bool {
        matches!(self, Self::Home)
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Screen to show for `state`.
#[must_use]
pub fn resolve_route(state: &SessionState) -> Route {
    match state.phase() {
        SessionPhase::Unresolved => Route::Splash,
        SessionPhase::Anonymous => Route::Onboarding,
        SessionPhase::Authenticated(_) => Route::Home,
    }
}
