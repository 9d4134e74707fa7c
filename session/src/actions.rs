//! Session actions.

use crate::state::IdentitySnapshot;

/// Inputs to the session reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// The identity provider reported the current principal.
    ///
    /// Delivered through the subscription. Marks the session resolved.
    AuthStateChanged {
        /// New principal, `None` when signed out
        user: Option<IdentitySnapshot>,
    },

    /// A profile update finished and the principal was reloaded.
    ///
    /// Direct write, used because providers do not report profile edits
    /// through the subscription.
    ProfileReloaded {
        /// Reloaded principal
        user: IdentitySnapshot,
    },
}
