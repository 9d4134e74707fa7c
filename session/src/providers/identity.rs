//! Identity provider trait.

use crate::error::Result;
use crate::providers::ProfileFields;
use crate::state::IdentitySnapshot;
use brainstorm_core::observer::SubscriptionId;
use std::future::Future;

/// Remote authentication service.
///
/// A provider accepts a single auth-state observer at a time, so at most
/// one session context can follow it. Observers receive the current principal (or `None`) whenever it changes:
/// sign-in, sign-up, sign-out and session invalidation. Profile, email and
/// password edits are not reported to observers; callers must
/// [`IdentityProvider::reload`] to see them.
pub trait IdentityProvider: Send + Sync {
    /// Current principal, `None` when signed out or not yet restored.
    fn current_user(&self) -> Option<IdentitySnapshot>;

    /// Register the auth-state observer.
    ///
    /// If the provider has finished restoring its session, the observer is
    /// called immediately with the current principal. Otherwise its first
    /// call comes when restoration completes.
    ///
    /// # Errors
    ///
    /// Returns `AlreadySubscribed` if an observer is already registered.
    fn on_auth_state_changed<F>(&self, observer: F) -> Result<SubscriptionId>
    where
        F: Fn(&Option<IdentitySnapshot>) + Send + Sync + 'static;

    /// Remove an auth-state observer.
    ///
    /// Returns `true` if it was registered.
    fn remove_observer(&self, id: SubscriptionId) -> bool;

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` for bad credentials, disabled accounts and
    /// network failures. Observers are not called on failure.
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<IdentitySnapshot>> + Send;

    /// Create an account. The new account becomes the signed-in principal.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` if the email is taken or malformed, the
    /// password is too weak, or the service is unreachable.
    fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<IdentitySnapshot>> + Send;

    /// Change the signed-in principal's email.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` if nobody is signed in, the email is taken or
    /// malformed, or a recent login is required.
    fn update_email(&self, email: &str) -> impl Future<Output = Result<()>> + Send;

    /// Change the signed-in principal's password.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` if nobody is signed in, the password is too
    /// weak, or a recent login is required.
    fn update_password(&self, password: &str) -> impl Future<Output = Result<()>> + Send;

    /// Write display name and photo URL onto the signed-in principal.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` if nobody is signed in or the service fails.
    fn update_profile(&self, fields: ProfileFields) -> impl Future<Output = Result<()>> + Send;

    /// Refresh the signed-in principal from the service.
    ///
    /// Returns `None` when nobody is signed in.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` on network failure or if the session was
    /// invalidated (observers then receive `None`).
    fn reload(&self) -> impl Future<Output = Result<Option<IdentitySnapshot>>> + Send;

    /// End the current session. Observers receive `None`.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` if the service could not be told; the session
    /// is then left as it was.
    fn sign_out(&self) -> impl Future<Output = Result<()>> + Send;
}
