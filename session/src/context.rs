//! Session context: the single source of truth for "who is signed in".
//!
//! The context subscribes to the adapter once, at [`SessionContext::start`],
//! and applies every callback to a [`Store`] synchronously. Readers hold
//! `watch` receivers, so after a change lands no reader can still see the
//! previous snapshot.
//!
//! Mutations go through the adapter. Sign-in and sign-out results arrive
//! through the subscription; profile updates are written directly because
//! providers do not report them.

use crate::actions::SessionAction;
use crate::adapter::{IdentityAdapter, SubscriptionHandle};
use crate::error::{Result, SessionError};
use crate::providers::{IdentityProvider, ImageHost, ProfileStore, ProfileUpdate};
use crate::reducer::{SessionEnvironment, SessionReducer};
use crate::state::{IdentitySnapshot, PrincipalId, SessionPhase, SessionState};
use brainstorm_runtime::Store;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// Store type holding the session state.
pub type SessionStore = Store<SessionState, SessionAction, SessionEnvironment, SessionReducer>;

/// Process-wide session state holder.
pub struct SessionContext<I, P, H>
where
    I: IdentityProvider,
    P: ProfileStore,
    H: ImageHost,
{
    store: SessionStore,
    adapter: Arc<IdentityAdapter<I, P, H>>,
    subscription: Mutex<Option<SubscriptionHandle>>,
}

impl<I, P, H> SessionContext<I, P, H>
where
    I: IdentityProvider,
    P: ProfileStore,
    H: ImageHost,
{
    /// Subscribe to the adapter and start tracking the session.
    ///
    /// The state is unresolved until the provider first reports. If the
    /// provider already knows the principal, that happens before this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadySubscribed`] if another context is
    /// live on this adapter.
    pub fn start(adapter: Arc<IdentityAdapter<I, P, H>>, environment: SessionEnvironment) -> Result<Self> {
        let store = Store::new(SessionState::default(), SessionReducer, environment);

        let sink = store.clone();
        let handle = adapter.subscribe(move |user| {
            match sink.dispatch(SessionAction::AuthStateChanged { user }) {
                Ok(_) => metrics::counter!("session.state_changes").increment(1),
                Err(error) => tracing::warn!(%error, "Dropping auth state change"),
            }
        })?;

        tracing::info!(resolved = store.state(|s| s.resolved), "Session context started");
        Ok(Self {
            store,
            adapter,
            subscription: Mutex::new(Some(handle)),
        })
    }

    /// Current principal, `None` when signed out or unresolved.
    pub fn current_user(&self) -> Option<IdentitySnapshot> {
        self.store.state(|s| s.user.clone())
    }

    /// Returns `true` once the provider has reported.
    pub fn is_resolved(&self) -> bool {
        self.store.state(|s| s.resolved)
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.store.state(SessionState::phase)
    }

    /// Copy of the full state.
    pub fn state(&self) -> SessionState {
        self.store.state(Clone::clone)
    }

    /// Live view of the state.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.store.subscribe()
    }

    /// Wait for the next change and return the new state.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the store was dropped.
    pub async fn changed(&self) -> Result<SessionState> {
        let mut receiver = self.store.subscribe();
        receiver
            .changed()
            .await
            .map_err(|e| SessionError::Internal(e.to_string()))?;
        Ok(receiver.borrow_and_update().clone())
    }

    /// Wait until the provider has reported and return the resolved state.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the store was dropped.
    pub async fn resolved(&self) -> Result<SessionState> {
        let mut receiver = self.store.subscribe();
        let state = receiver
            .wait_for(|s| s.resolved)
            .await
            .map_err(|e| SessionError::Internal(e.to_string()))?;
        Ok(state.clone())
    }

    /// Sign in. The new principal arrives through the subscription.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure`; the state is unchanged.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<()> {
        self.adapter.sign_in(email, password).await.map(|_| ())
    }

    /// Create an account. The session ends anonymous.
    ///
    /// # Errors
    ///
    /// See [`IdentityAdapter::sign_up`].
    pub async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<PrincipalId> {
        self.adapter.sign_up(email, password, display_name).await
    }

    /// Sign out. The empty snapshot arrives through the subscription.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure`; the current principal stays authoritative.
    pub async fn sign_out(&self) -> Result<()> {
        self.adapter.sign_out().await
    }

    /// Update the profile and publish the reloaded principal.
    ///
    /// Every reader sees the new snapshot by the time this returns.
    ///
    /// # Errors
    ///
    /// See [`IdentityAdapter::update_profile`]; the state is unchanged.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<IdentitySnapshot> {
        let user = self.adapter.update_profile(update).await?;
        self.store
            .dispatch(SessionAction::ProfileReloaded { user: user.clone() })?;
        metrics::counter!("session.profile_injections").increment(1);
        Ok(user)
    }

    /// The adapter this context subscribes to.
    pub fn adapter(&self) -> &Arc<IdentityAdapter<I, P, H>> {
        &self.adapter
    }

    /// Release the subscription and stop accepting changes.
    ///
    /// Readers keep the last state.
    pub fn shutdown(&self) {
        self.release();
        self.store.shutdown();
        tracing::info!("Session context shut down");
    }

    fn release(&self) {
        let handle = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            self.adapter.unsubscribe(handle);
        }
    }
}

impl<I, P, H> Drop for SessionContext<I, P, H>
where
    I: IdentityProvider,
    P: ProfileStore,
    H: ImageHost,
{
    fn drop(&mut self) {
        self.release();
    }
}

impl<I, P, H> std::fmt::Debug for SessionContext<I, P, H>
where
    I: IdentityProvider,
    P: ProfileStore,
    H: ImageHost,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("state", &self.store.state(Clone::clone))
            .finish_non_exhaustive()
    }
}
