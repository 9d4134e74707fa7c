//! Identity provider adapter.
//!
//! Composes the identity service, the profile mirror and the image host
//! into the account operations the client needs. The adapter holds at most
//! one live auth-state subscription, and the provider accepts only one
//! observer, so two adapters over the same provider cannot both subscribe.

use crate::error::{AuthFailureKind, Result, SessionError};
use crate::providers::{
    IdentityProvider, ImageHost, PhotoSource, ProfileFields, ProfileRecord, ProfileStore,
    ProfileUpdate,
};
use crate::state::{IdentitySnapshot, PrincipalId};
use brainstorm_core::environment::{Clock, SystemClock};
use brainstorm_core::observer::SubscriptionId;
use std::sync::{Arc, Mutex, PoisonError};

/// Token for a live subscription, handed back to [`IdentityAdapter::unsubscribe`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping the handle leaks the subscription"]
pub struct SubscriptionHandle {
    id: SubscriptionId,
}

impl SubscriptionHandle {
    /// Underlying observer id.
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }
}

/// Account operations over an identity provider, profile store and image host.
pub struct IdentityAdapter<I, P, H> {
    identity: Arc<I>,
    profiles: Arc<P>,
    images: Arc<H>,
    clock: Arc<dyn Clock>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl<I, P, H> IdentityAdapter<I, P, H>
where
    I: IdentityProvider,
    P: ProfileStore,
    H: ImageHost,
{
    /// Create an adapter stamping records with the system clock.
    pub fn new(identity: Arc<I>, profiles: Arc<P>, images: Arc<H>) -> Self {
        Self::with_clock(identity, profiles, images, Arc::new(SystemClock))
    }

    /// Create an adapter with an explicit clock.
    pub fn with_clock(identity: Arc<I>, profiles: Arc<P>, images: Arc<H>, clock: Arc<dyn Clock>) -> Self {
        Self {
            identity,
            profiles,
            images,
            clock,
            subscription: Mutex::new(None),
        }
    }

    /// The identity provider.
    pub fn identity(&self) -> &Arc<I> {
        &self.identity
    }

    /// The profile store.
    pub fn profiles(&self) -> &Arc<P> {
        &self.profiles
    }

    /// Register the auth-state observer.
    ///
    /// The observer is called with the current principal as soon as the
    /// provider knows it (immediately, unless it is still restoring), and
    /// again on every sign-in, sign-out and session invalidation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadySubscribed`] if a subscription is live
    /// on this adapter or the provider already has an observer.
    pub fn subscribe<F>(&self, observer: F) -> Result<SubscriptionHandle>
    where
        F: Fn(Option<IdentitySnapshot>) + Send + Sync + 'static,
    {
        let mut slot = self.subscription.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            tracing::warn!("Rejecting second auth-state subscription");
            return Err(SessionError::AlreadySubscribed);
        }

        let id = self
            .identity
            .on_auth_state_changed(move |user: &Option<IdentitySnapshot>| observer(user.clone()))
            .inspect_err(|error| tracing::warn!(%error, "Provider refused auth-state observer"))?;
        *slot = Some(id);
        tracing::debug!(subscription = %id, "Auth-state subscription registered");
        Ok(SubscriptionHandle { id })
    }

    /// Release a subscription. Returns `true` if it was live.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut slot = self.subscription.lock().unwrap_or_else(PoisonError::into_inner);
        if *slot != Some(handle.id) {
            return false;
        }
        *slot = None;
        tracing::debug!(subscription = %handle.id, "Auth-state subscription released");
        self.identity.remove_observer(handle.id)
    }

    /// Returns `true` while a subscription is live.
    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Current principal as the provider knows it.
    pub fn current(&self) -> Option<IdentitySnapshot> {
        self.identity.current_user()
    }

    /// Sign in. Observers receive the principal on success.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` for invalid credentials, a disabled account or
    /// a network failure. Observers are not called.
    #[tracing::instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<IdentitySnapshot> {
        self.identity.sign_in_with_password(email, password).await
    }

    /// Create an account and leave it signed out.
    ///
    /// Sets the display name, writes the `users/{uid}` record with
    /// `displayName`, `email` and `createdAt`, then signs out. Returns the
    /// new principal id.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` if the email is taken or malformed, the
    /// password is weak or the service is unreachable, and `StorageFailure`
    /// if the record cannot be written. Steps already applied stay applied.
    #[tracing::instrument(skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<PrincipalId> {
        let user = self.identity.create_account(email, password).await?;

        self.identity
            .update_profile(ProfileFields {
                display_name: Some(display_name.to_string()),
                photo_url: None,
            })
            .await?;

        self.profiles
            .set(
                &user.uid,
                &ProfileRecord {
                    display_name: Some(display_name.to_string()),
                    email: Some(email.to_string()),
                    created_at: Some(self.clock.now()),
                    ..ProfileRecord::default()
                },
            )
            .await?;

        self.identity.sign_out().await?;
        tracing::info!(uid = %user.uid, "Account created");
        Ok(user.uid)
    }

    /// Sign out. Observers receive `None` on success.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` if the service could not be reached; the
    /// current principal stays signed in.
    pub async fn sign_out(&self) -> Result<()> {
        self.identity.sign_out().await
    }

    /// Apply a profile update and return the reloaded principal.
    ///
    /// Steps, in order, stopping at the first failure:
    /// 1. change the email, if given and different from the current one
    /// 2. change the password, if given and non-empty
    /// 3. upload the image, if it is a local file
    /// 4. write display name and photo URL onto the principal
    /// 5. merge `displayName`, `email`, `photoURL`, `updatedAt` into `users/{uid}`
    /// 6. reload the principal
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` if nobody is signed in or the identity service
    /// rejects a change, and `StorageFailure` if the upload or the record
    /// write fails. Earlier steps are not rolled back.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<IdentitySnapshot> {
        let current = self
            .identity
            .current_user()
            .ok_or_else(|| SessionError::auth(AuthFailureKind::NotSignedIn, "No user is signed in"))?;

        let email = match update.email.filter(|e| !e.is_empty()) {
            Some(email) if current.email.as_deref() != Some(email.as_str()) => {
                self.identity.update_email(&email).await?;
                tracing::debug!(uid = %current.uid, "Email changed");
                Some(email)
            },
            _ => current.email.clone(),
        };

        if let Some(password) = update.password.filter(|p| !p.is_empty()) {
            self.identity.update_password(&password).await?;
            tracing::debug!(uid = %current.uid, "Password changed");
        }

        let photo_url = match update.photo {
            Some(PhotoSource::Local { file_name, bytes }) => Some(self.images.upload(&file_name, bytes).await?),
            Some(PhotoSource::Remote(url)) => Some(url),
            None => current.photo_url.clone(),
        };

        let display_name = update.display_name.or_else(|| current.display_name.clone());

        self.identity
            .update_profile(ProfileFields {
                display_name: display_name.clone(),
                photo_url: photo_url.clone(),
            })
            .await?;

        self.profiles
            .merge(
                &current.uid,
                &ProfileRecord {
                    display_name,
                    email,
                    photo_url,
                    created_at: None,
                    updated_at: Some(self.clock.now()),
                },
            )
            .await?;

        let reloaded = self
            .identity
            .reload()
            .await?
            .ok_or_else(|| SessionError::auth(AuthFailureKind::NotSignedIn, "Signed out during update"))?;
        tracing::info!(uid = %reloaded.uid, "Profile updated");
        Ok(reloaded)
    }
}

impl<I, P, H> std::fmt::Debug for IdentityAdapter<I, P, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subscribed = self
            .subscription
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false);
        f.debug_struct("IdentityAdapter")
            .field("subscribed", &subscribed)
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, feature = "test-utils"))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::{MockIdentityProvider, MockImageHost, MockProfileStore};
    use brainstorm_testing::test_clock;

    type MockAdapter = IdentityAdapter<MockIdentityProvider, MockProfileStore, MockImageHost>;

    fn adapter(identity: MockIdentityProvider) -> (MockAdapter, MockProfileStore, MockImageHost) {
        let profiles = MockProfileStore::new();
        let images = MockImageHost::new();
        let adapter = IdentityAdapter::with_clock(
            Arc::new(identity),
            Arc::new(profiles.clone()),
            Arc::new(images.clone()),
            Arc::new(test_clock()),
        );
        (adapter, profiles, images)
    }

    #[test]
    fn test_second_subscription_is_rejected() {
        let (adapter, _, _) = adapter(MockIdentityProvider::new());

        let handle = adapter.subscribe(|_| {}).unwrap();
        assert_eq!(adapter.subscribe(|_| {}), Err(SessionError::AlreadySubscribed));

        assert!(adapter.unsubscribe(handle));
        assert!(!adapter.is_subscribed());
        let again = adapter.subscribe(|_| {}).unwrap();
        assert!(adapter.unsubscribe(again));
    }

    #[tokio::test]
    async fn test_sign_up_writes_record_and_signs_out() {
        let identity = MockIdentityProvider::new();
        let (adapter, profiles, _) = adapter(identity.clone());

        let uid = adapter.sign_up("ann@example.com", "secret1", "Ann").await.unwrap();

        assert!(adapter.current().is_none());
        let record = profiles.record(&uid).unwrap();
        assert_eq!(record.display_name.as_deref(), Some("Ann"));
        assert_eq!(record.email.as_deref(), Some("ann@example.com"));
        assert_eq!(record.created_at, Some(test_clock().now()));
        assert_eq!(
            identity.account("ann@example.com").and_then(|a| a.display_name),
            Some("Ann".to_string())
        );
    }

    #[tokio::test]
    async fn test_update_profile_uploads_local_photo() {
        let identity = MockIdentityProvider::new().with_signed_in("ann@example.com", "secret1", "Ann");
        let (adapter, profiles, images) = adapter(identity);
        let uid = adapter.current().unwrap().uid;
        profiles.set(&uid, &ProfileRecord::default()).await.unwrap();

        let reloaded = adapter
            .update_profile(ProfileUpdate::new().photo(PhotoSource::local("me.png", vec![1, 2, 3])))
            .await
            .unwrap();

        assert_eq!(images.uploads(), vec![("me.png".to_string(), 3)]);
        assert_eq!(
            reloaded.photo_url.as_deref(),
            Some("https://images.example.test/1/me.png")
        );
        assert_eq!(reloaded.display_name.as_deref(), Some("Ann"));
        let record = profiles.record(&uid).unwrap();
        assert_eq!(record.photo_url, reloaded.photo_url);
        assert_eq!(record.updated_at, Some(test_clock().now()));
    }

    #[tokio::test]
    async fn test_update_profile_skips_unchanged_email_and_empty_password() {
        let identity = MockIdentityProvider::new().with_signed_in("ann@example.com", "secret1", "Ann");
        let (adapter, profiles, _) = adapter(identity.clone());
        let uid = adapter.current().unwrap().uid;
        profiles.set(&uid, &ProfileRecord::default()).await.unwrap();

        // Would fail if either change reached the provider
        identity.set_require_recent_login(true);
        let reloaded = adapter
            .update_profile(
                ProfileUpdate::new()
                    .email("ann@example.com")
                    .password("")
                    .display_name("Annie"),
            )
            .await
            .unwrap();

        assert_eq!(reloaded.display_name.as_deref(), Some("Annie"));
        assert!(identity.password_matches("ann@example.com", "secret1"));
    }

    #[tokio::test]
    async fn test_update_profile_requires_signed_in_user() {
        let (adapter, _, _) = adapter(MockIdentityProvider::new());
        let error = adapter
            .update_profile(ProfileUpdate::new().display_name("Nobody"))
            .await
            .unwrap_err();
        assert_eq!(error.auth_kind(), Some(AuthFailureKind::NotSignedIn));
    }

    #[tokio::test]
    async fn test_upload_failure_stops_before_profile_write() {
        let identity = MockIdentityProvider::new().with_signed_in("ann@example.com", "secret1", "Ann");
        let (adapter, profiles, images) = adapter(identity.clone());
        images.set_fail_uploads(true);

        let error = adapter
            .update_profile(
                ProfileUpdate::new()
                    .display_name("Annie")
                    .photo(PhotoSource::local("me.png", vec![0])),
            )
            .await
            .unwrap_err();

        assert!(matches!(error, SessionError::StorageFailure { .. }));
        assert!(profiles.is_empty());
        assert_eq!(
            identity.account("ann@example.com").and_then(|a| a.display_name),
            Some("Ann".to_string())
        );
    }
}
