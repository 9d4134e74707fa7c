//! End-to-end session behaviour over the in-memory providers.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use brainstorm_session::mocks::{MockIdentityProvider, MockImageHost, MockProfileStore};
use brainstorm_session::providers::{IdentityProvider, ProfileStore};
use brainstorm_session::{
    resolve_route, AuthFailureKind, IdentityAdapter, ProfileUpdate, Route, SessionContext,
    SessionEnvironment, SessionError, SessionPhase,
};
use brainstorm_testing::{epoch, init_test_tracing, test_clock, ManualClock};
use chrono::Duration as Elapsed;
use std::sync::Arc;
use std::time::Duration;

type MockAdapter = IdentityAdapter<MockIdentityProvider, MockProfileStore, MockImageHost>;
type MockSession = SessionContext<MockIdentityProvider, MockProfileStore, MockImageHost>;

struct Harness {
    identity: MockIdentityProvider,
    profiles: MockProfileStore,
    adapter: Arc<MockAdapter>,
    clock: ManualClock,
}

impl Harness {
    fn new(identity: MockIdentityProvider) -> Self {
        Self::with_profiles(identity, MockProfileStore::new())
    }

    fn with_profiles(identity: MockIdentityProvider, profiles: MockProfileStore) -> Self {
        init_test_tracing();
        let adapter = Arc::new(IdentityAdapter::with_clock(
            Arc::new(identity.clone()),
            Arc::new(profiles.clone()),
            Arc::new(MockImageHost::new()),
            Arc::new(test_clock()),
        ));
        Self {
            identity,
            profiles,
            adapter,
            clock: ManualClock::new(epoch()),
        }
    }

    fn start(&self) -> MockSession {
        SessionContext::start(
            Arc::clone(&self.adapter),
            SessionEnvironment::new(Arc::new(self.clock.clone())),
        )
        .unwrap()
    }
}

fn with_ann() -> MockIdentityProvider {
    MockIdentityProvider::new().with_account("ann@example.com", "secret1", "Ann")
}

#[test]
fn unresolved_until_first_callback() {
    let harness = Harness::new(MockIdentityProvider::deferred());
    let session = harness.start();

    assert!(!session.is_resolved());
    assert_eq!(session.phase(), SessionPhase::Unresolved);
    assert_eq!(resolve_route(&session.state()), Route::Splash);

    harness.identity.complete_restore();

    assert!(session.is_resolved());
    assert_eq!(session.phase(), SessionPhase::Anonymous);
    assert_eq!(resolve_route(&session.state()), Route::Onboarding);
}

#[test]
fn restored_session_is_reported_on_start() {
    let identity = MockIdentityProvider::new().with_signed_in("ann@example.com", "secret1", "Ann");
    let session = Harness::new(identity).start();

    assert!(session.is_resolved());
    assert_eq!(resolve_route(&session.state()), Route::Home);
    assert_eq!(session.state().greeting_name(), "Ann");
}

#[tokio::test]
async fn snapshot_follows_sign_in_and_sign_out() {
    let harness = Harness::new(with_ann());
    let session = harness.start();
    let reader = session.watch();

    session.sign_in("ann@example.com", "secret1").await.unwrap();

    let user = session.current_user().unwrap();
    assert_eq!(user.display_name.as_deref(), Some("Ann"));
    assert_eq!(reader.borrow().user.as_ref(), Some(&user));
    assert_eq!(harness.adapter.current(), Some(user));
    assert_eq!(session.state().last_changed_at, Some(epoch()));

    harness.clock.advance(Elapsed::minutes(10));
    session.sign_out().await.unwrap();

    assert!(session.current_user().is_none());
    assert!(reader.borrow().user.is_none());
    assert_eq!(
        reader.borrow().last_changed_at,
        Some(epoch() + Elapsed::minutes(10))
    );
    assert!(session.is_resolved());
}

#[tokio::test]
async fn sign_up_leaves_session_anonymous() {
    let harness = Harness::new(MockIdentityProvider::new());
    let session = harness.start();

    let uid = session.sign_up("ann@example.com", "secret1", "Ann").await.unwrap();

    assert_eq!(session.phase(), SessionPhase::Anonymous);
    let record = harness.profiles.record(&uid).unwrap();
    assert_eq!(record.display_name.as_deref(), Some("Ann"));
    assert_eq!(record.email.as_deref(), Some("ann@example.com"));
    assert!(record.created_at.is_some());

    // The new account can sign in afterwards
    session.sign_in("ann@example.com", "secret1").await.unwrap();
    assert_eq!(session.current_user().map(|u| u.uid), Some(uid));
}

#[tokio::test]
async fn wrong_password_leaves_snapshot_unchanged() {
    let harness = Harness::new(with_ann());
    let session = harness.start();
    let before = session.state();

    let error = session.sign_in("ann@example.com", "wrong-password").await.unwrap_err();

    assert_eq!(error.auth_kind(), Some(AuthFailureKind::InvalidCredentials));
    assert_eq!(session.state(), before);
}

#[tokio::test]
async fn network_failure_on_sign_in_is_auth_failure() {
    let harness = Harness::new(with_ann());
    let session = harness.start();
    harness.identity.set_network_down(true);

    let error = session.sign_in("ann@example.com", "secret1").await.unwrap_err();

    assert_eq!(error.auth_kind(), Some(AuthFailureKind::Network));
    assert_eq!(session.phase(), SessionPhase::Anonymous);
}

#[tokio::test]
async fn failed_sign_out_keeps_previous_snapshot() {
    let harness = Harness::new(with_ann());
    let session = harness.start();
    session.sign_in("ann@example.com", "secret1").await.unwrap();
    let before = session.state();

    harness.identity.set_fail_sign_out(true);
    let error = session.sign_out().await.unwrap_err();

    assert_eq!(error.auth_kind(), Some(AuthFailureKind::Network));
    assert_eq!(session.state(), before);
}

#[tokio::test]
async fn profile_update_is_visible_without_provider_callback() {
    let harness = Harness::new(with_ann());
    let session = harness.start();
    let uid = {
        session.sign_in("ann@example.com", "secret1").await.unwrap();
        session.current_user().unwrap().uid
    };
    harness
        .profiles
        .set(&uid, &Default::default())
        .await
        .unwrap();
    harness.identity.set_suppress_callbacks(true);
    let reader = session.watch();

    let updated = session
        .update_profile(ProfileUpdate::new().display_name("Annie"))
        .await
        .unwrap();

    assert_eq!(updated.display_name.as_deref(), Some("Annie"));
    assert_eq!(session.state().greeting_name(), "Annie");
    assert_eq!(
        reader.borrow().user.as_ref().and_then(|u| u.display_name.as_deref()),
        Some("Annie")
    );
    assert_eq!(
        harness.profiles.record(&uid).unwrap().display_name.as_deref(),
        Some("Annie")
    );
}

#[tokio::test]
async fn failed_profile_update_leaves_state_alone() {
    let harness = Harness::new(with_ann());
    let session = harness.start();
    session.sign_in("ann@example.com", "secret1").await.unwrap();
    let before = session.state();

    // No mirror record exists, so the merge step fails
    let error = session
        .update_profile(ProfileUpdate::new().display_name("Annie"))
        .await
        .unwrap_err();

    assert!(matches!(error, SessionError::StorageFailure { .. }));
    assert_eq!(session.state(), before);
}

#[test]
fn only_one_context_per_provider() {
    let harness = Harness::new(with_ann());
    let first = harness.start();

    let second = SessionContext::start(
        Arc::clone(&harness.adapter),
        SessionEnvironment::default(),
    );
    assert!(matches!(second, Err(SessionError::AlreadySubscribed)));
    assert_eq!(harness.identity.observer_count(), 1);

    // A second adapter over the same provider is refused as well
    let other = Harness::with_profiles(harness.identity.clone(), harness.profiles.clone());
    assert!(matches!(
        SessionContext::start(Arc::clone(&other.adapter), SessionEnvironment::default()),
        Err(SessionError::AlreadySubscribed)
    ));
    assert!(!other.adapter.is_subscribed());
    assert_eq!(harness.identity.observer_count(), 1);

    drop(first);
    assert_eq!(harness.identity.observer_count(), 0);
    let _third = other.start();
    assert!(other.adapter.is_subscribed());
}

#[test]
fn shutdown_releases_subscription() {
    let harness = Harness::new(with_ann());
    let session = harness.start();

    session.shutdown();

    assert!(!harness.adapter.is_subscribed());
    assert_eq!(harness.identity.observer_count(), 0);
}

#[tokio::test]
async fn updated_name_survives_restart() {
    let harness = Harness::new(with_ann());
    {
        let session = harness.start();
        session.sign_in("ann@example.com", "secret1").await.unwrap();
        let uid = session.current_user().unwrap().uid;
        harness.profiles.set(&uid, &Default::default()).await.unwrap();
        session
            .update_profile(ProfileUpdate::new().display_name("Annie"))
            .await
            .unwrap();
    }

    let restarted = Harness::with_profiles(harness.identity.restart(), harness.profiles.clone());
    let session = restarted.start();

    assert!(session.is_resolved());
    assert_eq!(
        session.current_user().and_then(|u| u.display_name),
        Some("Annie".to_string())
    );
}

#[tokio::test]
async fn disabled_account_ends_session() {
    let harness = Harness::new(with_ann());
    let session = harness.start();
    session.sign_in("ann@example.com", "secret1").await.unwrap();

    harness.identity.disable_account("ann@example.com");

    assert_eq!(session.phase(), SessionPhase::Anonymous);
    let error = session.sign_in("ann@example.com", "secret1").await.unwrap_err();
    assert_eq!(error.auth_kind(), Some(AuthFailureKind::AccountDisabled));
}

#[tokio::test]
async fn resolved_waits_for_first_callback() {
    let harness = Harness::new(MockIdentityProvider::deferred());
    let session = Arc::new(harness.start());

    let waiter = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.resolved().await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    harness.identity.complete_restore();

    let state = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("resolution should arrive")
        .unwrap()
        .unwrap();
    assert!(state.resolved);
    assert_eq!(state.revision, 1);
}

#[tokio::test]
async fn changed_reports_the_next_state() {
    let harness = Harness::new(with_ann());
    let session = Arc::new(harness.start());

    let waiter = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.changed().await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    session.sign_in("ann@example.com", "secret1").await.unwrap();

    let state = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("change should arrive")
        .unwrap()
        .unwrap();
    assert_eq!(state.greeting_name(), "Ann");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_sign_in_and_sign_out_agree_with_provider() {
    let harness = Harness::new(with_ann());
    let session = Arc::new(harness.start());

    for _ in 0..50 {
        let sign_in = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.sign_in("ann@example.com", "secret1").await })
        };
        let sign_out = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.sign_out().await })
        };
        sign_in.await.unwrap().unwrap();
        sign_out.await.unwrap().unwrap();

        assert_eq!(session.current_user(), harness.identity.current_user());
    }
}
