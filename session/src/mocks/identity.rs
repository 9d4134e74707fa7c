//! In-memory identity provider.

use crate::error::{AuthFailureKind, Result, SessionError};
use crate::providers::{IdentityProvider, ProfileFields};
use crate::state::{IdentitySnapshot, PrincipalId};
use brainstorm_core::observer::{ObserverRegistry, Publisher, SubscriptionId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Shortest password the mock accepts.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
struct MockAccount {
    uid: PrincipalId,
    email: String,
    password: String,
    display_name: Option<String>,
    photo_url: Option<String>,
    disabled: bool,
}

impl MockAccount {
    fn snapshot(&self) -> IdentitySnapshot {
        IdentitySnapshot {
            uid: self.uid.clone(),
            display_name: self.display_name.clone(),
            email: Some(self.email.clone()),
            photo_url: self.photo_url.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Directory {
    accounts: HashMap<PrincipalId, MockAccount>,
    current: Option<PrincipalId>,
}

impl Directory {
    fn find_by_email(&self, email: &str) -> Option<&MockAccount> {
        self.accounts
            .values()
            .find(|account| account.email.eq_ignore_ascii_case(email))
    }

    fn current_account(&mut self) -> Result<&mut MockAccount> {
        let uid = self
            .current
            .clone()
            .ok_or_else(|| SessionError::auth(AuthFailureKind::NotSignedIn, "No user is signed in"))?;
        self.accounts
            .get_mut(&uid)
            .ok_or_else(|| SessionError::auth(AuthFailureKind::SessionExpired, "USER_NOT_FOUND"))
    }

    fn current_snapshot(&self) -> Option<IdentitySnapshot> {
        self.current
            .as_ref()
            .and_then(|uid| self.accounts.get(uid))
            .map(MockAccount::snapshot)
    }
}

#[derive(Debug, Default)]
struct Faults {
    network_down: bool,
    fail_sign_out: bool,
    suppress_callbacks: bool,
    require_recent_login: bool,
}

/// In-memory [`IdentityProvider`] with failure injection.
///
/// Clones share accounts, session, observers and faults. Like the real
/// provider it takes a single auth-state observer.
///
/// # Example
///
/// ```
/// use brainstorm_session::mocks::MockIdentityProvider;
/// use brainstorm_session::providers::IdentityProvider;
///
/// let provider = MockIdentityProvider::new().with_account("ann@example.com", "secret1", "Ann");
/// assert!(provider.current_user().is_none());
/// assert!(provider.account("ann@example.com").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct MockIdentityProvider {
    directory: Arc<Mutex<Directory>>,
    faults: Arc<Mutex<Faults>>,
    observers: ObserverRegistry<Option<IdentitySnapshot>>,
    reports: Arc<Mutex<Vec<Option<IdentitySnapshot>>>>,
    initialized: Arc<AtomicBool>,
}

impl MockIdentityProvider {
    /// Provider that has already restored its (empty) session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            directory: Arc::new(Mutex::new(Directory::default())),
            faults: Arc::new(Mutex::new(Faults::default())),
            observers: ObserverRegistry::bounded(1),
            reports: Arc::new(Mutex::new(Vec::new())),
            initialized: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Provider still restoring its session.
    ///
    /// Observers get no call until [`MockIdentityProvider::complete_restore`].
    #[must_use]
    pub fn deferred() -> Self {
        let provider = Self::new();
        provider.initialized.store(false, Ordering::Release);
        provider
    }

    /// Finish restoring and report the current principal to observers.
    pub fn complete_restore(&self) {
        let publisher = self.observers.publisher();
        self.initialized.store(true, Ordering::Release);
        let current = self.current_user();
        self.emit(&publisher, &current);
    }

    /// Simulate an application restart.
    ///
    /// The new provider sees the same accounts and persisted session, with
    /// no observers and no faults.
    #[must_use]
    pub fn restart(&self) -> Self {
        Self {
            directory: Arc::clone(&self.directory),
            faults: Arc::new(Mutex::new(Faults::default())),
            observers: ObserverRegistry::bounded(1),
            reports: Arc::new(Mutex::new(Vec::new())),
            initialized: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Seed an account.
    #[must_use]
    pub fn with_account(self, email: &str, password: &str, display_name: &str) -> Self {
        if let Ok(mut directory) = self.directory.lock() {
            let uid = PrincipalId::new(format!("uid-{}", directory.accounts.len() + 1));
            directory.accounts.insert(
                uid.clone(),
                MockAccount {
                    uid,
                    email: email.to_string(),
                    password: password.to_string(),
                    display_name: Some(display_name.to_string()),
                    photo_url: None,
                    disabled: false,
                },
            );
        }
        self
    }

    /// Seed an account and sign it in without notifying anyone.
    #[must_use]
    pub fn with_signed_in(self, email: &str, password: &str, display_name: &str) -> Self {
        let provider = self.with_account(email, password, display_name);
        if let Ok(mut directory) = provider.directory.lock() {
            directory.current = directory.find_by_email(email).map(|a| a.uid.clone());
        }
        provider
    }

    /// Snapshot of the account registered under `email`.
    #[must_use]
    pub fn account(&self, email: &str) -> Option<IdentitySnapshot> {
        self.directory
            .lock()
            .ok()?
            .find_by_email(email)
            .map(MockAccount::snapshot)
    }

    /// Returns `true` if `password` is the stored password for `email`.
    #[must_use]
    pub fn password_matches(&self, email: &str, password: &str) -> bool {
        self.directory
            .lock()
            .ok()
            .and_then(|d| d.find_by_email(email).map(|a| a.password == password))
            .unwrap_or(false)
    }

    /// Make every remote call fail with a network error.
    pub fn set_network_down(&self, down: bool) {
        self.with_faults(|f| f.network_down = down);
    }

    /// Make sign-out fail with a network error.
    pub fn set_fail_sign_out(&self, fail: bool) {
        self.with_faults(|f| f.fail_sign_out = fail);
    }

    /// Stop calling observers (the session still changes).
    pub fn set_suppress_callbacks(&self, suppress: bool) {
        self.with_faults(|f| f.suppress_callbacks = suppress);
    }

    /// Make email and password changes fail with `RequiresRecentLogin`.
    pub fn set_require_recent_login(&self, required: bool) {
        self.with_faults(|f| f.require_recent_login = required);
    }

    /// Disable an account. If it is signed in, the session ends.
    pub fn disable_account(&self, email: &str) {
        let publisher = self.observers.publisher();
        let signed_out = {
            let Ok(mut directory) = self.directory.lock() else {
                return;
            };
            let Some(uid) = directory.find_by_email(email).map(|a| a.uid.clone()) else {
                return;
            };
            if let Some(account) = directory.accounts.get_mut(&uid) {
                account.disabled = true;
            }
            if directory.current.as_ref() == Some(&uid) {
                directory.current = None;
                true
            } else {
                false
            }
        };
        if signed_out {
            self.emit(&publisher, &None);
        }
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Every principal delivered to the observer so far, initial call included.
    #[must_use]
    pub fn reports(&self) -> Vec<Option<IdentitySnapshot>> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn record(&self, user: &Option<IdentitySnapshot>) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(user.clone());
        }
    }

    fn with_faults(&self, f: impl FnOnce(&mut Faults)) {
        if let Ok(mut faults) = self.faults.lock() {
            f(&mut faults);
        }
    }

    fn fault(&self, f: impl FnOnce(&Faults) -> bool) -> bool {
        self.faults.lock().map(|faults| f(&faults)).unwrap_or(false)
    }

    fn directory(&self) -> Result<MutexGuard<'_, Directory>> {
        self.directory
            .lock()
            .map_err(|_| SessionError::Internal("mock directory poisoned".into()))
    }

    fn check_network(&self) -> Result<()> {
        if self.fault(|f| f.network_down) {
            return Err(SessionError::auth(AuthFailureKind::Network, "network unreachable"));
        }
        Ok(())
    }

    fn check_recent_login(&self) -> Result<()> {
        if self.fault(|f| f.require_recent_login) {
            return Err(SessionError::auth(
                AuthFailureKind::RequiresRecentLogin,
                "CREDENTIAL_TOO_OLD_LOGIN_AGAIN",
            ));
        }
        Ok(())
    }

    /// Report `user` through a publisher taken before the change was made.
    fn emit(&self, publisher: &Publisher<'_, Option<IdentitySnapshot>>, user: &Option<IdentitySnapshot>) {
        if self.fault(|f| f.suppress_callbacks) {
            tracing::debug!("Auth state callback suppressed");
            return;
        }
        if !self.observers.is_empty() {
            self.record(user);
        }
        publisher.notify(user);
    }
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_email(email: &str) -> Result<()> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(())
    } else {
        Err(SessionError::auth(AuthFailureKind::InvalidEmail, "INVALID_EMAIL"))
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(SessionError::auth(
            AuthFailureKind::WeakPassword,
            format!("Password should be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}

impl IdentityProvider for MockIdentityProvider {
    fn current_user(&self) -> Option<IdentitySnapshot> {
        if !self.initialized.load(Ordering::Acquire) {
            return None;
        }
        self.directory.lock().ok()?.current_snapshot()
    }

    fn on_auth_state_changed<F>(&self, observer: F) -> Result<SubscriptionId>
    where
        F: Fn(&Option<IdentitySnapshot>) + Send + Sync + 'static,
    {
        let id = self.observers.register_with(observer, || {
            let initial = self
                .initialized
                .load(Ordering::Acquire)
                .then(|| self.current_user());
            if let Some(user) = &initial {
                self.record(user);
            }
            initial
        })?;
        Ok(id)
    }

    fn remove_observer(&self, id: SubscriptionId) -> bool {
        self.observers.unregister(id)
    }

    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<IdentitySnapshot>> + Send {
        let provider = self.clone();
        let email = email.to_string();
        let password = password.to_string();

        async move {
            provider.check_network()?;
            let publisher = provider.observers.publisher();
            let user = {
                let mut directory = provider.directory()?;
                let account = directory
                    .find_by_email(&email)
                    .filter(|a| a.password == password)
                    .ok_or_else(|| {
                        SessionError::auth(
                            AuthFailureKind::InvalidCredentials,
                            "INVALID_LOGIN_CREDENTIALS",
                        )
                    })?;
                if account.disabled {
                    return Err(SessionError::auth(AuthFailureKind::AccountDisabled, "USER_DISABLED"));
                }
                let user = account.snapshot();
                directory.current = Some(user.uid.clone());
                user
            };
            provider.emit(&publisher, &Some(user.clone()));
            Ok(user)
        }
    }

    fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<IdentitySnapshot>> + Send {
        let provider = self.clone();
        let email = email.to_string();
        let password = password.to_string();

        async move {
            provider.check_network()?;
            validate_email(&email)?;
            validate_password(&password)?;

            let publisher = provider.observers.publisher();
            let user = {
                let mut directory = provider.directory()?;
                if directory.find_by_email(&email).is_some() {
                    return Err(SessionError::auth(AuthFailureKind::EmailAlreadyInUse, "EMAIL_EXISTS"));
                }
                let uid = PrincipalId::new(uuid::Uuid::new_v4().simple().to_string());
                let account = MockAccount {
                    uid: uid.clone(),
                    email,
                    password,
                    display_name: None,
                    photo_url: None,
                    disabled: false,
                };
                let user = account.snapshot();
                directory.accounts.insert(uid.clone(), account);
                directory.current = Some(uid);
                user
            };
            provider.emit(&publisher, &Some(user.clone()));
            Ok(user)
        }
    }

    fn update_email(&self, email: &str) -> impl Future<Output = Result<()>> + Send {
        let provider = self.clone();
        let email = email.to_string();

        async move {
            provider.check_network()?;
            provider.check_recent_login()?;
            validate_email(&email)?;

            let mut directory = provider.directory()?;
            let uid = directory.current_account()?.uid.clone();
            if directory
                .find_by_email(&email)
                .is_some_and(|other| other.uid != uid)
            {
                return Err(SessionError::auth(AuthFailureKind::EmailAlreadyInUse, "EMAIL_EXISTS"));
            }
            directory.current_account()?.email = email;
            Ok(())
        }
    }

    fn update_password(&self, password: &str) -> impl Future<Output = Result<()>> + Send {
        let provider = self.clone();
        let password = password.to_string();

        async move {
            provider.check_network()?;
            provider.check_recent_login()?;
            validate_password(&password)?;
            provider.directory()?.current_account()?.password = password;
            Ok(())
        }
    }

    fn update_profile(&self, fields: ProfileFields) -> impl Future<Output = Result<()>> + Send {
        let provider = self.clone();

        async move {
            provider.check_network()?;
            let mut directory = provider.directory()?;
            let account = directory.current_account()?;
            if let Some(name) = fields.display_name {
                account.display_name = Some(name);
            }
            if let Some(url) = fields.photo_url {
                account.photo_url = Some(url);
            }
            Ok(())
        }
    }

    fn reload(&self) -> impl Future<Output = Result<Option<IdentitySnapshot>>> + Send {
        let provider = self.clone();

        async move {
            provider.check_network()?;
            Ok(provider.directory()?.current_snapshot())
        }
    }

    fn sign_out(&self) -> impl Future<Output = Result<()>> + Send {
        let provider = self.clone();

        async move {
            provider.check_network()?;
            if provider.fault(|f| f.fail_sign_out) {
                return Err(SessionError::auth(AuthFailureKind::Network, "sign-out request failed"));
            }
            let publisher = provider.observers.publisher();
            provider.directory()?.current = None;
            provider.emit(&publisher, &None);
            Ok(())
        }
    }
}
