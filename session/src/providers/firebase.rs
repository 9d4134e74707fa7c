//! Firebase Authentication over the Identity Toolkit REST API.
//!
//! Sessions are kept in memory. A session survives restarts only if the
//! caller persists [`FirebaseIdentityProvider::refresh_token`] and passes it
//! back to [`FirebaseIdentityProvider::initialize`].

use crate::config::{FirebaseConfig, HttpConfig};
use crate::error::{AuthFailureKind, Result, SessionError};
use crate::providers::firestore::BearerTokenSource;
use crate::providers::{IdentityProvider, ProfileFields};
use crate::state::IdentitySnapshot;
use brainstorm_core::observer::{ObserverRegistry, SubscriptionId};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Clone)]
struct FirebaseSession {
    user: IdentitySnapshot,
    id_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl FirebaseSession {
    fn is_fresh(&self) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > Utc::now()
    }

    fn apply_tokens(&mut self, id_token: Option<String>, refresh_token: Option<String>, expires_in: Option<&str>) {
        if let Some(id_token) = id_token {
            self.id_token = id_token;
            self.expires_at = expiry(expires_in);
        }
        if let Some(refresh_token) = refresh_token {
            self.refresh_token = refresh_token;
        }
    }
}

fn expiry(expires_in: Option<&str>) -> DateTime<Utc> {
    let secs = expires_in.and_then(|s| s.parse::<i64>().ok()).unwrap_or(3600);
    Utc::now() + Duration::seconds(secs)
}

/// Response of `accounts:signInWithPassword` and `accounts:signUp`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    profile_picture: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
}

/// Response of the Secure Token API.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
}

impl From<AccountInfo> for IdentitySnapshot {
    fn from(info: AccountInfo) -> Self {
        Self {
            uid: crate::state::PrincipalId::new(info.local_id),
            display_name: info.display_name,
            email: info.email,
            photo_url: info.photo_url,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateResponse {
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Map a Firebase error message onto an [`AuthFailureKind`].
///
/// Messages look like `WEAK_PASSWORD : Password should be at least 6 characters`;
/// only the leading code is inspected.
#[must_use]
pub fn classify_error(message: &str) -> AuthFailureKind {
    let code = message.split([' ', ':']).next().unwrap_or_default();
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            AuthFailureKind::InvalidCredentials
        },
        "INVALID_EMAIL" | "MISSING_EMAIL" => AuthFailureKind::InvalidEmail,
        "EMAIL_EXISTS" => AuthFailureKind::EmailAlreadyInUse,
        "WEAK_PASSWORD" | "MISSING_PASSWORD" => AuthFailureKind::WeakPassword,
        "USER_DISABLED" => AuthFailureKind::AccountDisabled,
        "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => AuthFailureKind::RequiresRecentLogin,
        "TOKEN_EXPIRED" | "INVALID_ID_TOKEN" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND" => {
            AuthFailureKind::SessionExpired
        },
        "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthFailureKind::RateLimited,
        _ => AuthFailureKind::Other,
    }
}

fn network(error: &reqwest::Error) -> SessionError {
    SessionError::auth(AuthFailureKind::Network, error.to_string())
}

fn invalidates_session(error: &SessionError) -> bool {
    matches!(
        error.auth_kind(),
        Some(AuthFailureKind::SessionExpired | AuthFailureKind::AccountDisabled)
    )
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response.json::<T>().await.map_err(|e| {
            SessionError::auth(AuthFailureKind::Other, format!("Malformed response: {e}"))
        });
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => {
            let kind = classify_error(&envelope.error.message);
            Err(SessionError::auth(kind, envelope.error.message))
        },
        Err(_) => Err(SessionError::auth(
            AuthFailureKind::Other,
            format!("HTTP {status}: {body}"),
        )),
    }
}

/// [`IdentityProvider`] backed by Firebase Authentication.
///
/// Cloning yields another handle to the same session and observers.
#[derive(Clone)]
pub struct FirebaseIdentityProvider {
    http: reqwest::Client,
    config: FirebaseConfig,
    session: Arc<RwLock<Option<FirebaseSession>>>,
    observers: ObserverRegistry<Option<IdentitySnapshot>>,
    initialized: Arc<AtomicBool>,
}

impl FirebaseIdentityProvider {
    /// Create a provider with no session.
    ///
    /// Observers registered before [`FirebaseIdentityProvider::initialize`]
    /// get their first call when it completes.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the HTTP client cannot be built.
    pub fn new(config: FirebaseConfig, http: &HttpConfig) -> Result<Self> {
        let client = http
            .client()
            .map_err(|e| SessionError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self::with_client(config, client))
    }

    /// Create a provider around an existing HTTP client.
    #[must_use]
    pub fn with_client(config: FirebaseConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            config,
            session: Arc::new(RwLock::new(None)),
            observers: ObserverRegistry::bounded(1),
            initialized: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Restore a persisted session and report it to observers.
    ///
    /// Without a refresh token the provider resolves as signed out. A
    /// rejected or unreachable token also resolves as signed out and the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` if the refresh token could not be exchanged.
    #[tracing::instrument(skip_all, fields(has_token = refresh_token.is_some()))]
    pub async fn initialize(&self, refresh_token: Option<&str>) -> Result<Option<IdentitySnapshot>> {
        let outcome = match refresh_token {
            Some(token) => self.restore(token).await.map(Some),
            None => Ok(None),
        };

        if let Err(error) = &outcome {
            tracing::warn!(%error, "Could not restore session, continuing signed out");
        }

        let publisher = self.observers.publisher();
        self.initialized.store(true, Ordering::Release);
        let current = self.current_user();
        tracing::info!(signed_in = current.is_some(), "Identity provider initialised");
        publisher.notify(&current);

        outcome
    }

    /// Returns `true` once [`FirebaseIdentityProvider::initialize`] has run
    /// or a sign-in has established a session.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Refresh token of the current session, for persistence.
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.read_session().map(|s| s.refresh_token)
    }

    async fn restore(&self, refresh_token: &str) -> Result<IdentitySnapshot> {
        let tokens = self.exchange_refresh_token(refresh_token).await?;
        let user: IdentitySnapshot = self.lookup(&tokens.id_token).await?.into();
        tracing::info!(uid = %user.uid, "Session restored");

        self.write_session(Some(FirebaseSession {
            user: user.clone(),
            id_token: tokens.id_token,
            refresh_token: tokens.refresh_token,
            expires_at: expiry(tokens.expires_in.as_deref()),
        }));
        Ok(user)
    }

    fn identity_url(&self, method: &str) -> String {
        format!(
            "{}/v1/accounts:{method}",
            self.config.identity_endpoint.trim_end_matches('/')
        )
    }

    async fn post_identity<T: DeserializeOwned>(&self, method: &str, body: &serde_json::Value) -> Result<T> {
        let response = self
            .http
            .post(self.identity_url(method))
            .query(&[("key", self.config.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| network(&e))?;
        decode(response).await
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let url = format!(
            "{}/v1/token",
            self.config.token_endpoint.trim_end_matches('/')
        );
        let response = self
            .http
            .post(url)
            .query(&[("key", self.config.api_key.as_str())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| network(&e))?;
        decode(response).await
    }

    async fn lookup(&self, id_token: &str) -> Result<AccountInfo> {
        let response: LookupResponse = self
            .post_identity("lookup", &json!({ "idToken": id_token }))
            .await?;
        response
            .users
            .into_iter()
            .next()
            .ok_or_else(|| SessionError::auth(AuthFailureKind::SessionExpired, "USER_NOT_FOUND"))
    }

    /// Current session with a usable ID token, refreshing it if needed.
    async fn active_session(&self) -> Result<FirebaseSession> {
        let session = self
            .read_session()
            .ok_or_else(|| SessionError::auth(AuthFailureKind::NotSignedIn, "No user is signed in"))?;
        if session.is_fresh() {
            return Ok(session);
        }

        tracing::debug!(uid = %session.user.uid, "Refreshing ID token");
        match self.exchange_refresh_token(&session.refresh_token).await {
            Ok(tokens) => {
                let mut refreshed = session;
                refreshed.apply_tokens(
                    Some(tokens.id_token),
                    Some(tokens.refresh_token),
                    tokens.expires_in.as_deref(),
                );
                self.write_session(Some(refreshed.clone()));
                Ok(refreshed)
            },
            Err(error) => Err(self.check_invalidation(error)),
        }
    }

    /// Drop the session and tell observers if `error` means it is gone.
    fn check_invalidation(&self, error: SessionError) -> SessionError {
        if invalidates_session(&error) {
            let publisher = self.observers.publisher();
            if self.write_session(None).is_some() {
                tracing::warn!(%error, "Session invalidated by identity service");
                publisher.notify(&None);
            }
        }
        error
    }

    /// Apply an `accounts:update` call to the signed-in principal.
    async fn update_account(
        &self,
        mut body: serde_json::Value,
        apply: impl FnOnce(&mut IdentitySnapshot),
    ) -> Result<()> {
        let session = self.active_session().await?;
        body["idToken"] = json!(session.id_token);

        let response: UpdateResponse = match self.post_identity("update", &body).await {
            Ok(response) => response,
            Err(error) => return Err(self.check_invalidation(error)),
        };

        let mut guard = self.session.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = guard.as_mut().filter(|s| s.user.uid == session.user.uid) {
            current.apply_tokens(
                response.id_token,
                response.refresh_token,
                response.expires_in.as_deref(),
            );
            apply(&mut current.user);
        }
        Ok(())
    }

    fn start_session(&self, response: AuthResponse) -> IdentitySnapshot {
        let user = IdentitySnapshot {
            uid: crate::state::PrincipalId::new(response.local_id),
            display_name: response.display_name.filter(|name| !name.is_empty()),
            email: response.email,
            photo_url: response.profile_picture,
        };
        // A fresh sign-in settles the session even if restoration never ran
        let publisher = self.observers.publisher();
        self.write_session(Some(FirebaseSession {
            user: user.clone(),
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            expires_at: expiry(response.expires_in.as_deref()),
        }));
        self.initialized.store(true, Ordering::Release);
        publisher.notify(&Some(user.clone()));
        user
    }

    fn read_session(&self) -> Option<FirebaseSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the session, returning the previous one.
    fn write_session(&self, session: Option<FirebaseSession>) -> Option<FirebaseSession> {
        let mut guard = self.session.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, session)
    }
}

impl std::fmt::Debug for FirebaseIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseIdentityProvider")
            .field("project_id", &self.config.project_id)
            .field("signed_in", &self.read_session().is_some())
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl IdentityProvider for FirebaseIdentityProvider {
    fn current_user(&self) -> Option<IdentitySnapshot> {
        if !self.is_initialized() {
            return None;
        }
        self.read_session().map(|s| s.user)
    }

    fn on_auth_state_changed<F>(&self, observer: F) -> Result<SubscriptionId>
    where
        F: Fn(&Option<IdentitySnapshot>) + Send + Sync + 'static,
    {
        let id = self.observers.register_with(observer, || {
            self.is_initialized().then(|| self.current_user())
        })?;
        Ok(id)
    }

    fn remove_observer(&self, id: SubscriptionId) -> bool {
        self.observers.unregister(id)
    }

    #[tracing::instrument(skip(self, password))]
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<IdentitySnapshot> {
        let response: AuthResponse = self
            .post_identity(
                "signInWithPassword",
                &json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let user = self.start_session(response);
        tracing::info!(uid = %user.uid, "Signed in");
        Ok(user)
    }

    #[tracing::instrument(skip(self, password))]
    async fn create_account(&self, email: &str, password: &str) -> Result<IdentitySnapshot> {
        let response: AuthResponse = self
            .post_identity(
                "signUp",
                &json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let user = self.start_session(response);
        tracing::info!(uid = %user.uid, "Account created");
        Ok(user)
    }

    async fn update_email(&self, email: &str) -> Result<()> {
        let new_email = email.to_string();
        self.update_account(
            json!({ "email": email, "returnSecureToken": true }),
            move |user| user.email = Some(new_email),
        )
        .await
    }

    async fn update_password(&self, password: &str) -> Result<()> {
        self.update_account(
            json!({ "password": password, "returnSecureToken": true }),
            |_| {},
        )
        .await
    }

    async fn update_profile(&self, fields: ProfileFields) -> Result<()> {
        let mut body = json!({ "returnSecureToken": false });
        if let Some(name) = &fields.display_name {
            body["displayName"] = json!(name);
        }
        if let Some(url) = &fields.photo_url {
            body["photoUrl"] = json!(url);
        }

        self.update_account(body, move |user| {
            if let Some(name) = fields.display_name {
                user.display_name = Some(name);
            }
            if let Some(url) = fields.photo_url {
                user.photo_url = Some(url);
            }
        })
        .await
    }

    async fn reload(&self) -> Result<Option<IdentitySnapshot>> {
        if self.read_session().is_none() {
            return Ok(None);
        }
        let session = self.active_session().await?;

        let user: IdentitySnapshot = match self.lookup(&session.id_token).await {
            Ok(info) => info.into(),
            Err(error) => return Err(self.check_invalidation(error)),
        };

        let mut guard = self.session.write().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(current) if current.user.uid == user.uid => {
                current.user = user.clone();
                Ok(Some(user))
            },
            // Signed out while the lookup was in flight
            _ => Ok(None),
        }
    }

    async fn sign_out(&self) -> Result<()> {
        let publisher = self.observers.publisher();
        if let Some(previous) = self.write_session(None) {
            tracing::info!(uid = %previous.user.uid, "Signed out");
            publisher.notify(&None);
        }
        Ok(())
    }
}

impl BearerTokenSource for FirebaseIdentityProvider {
    async fn bearer_token(&self) -> Result<Option<String>> {
        if self.read_session().is_none() {
            return Ok(None);
        }
        self.active_session().await.map(|s| Some(s.id_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_codes() {
        assert_eq!(classify_error("EMAIL_EXISTS"), AuthFailureKind::EmailAlreadyInUse);
        assert_eq!(
            classify_error("INVALID_LOGIN_CREDENTIALS"),
            AuthFailureKind::InvalidCredentials
        );
        assert_eq!(
            classify_error("WEAK_PASSWORD : Password should be at least 6 characters"),
            AuthFailureKind::WeakPassword
        );
        assert_eq!(classify_error("USER_DISABLED"), AuthFailureKind::AccountDisabled);
        assert_eq!(
            classify_error("CREDENTIAL_TOO_OLD_LOGIN_AGAIN"),
            AuthFailureKind::RequiresRecentLogin
        );
        assert_eq!(classify_error("TOKEN_EXPIRED"), AuthFailureKind::SessionExpired);
    }

    #[test]
    fn test_classify_unknown_code() {
        assert_eq!(classify_error("OPERATION_NOT_ALLOWED"), AuthFailureKind::Other);
        assert_eq!(classify_error(""), AuthFailureKind::Other);
    }

    #[test]
    fn test_expiry_defaults_to_one_hour() {
        let at = expiry(None);
        let delta = at - Utc::now();
        assert!(delta > Duration::minutes(59) && delta <= Duration::minutes(60));
    }

    #[test]
    fn test_current_user_is_none_before_initialize() {
        let provider = FirebaseIdentityProvider::with_client(
            FirebaseConfig::new("key", "p"),
            reqwest::Client::new(),
        );
        assert!(!provider.is_initialized());
        assert!(provider.current_user().is_none());
    }
}
