//! Session state types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of an authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Wrap a provider-issued identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Profile of the authenticated principal, as reported by the identity provider.
///
/// Snapshots are replaced wholesale on every change, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    /// Principal identifier
    pub uid: PrincipalId,
    /// Display name, if set
    pub display_name: Option<String>,
    /// Email address, if known
    pub email: Option<String>,
    /// Public URL of the profile image, if set
    pub photo_url: Option<String>,
}

impl IdentitySnapshot {
    /// Snapshot with only an identifier.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: PrincipalId::new(uid),
            display_name: None,
            email: None,
            photo_url: None,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the photo URL.
    #[must_use]
    pub fn with_photo_url(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }

    /// Name to greet the user with: the display name, or `"Guest"`.
    #[must_use]
    pub fn greeting_name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("Guest")
    }
}

/// Derived view of [`SessionState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// The provider has not reported yet.
    Unresolved,
    /// A principal is signed in.
    Authenticated(IdentitySnapshot),
    /// The provider reported that nobody is signed in.
    Anonymous,
}

/// Session state held by the session context.
///
/// `user` and `resolved` are the authoritative pair. `revision` counts
/// applied changes and `last_changed_at` stamps the latest one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Current principal, `None` when nobody is signed in
    pub user: Option<IdentitySnapshot>,
    /// `false` until the provider first reports, then `true` forever
    pub resolved: bool,
    /// Number of changes applied so far
    pub revision: u64,
    /// When the latest change was applied
    pub last_changed_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Phase derived from `resolved` and `user`.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match (&self.user, self.resolved) {
            (_, false) => SessionPhase::Unresolved,
            (Some(user), true) => SessionPhase::Authenticated(user.clone()),
            (None, true) => SessionPhase::Anonymous,
        }
    }

    /// Returns `true` once resolved with a signed-in principal.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.resolved && self.user.is_some()
    }

    /// Greeting for the home screen: display name, or `"Guest"`.
    #[must_use]
    pub fn greeting_name(&self) -> &str {
        self.user
            .as_ref()
            .map_or("Guest", IdentitySnapshot::greeting_name)
    }

    /// Avatar URL, `None` means show the placeholder image.
    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        self.user.as_ref().and_then(|user| user.photo_url.as_deref())
    }
}
