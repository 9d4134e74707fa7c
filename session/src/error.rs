//! Error types for session and identity operations.

use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Why the identity service refused an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthFailureKind {
    /// Unknown email or wrong password.
    InvalidCredentials,
    /// Email is malformed.
    InvalidEmail,
    /// Another account already uses this email.
    EmailAlreadyInUse,
    /// Password rejected by the service's strength rules.
    WeakPassword,
    /// Account was disabled by an administrator.
    AccountDisabled,
    /// Operation needs a signed-in principal and there is none.
    NotSignedIn,
    /// Sensitive change needs a fresh sign-in.
    RequiresRecentLogin,
    /// Stored session is no longer valid.
    SessionExpired,
    /// Too many attempts, try again later.
    RateLimited,
    /// Service could not be reached.
    Network,
    /// Anything the service reported that has no dedicated kind.
    Other,
}

impl std::fmt::Display for AuthFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::InvalidCredentials => "invalid credentials",
            Self::InvalidEmail => "invalid email",
            Self::EmailAlreadyInUse => "email already in use",
            Self::WeakPassword => "weak password",
            Self::AccountDisabled => "account disabled",
            Self::NotSignedIn => "not signed in",
            Self::RequiresRecentLogin => "requires recent login",
            Self::SessionExpired => "session expired",
            Self::RateLimited => "rate limited",
            Self::Network => "network error",
            Self::Other => "authentication error",
        };
        f.write_str(label)
    }
}

/// Failures surfaced by the identity adapter and session context.
///
/// Errors go back to the caller of the mutation. The session snapshot is
/// never touched by a failed operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The identity service rejected the operation or could not be reached.
    #[error("{kind}: {reason}")]
    AuthFailure {
        /// Classified cause
        kind: AuthFailureKind,
        /// Message from the service
        reason: String,
    },

    /// The image host or the profile mirror failed.
    #[error("Storage failure: {reason}")]
    StorageFailure {
        /// Message from the storage service
        reason: String,
    },

    /// The identity provider already has its auth-state observer.
    #[error("A session subscription is already active")]
    AlreadySubscribed,

    /// Internal error (poisoned lock, runtime shutdown).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Build an [`SessionError::AuthFailure`].
    pub fn auth(kind: AuthFailureKind, reason: impl Into<String>) -> Self {
        Self::AuthFailure {
            kind,
            reason: reason.into(),
        }
    }

    /// Build a [`SessionError::StorageFailure`].
    pub fn storage(reason: impl Into<String>) -> Self {
        Self::StorageFailure {
            reason: reason.into(),
        }
    }

    /// The auth failure kind, if this is an auth failure.
    #[must_use]
    pub const fn auth_kind(&self) -> Option<AuthFailureKind> {
        match self {
            Self::AuthFailure { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<brainstorm_core::observer::RegistryFull> for SessionError {
    fn from(_: brainstorm_core::observer::RegistryFull) -> Self {
        Self::AlreadySubscribed
    }
}

impl From<brainstorm_runtime::StoreError> for SessionError {
    fn from(error: brainstorm_runtime::StoreError) -> Self {
        Self::Internal(error.to_string())
    }
}
