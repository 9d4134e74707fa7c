//! Provider traits for the remote services behind the identity adapter.
//!
//! - [`IdentityProvider`]: accounts, credentials, auth-state observers
//! - [`ProfileStore`]: the `users/{uid}` mirror record
//! - [`ImageHost`]: profile picture uploads
//!
//! REST implementations live next to the traits; in-memory ones are in
//! [`crate::mocks`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod cloudinary;
pub mod firebase;
pub mod firestore;
pub mod identity;
pub mod image_host;
pub mod profile_store;

pub use cloudinary::CloudinaryImageHost;
pub use firebase::FirebaseIdentityProvider;
pub use firestore::{BearerTokenSource, FirestoreProfileStore, StaticToken};
pub use identity::IdentityProvider;
pub use image_host::ImageHost;
pub use profile_store::ProfileStore;

/// Fields written onto the principal itself.
///
/// `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFields {
    /// New display name
    pub display_name: Option<String>,
    /// New photo URL
    pub photo_url: Option<String>,
}

/// Mirror record stored at `users/{uid}`.
///
/// Writes only carry the fields that are `Some`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    /// Display name
    pub display_name: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Profile image URL
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    /// When the record was created
    pub created_at: Option<DateTime<Utc>>,
    /// When the record was last updated
    pub updated_at: Option<DateTime<Utc>>,
}

/// Where a new profile image comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum PhotoSource {
    /// Already hosted; the URL is stored as-is.
    Remote(String),
    /// Local file that must be uploaded first.
    Local {
        /// File name sent to the host
        file_name: String,
        /// File contents
        bytes: Vec<u8>,
    },
}

impl PhotoSource {
    /// Classify a user-supplied reference: `http(s)://` URLs are remote.
    ///
    /// Local references still need their bytes, see [`PhotoSource::local`].
    #[must_use]
    pub fn is_remote_reference(reference: &str) -> bool {
        reference.starts_with("http://") || reference.starts_with("https://")
    }

    /// Local image.
    pub fn local(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::Local {
            file_name: file_name.into(),
            bytes,
        }
    }
}

impl std::fmt::Debug for PhotoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote(url) => f.debug_tuple("Remote").field(url).finish(),
            Self::Local { file_name, bytes } => f
                .debug_struct("Local")
                .field("file_name", file_name)
                .field("bytes", &bytes.len())
                .finish(),
        }
    }
}

/// Partial profile update requested by the user.
///
/// `None` (or an empty password) leaves the field as it is.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    /// New display name
    pub display_name: Option<String>,
    /// New email, applied only if it differs from the current one
    pub email: Option<String>,
    /// New password, applied only if non-empty
    pub password: Option<String>,
    /// New profile image
    pub photo: Option<PhotoSource>,
}

impl ProfileUpdate {
    /// Empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display name.
    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the email.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the profile image.
    #[must_use]
    pub fn photo(mut self, photo: PhotoSource) -> Self {
        self.photo = Some(photo);
        self
    }
}

// Passwords stay out of logs
impl std::fmt::Debug for ProfileUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileUpdate")
            .field("display_name", &self.display_name)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("photo", &self.photo)
            .finish()
    }
}
