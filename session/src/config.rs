//! Configuration for the remote services.
//!
//! Every config has builder methods for tests and a `from_env` constructor
//! for the binary.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default identity service endpoint.
pub const DEFAULT_IDENTITY_ENDPOINT: &str = "https://identitytoolkit.googleapis.com";
/// Default token refresh endpoint.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://securetoken.googleapis.com";
/// Default document store endpoint.
pub const DEFAULT_FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com";
/// Default image host endpoint.
pub const DEFAULT_CLOUDINARY_ENDPOINT: &str = "https://api.cloudinary.com";
/// Default unsigned upload preset for profile pictures.
pub const DEFAULT_UPLOAD_PRESET: &str = "profile_pics";

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("Missing environment variable {0}")]
    Missing(&'static str),

    /// An environment variable could not be parsed.
    #[error("Invalid value for {var}: {reason}")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// Parse failure
        reason: String,
    },
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    env::var(var)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(var))
}

/// Firebase project settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirebaseConfig {
    /// Web API key
    pub api_key: String,
    /// Project identifier (document store path)
    pub project_id: String,
    /// Auth domain, informational
    pub auth_domain: Option<String>,
    /// Storage bucket, informational
    pub storage_bucket: Option<String>,
    /// Identity Toolkit base URL
    pub identity_endpoint: String,
    /// Secure Token base URL
    pub token_endpoint: String,
    /// Firestore base URL
    pub firestore_endpoint: String,
}

impl FirebaseConfig {
    /// Config for a project with the public endpoints.
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            auth_domain: None,
            storage_bucket: None,
            identity_endpoint: DEFAULT_IDENTITY_ENDPOINT.to_string(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            firestore_endpoint: DEFAULT_FIRESTORE_ENDPOINT.to_string(),
        }
    }

    /// Point every Firebase endpoint at one base URL (local emulators, tests).
    #[must_use]
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.identity_endpoint.clone_from(&base);
        self.token_endpoint.clone_from(&base);
        self.firestore_endpoint = base;
        self
    }

    /// Set the Identity Toolkit base URL.
    #[must_use]
    pub fn with_identity_endpoint(mut self, url: impl Into<String>) -> Self {
        self.identity_endpoint = url.into();
        self
    }

    /// Set the Secure Token base URL.
    #[must_use]
    pub fn with_token_endpoint(mut self, url: impl Into<String>) -> Self {
        self.token_endpoint = url.into();
        self
    }

    /// Set the Firestore base URL.
    #[must_use]
    pub fn with_firestore_endpoint(mut self, url: impl Into<String>) -> Self {
        self.firestore_endpoint = url.into();
        self
    }

    /// Load from `BRAINSTORM_FIREBASE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if the API key or project id is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(
            required("BRAINSTORM_FIREBASE_API_KEY")?,
            required("BRAINSTORM_FIREBASE_PROJECT_ID")?,
        );
        config.auth_domain = env::var("BRAINSTORM_FIREBASE_AUTH_DOMAIN").ok();
        config.storage_bucket = env::var("BRAINSTORM_FIREBASE_STORAGE_BUCKET").ok();
        if let Ok(url) = env::var("BRAINSTORM_FIREBASE_IDENTITY_ENDPOINT") {
            config.identity_endpoint = url;
        }
        if let Ok(url) = env::var("BRAINSTORM_FIREBASE_TOKEN_ENDPOINT") {
            config.token_endpoint = url;
        }
        if let Ok(url) = env::var("BRAINSTORM_FIRESTORE_ENDPOINT") {
            config.firestore_endpoint = url;
        }
        Ok(config)
    }
}

/// Cloudinary unsigned upload settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudinaryConfig {
    /// Cloud name
    pub cloud_name: String,
    /// Unsigned upload preset
    pub upload_preset: String,
    /// API base URL
    pub endpoint: String,
}

impl CloudinaryConfig {
    /// Config for a cloud with the default preset and endpoint.
    pub fn new(cloud_name: impl Into<String>) -> Self {
        Self {
            cloud_name: cloud_name.into(),
            upload_preset: DEFAULT_UPLOAD_PRESET.to_string(),
            endpoint: DEFAULT_CLOUDINARY_ENDPOINT.to_string(),
        }
    }

    /// Set the upload preset.
    #[must_use]
    pub fn with_upload_preset(mut self, preset: impl Into<String>) -> Self {
        self.upload_preset = preset.into();
        self
    }

    /// Set the API base URL.
    #[must_use]
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }

    /// Upload URL for this cloud.
    #[must_use]
    pub fn upload_url(&self) -> String {
        format!(
            "{}/v1_1/{}/upload",
            self.endpoint.trim_end_matches('/'),
            self.cloud_name
        )
    }

    /// Load from `BRAINSTORM_CLOUDINARY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if the cloud name is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(required("BRAINSTORM_CLOUDINARY_CLOUD_NAME")?);
        if let Ok(preset) = env::var("BRAINSTORM_CLOUDINARY_UPLOAD_PRESET") {
            config.upload_preset = preset;
        }
        if let Ok(url) = env::var("BRAINSTORM_CLOUDINARY_ENDPOINT") {
            config.endpoint = url;
        }
        Ok(config)
    }
}

/// HTTP client settings shared by every remote provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout
    pub timeout: Duration,
}

impl HttpConfig {
    /// Set the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load from `BRAINSTORM_HTTP_TIMEOUT_SECS` (default 30).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the value is not a whole number.
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var("BRAINSTORM_HTTP_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map(|secs| Self {
                    timeout: Duration::from_secs(secs),
                })
                .map_err(|e| ConfigError::Invalid {
                    var: "BRAINSTORM_HTTP_TIMEOUT_SECS",
                    reason: e.to_string(),
                }),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Build a `reqwest` client with these settings.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the TLS backend fails to initialise.
    pub fn client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("brainstorm/", env!("CARGO_PKG_VERSION")))
            .build()
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// Everything the binary needs to reach the remote services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Identity service and document store
    pub firebase: FirebaseConfig,
    /// Image host
    pub cloudinary: CloudinaryConfig,
    /// HTTP client
    pub http: HttpConfig,
}

impl AppConfig {
    /// Load the whole configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] hit.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            firebase: FirebaseConfig::from_env()?,
            cloudinary: CloudinaryConfig::from_env()?,
            http: HttpConfig::from_env()?,
        })
    }
}
