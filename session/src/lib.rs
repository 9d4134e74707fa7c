//! # Brainstorm Session
//!
//! Client-side session and identity propagation.
//!
//! One [`SessionContext`] per process holds the signed-in principal and a
//! "resolved yet?" flag. It learns both from an [`IdentityAdapter`], which
//! wraps the remote identity service, the `users/{uid}` profile mirror and
//! the image host behind the traits in [`providers`].
//!
//! ## Flow
//!
//! 1. The binary builds the providers and the adapter
//! 2. [`SessionContext::start`] subscribes once
//! 3. The provider reports the restored session (or its absence); the
//!    context marks itself resolved
//! 4. Screens read [`SessionContext::watch`] and route with
//!    [`routing::resolve_route`]
//! 5. Mutations go through the context; their outcome arrives through the
//!    subscription, except profile updates, which are written directly
//!
//! ## Example
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), brainstorm_session::SessionError> {
//! use brainstorm_session::mocks::{MockIdentityProvider, MockImageHost, MockProfileStore};
//! use brainstorm_session::{IdentityAdapter, SessionContext, SessionEnvironment};
//! use std::sync::Arc;
//!
//! let identity = MockIdentityProvider::new().with_account("ann@example.com", "secret1", "Ann");
//! let adapter = Arc::new(IdentityAdapter::new(
//!     Arc::new(identity),
//!     Arc::new(MockProfileStore::new()),
//!     Arc::new(MockImageHost::new()),
//! ));
//!
//! let session = SessionContext::start(adapter, SessionEnvironment::default())?;
//! assert!(session.is_resolved());
//!
//! session.sign_in("ann@example.com", "secret1").await?;
//! assert_eq!(session.state().greeting_name(), "Ann");
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![allow(clippy::module_name_repetitions)]

pub mod actions;
pub mod adapter;
pub mod config;
pub mod context;
pub mod error;
#[cfg(feature = "test-utils")]
pub mod mocks;
pub mod providers;
pub mod reducer;
pub mod routing;
pub mod state;

pub use actions::SessionAction;
pub use adapter::{IdentityAdapter, SubscriptionHandle};
pub use config::{AppConfig, CloudinaryConfig, ConfigError, FirebaseConfig, HttpConfig};
pub use context::{SessionContext, SessionStore};
pub use error::{AuthFailureKind, Result, SessionError};
pub use providers::{PhotoSource, ProfileRecord, ProfileUpdate};
pub use reducer::{SessionEnvironment, SessionReducer};
pub use routing::{resolve_route, Route};
pub use state::{IdentitySnapshot, PrincipalId, SessionPhase, SessionState};
