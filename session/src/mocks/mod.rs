//! In-memory providers for tests and offline development.
//!
//! Every mock is cheap to clone and clones share state, so a test can keep
//! a handle to inspect or inject failures after handing one to the adapter.

mod identity;
mod image_host;
mod profile_store;

pub use identity::{MockIdentityProvider, MIN_PASSWORD_LEN};
pub use image_host::MockImageHost;
pub use profile_store::MockProfileStore;
