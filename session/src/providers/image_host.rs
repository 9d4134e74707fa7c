//! Image host trait.

use crate::error::Result;
use std::future::Future;

/// File hosting service for profile pictures.
pub trait ImageHost: Send + Sync {
    /// Upload an image and return its public HTTPS URL.
    ///
    /// # Errors
    ///
    /// Returns `StorageFailure` if the upload is rejected or the host is
    /// unreachable.
    fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<String>> + Send;
}
