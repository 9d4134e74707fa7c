//! In-memory image host.

use crate::error::{Result, SessionError};
use crate::providers::ImageHost;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory [`ImageHost`] returning `https://images.example.test/{n}/{file}` URLs.
#[derive(Debug, Clone, Default)]
pub struct MockImageHost {
    uploads: Arc<Mutex<Vec<(String, usize)>>>,
    fail_uploads: Arc<AtomicBool>,
}

impl MockImageHost {
    /// Create a host with no uploads.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upload fail with `StorageFailure`.
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::Release);
    }

    /// Uploaded file names and sizes, in order.
    #[must_use]
    pub fn uploads(&self) -> Vec<(String, usize)> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

impl ImageHost for MockImageHost {
    fn upload(&self, file_name: &str, bytes: Vec<u8>) -> impl Future<Output = Result<String>> + Send {
        let host = self.clone();
        let file_name = file_name.to_string();

        async move {
            if host.fail_uploads.load(Ordering::Acquire) {
                return Err(SessionError::storage("Upload preset not found"));
            }
            let mut uploads = host
                .uploads
                .lock()
                .map_err(|_| SessionError::Internal("mock host poisoned".into()))?;
            uploads.push((file_name.clone(), bytes.len()));
            Ok(format!(
                "https://images.example.test/{}/{file_name}",
                uploads.len()
            ))
        }
    }
}
