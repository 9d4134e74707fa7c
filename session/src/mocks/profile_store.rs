//! In-memory profile mirror.

use crate::error::{Result, SessionError};
use crate::providers::{ProfileRecord, ProfileStore};
use crate::state::PrincipalId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory [`ProfileStore`].
#[derive(Debug, Clone, Default)]
pub struct MockProfileStore {
    records: Arc<Mutex<HashMap<PrincipalId, ProfileRecord>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MockProfileStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail with `StorageFailure`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    /// Stored record for `uid`.
    #[must_use]
    pub fn record(&self, uid: &PrincipalId) -> Option<ProfileRecord> {
        self.records.lock().ok()?.get(uid).cloned()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(SessionError::storage("PERMISSION_DENIED"));
        }
        Ok(())
    }
}

fn overlay(target: &mut ProfileRecord, source: &ProfileRecord) {
    if source.display_name.is_some() {
        target.display_name.clone_from(&source.display_name);
    }
    if source.email.is_some() {
        target.email.clone_from(&source.email);
    }
    if source.photo_url.is_some() {
        target.photo_url.clone_from(&source.photo_url);
    }
    if source.created_at.is_some() {
        target.created_at = source.created_at;
    }
    if source.updated_at.is_some() {
        target.updated_at = source.updated_at;
    }
}

impl ProfileStore for MockProfileStore {
    fn set(
        &self,
        uid: &PrincipalId,
        record: &ProfileRecord,
    ) -> impl Future<Output = Result<()>> + Send {
        let store = self.clone();
        let uid = uid.clone();
        let record = record.clone();

        async move {
            store.check_writable()?;
            store
                .records
                .lock()
                .map_err(|_| SessionError::Internal("mock store poisoned".into()))?
                .insert(uid, record);
            Ok(())
        }
    }

    fn merge(
        &self,
        uid: &PrincipalId,
        record: &ProfileRecord,
    ) -> impl Future<Output = Result<()>> + Send {
        let store = self.clone();
        let uid = uid.clone();
        let record = record.clone();

        async move {
            store.check_writable()?;
            let mut records = store
                .records
                .lock()
                .map_err(|_| SessionError::Internal("mock store poisoned".into()))?;
            let existing = records
                .get_mut(&uid)
                .ok_or_else(|| SessionError::storage(format!("No document to update: users/{uid}")))?;
            overlay(existing, &record);
            Ok(())
        }
    }

    fn get(&self, uid: &PrincipalId) -> impl Future<Output = Result<Option<ProfileRecord>>> + Send {
        let store = self.clone();
        let uid = uid.clone();

        async move {
            Ok(store
                .records
                .lock()
                .map_err(|_| SessionError::Internal("mock store poisoned".into()))?
                .get(&uid)
                .cloned())
        }
    }
}
