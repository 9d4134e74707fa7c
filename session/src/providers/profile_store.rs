//! Profile mirror store trait.

use crate::error::Result;
use crate::providers::ProfileRecord;
use crate::state::PrincipalId;
use std::future::Future;

/// Document store holding one [`ProfileRecord`] per principal at `users/{uid}`.
pub trait ProfileStore: Send + Sync {
    /// Replace the record with the `Some` fields of `record`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageFailure` if the write fails.
    fn set(
        &self,
        uid: &PrincipalId,
        record: &ProfileRecord,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Overwrite only the `Some` fields of an existing record.
    ///
    /// # Errors
    ///
    /// Returns `StorageFailure` if the record does not exist or the write fails.
    fn merge(
        &self,
        uid: &PrincipalId,
        record: &ProfileRecord,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Read the record, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageFailure` if the read fails.
    fn get(&self, uid: &PrincipalId) -> impl Future<Output = Result<Option<ProfileRecord>>> + Send;
}
