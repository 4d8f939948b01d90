use async_trait::async_trait;
use std::fmt::{Display, Formatter};

pub use crate::record::{IdempotencyRecord, RecordKey, RecordPatch, RecordStatus, SORT_KEY};

mod record;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A conditional key-value store holding idempotency records.
///
/// All three operations are assumed atomic and strongly consistent with
/// respect to their precondition check; the locking protocol built on
/// top depends on exactly one concurrent conditional `put` succeeding
/// for a given key. Implementations perform their own marshalling into
/// the store's native attribute representation.
///
/// Records expire passively through the store's own time-to-live
/// mechanism; nothing ever deletes them explicitly.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, key: &RecordKey) -> Result<Option<IdempotencyRecord>, StoreError>;

    /// Insert, conditional on no record existing under the key.
    /// A lost race fails with [`StoreError::AlreadyExists`].
    async fn put(&self, record: IdempotencyRecord) -> Result<(), StoreError>;

    /// Patch to a terminal status, conditional on the record existing
    /// and still being `IN_PROGRESS`. A record that expired or was
    /// externally altered fails with [`StoreError::PreconditionFailed`].
    async fn update(&self, key: &RecordKey, patch: RecordPatch) -> Result<(), StoreError>;
}

/// Errors arising from the conditional store.
#[derive(Debug)]
pub enum StoreError {
    // A record already exists under the key
    AlreadyExists,
    // The record is missing or no longer IN_PROGRESS
    PreconditionFailed,
    // The record couldn't be (un)marshalled
    Serialization(String),
    // Any other failure from the backing store
    Backend(Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(format!("{:?}", self).as_str())
    }
}

impl std::error::Error for StoreError {}
