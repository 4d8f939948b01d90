use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use store::{IdempotencyRecord, RecordKey, RecordPatch, RecordStore, StoreError};

/// Sample request type for cache and fingerprint tests. `note` is the
/// field left out of hashing in most scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOrder {
    pub order_id: u64,
    pub customer: String,
    pub note: String,
}

impl TestOrder {
    pub fn new(order_id: u64) -> Self {
        TestOrder {
            order_id,
            customer: "c1".to_string(),
            note: String::new(),
        }
    }
}

/// Decorates a store, failing selected operations with a backend error.
pub struct FlakyStore<S> {
    inner: S,
    fail_gets: AtomicBool,
    fail_puts: AtomicBool,
    fail_updates: AtomicBool,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        FlakyStore {
            inner,
            fail_gets: AtomicBool::new(false),
            fail_puts: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
        }
    }

    pub fn failing_gets(self) -> Self {
        self.fail_gets.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_puts(self) -> Self {
        self.fail_puts.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_updates(self) -> Self {
        self.fail_updates.store(true, Ordering::SeqCst);
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn inject(flag: &AtomicBool, operation: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(
                format!("injected {operation} failure").into(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for FlakyStore<S> {
    async fn get(&self, key: &RecordKey) -> Result<Option<IdempotencyRecord>, StoreError> {
        Self::inject(&self.fail_gets, "get")?;
        self.inner.get(key).await
    }

    async fn put(&self, record: IdempotencyRecord) -> Result<(), StoreError> {
        Self::inject(&self.fail_puts, "put")?;
        self.inner.put(record).await
    }

    async fn update(&self, key: &RecordKey, patch: RecordPatch) -> Result<(), StoreError> {
        Self::inject(&self.fail_updates, "update")?;
        self.inner.update(key, patch).await
    }
}

/// Decorates a store to replay the window where a concurrent caller
/// wins the insert race between this caller's `get` and `put`: the next
/// `get` reports the record as absent even though the inner store
/// already holds it, so the following conditional `put` loses.
pub struct RacingStore<S> {
    inner: S,
    hide_next_get: AtomicBool,
}

impl<S> RacingStore<S> {
    pub fn new(inner: S) -> Self {
        RacingStore {
            inner,
            hide_next_get: AtomicBool::new(true),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for RacingStore<S> {
    async fn get(&self, key: &RecordKey) -> Result<Option<IdempotencyRecord>, StoreError> {
        if self.hide_next_get.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }

        self.inner.get(key).await
    }

    async fn put(&self, record: IdempotencyRecord) -> Result<(), StoreError> {
        self.inner.put(record).await
    }

    async fn update(&self, key: &RecordKey, patch: RecordPatch) -> Result<(), StoreError> {
        self.inner.update(key, patch).await
    }
}
