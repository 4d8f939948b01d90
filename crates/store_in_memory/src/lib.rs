use async_trait::async_trait;
use chrono::{SecondsFormat, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use store::{IdempotencyRecord, RecordKey, RecordPatch, RecordStatus, RecordStore, StoreError};

/// In-process record store enforcing the same conditional-write
/// contract as the real backend.
///
/// Time-to-live is passive, as in the real store: an expired record is
/// treated as absent by `get`, overwritable by `put` and gone for
/// `update`. Tests can move the store's view of now forward with
/// [`InMemoryRecordStore::advance_clock`] instead of sleeping.
pub struct InMemoryRecordStore {
    records: Arc<Mutex<HashMap<String, IdempotencyRecord>>>,
    clock_offset: AtomicI64,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        InMemoryRecordStore {
            records: Arc::new(Mutex::new(Default::default())),
            clock_offset: AtomicI64::new(0),
        }
    }
}

impl InMemoryRecordStore {
    /// Move this store's view of now forward by `seconds`.
    pub fn advance_clock(&self, seconds: i64) {
        self.clock_offset.fetch_add(seconds, Ordering::SeqCst);
    }

    fn now(&self) -> i64 {
        Utc::now().timestamp() + self.clock_offset.load(Ordering::SeqCst)
    }

    /// Timestamp from the same offset clock the expiry checks use.
    fn timestamp(&self) -> String {
        let offset: TimeDelta = TimeDelta::seconds(self.clock_offset.load(Ordering::SeqCst));

        (Utc::now() + offset).to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn is_live(&self, record: &IdempotencyRecord) -> bool {
        record.expires_at > self.now()
    }

    /// Raw read bypassing TTL, for inspecting state in tests.
    pub fn peek(&self, key: &RecordKey) -> Option<IdempotencyRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&key.partition_key())
            .cloned()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<IdempotencyRecord>, StoreError> {
        let guard = self.records.lock().unwrap();
        let record: Option<IdempotencyRecord> = guard
            .get(&key.partition_key())
            .filter(|record| self.is_live(record))
            .cloned();

        Ok(record)
    }

    async fn put(&self, record: IdempotencyRecord) -> Result<(), StoreError> {
        let mut guard = self.records.lock().unwrap();

        // An expired record no longer blocks the conditional insert
        if let Some(existing) = guard.get(&record.partition_key) {
            if self.is_live(existing) {
                return Err(StoreError::AlreadyExists);
            }
        }

        guard.insert(record.partition_key.clone(), record);

        Ok(())
    }

    async fn update(&self, key: &RecordKey, patch: RecordPatch) -> Result<(), StoreError> {
        let mut guard = self.records.lock().unwrap();
        let partition_key: String = key.partition_key();

        let live: bool = guard
            .get(&partition_key)
            .is_some_and(|record| self.is_live(record) && record.status == RecordStatus::InProgress);

        if !live {
            return Err(StoreError::PreconditionFailed);
        }

        if let Some(record) = guard.get_mut(&partition_key) {
            record.status = patch.status;
            record.response = Some(patch.response);
            record.updated_at = self.timestamp();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn record(scope: &str, fingerprint: &str) -> IdempotencyRecord {
        IdempotencyRecord::in_progress(
            &RecordKey::new(scope, fingerprint),
            Duration::from_secs(600),
        )
    }

    #[tokio::test]
    async fn get_returns_nothing_for_missing_record() {
        let store: InMemoryRecordStore = Default::default();

        let found = store.get(&RecordKey::new("scope", "fp")).await.unwrap();

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn put_is_conditional_on_absence() {
        let store: InMemoryRecordStore = Default::default();

        store.put(record("scope", "fp")).await.unwrap();
        let second = store.put(record("scope", "fp")).await;

        assert!(matches!(second, Err(StoreError::AlreadyExists)));
    }

    #[tokio::test]
    async fn update_transitions_a_held_lock() {
        let store: InMemoryRecordStore = Default::default();
        let key: RecordKey = RecordKey::new("scope", "fp");

        store.put(record("scope", "fp")).await.unwrap();
        store
            .update(&key, RecordPatch::completed(json!({ "ok": true })))
            .await
            .unwrap();

        let found: IdempotencyRecord = store.get(&key).await.unwrap().unwrap();

        assert_eq!(RecordStatus::Completed, found.status);
        assert_eq!(Some(json!({ "ok": true })), found.response);
    }

    #[tokio::test]
    async fn update_requires_an_in_progress_record() {
        let store: InMemoryRecordStore = Default::default();
        let key: RecordKey = RecordKey::new("scope", "fp");

        // Missing record
        let missing = store
            .update(&key, RecordPatch::completed(json!(1)))
            .await;
        assert!(matches!(missing, Err(StoreError::PreconditionFailed)));

        // Already terminal
        store.put(record("scope", "fp")).await.unwrap();
        store
            .update(&key, RecordPatch::failed(json!("boom")))
            .await
            .unwrap();

        let repeat = store.update(&key, RecordPatch::completed(json!(1))).await;
        assert!(matches!(repeat, Err(StoreError::PreconditionFailed)));
    }

    #[tokio::test]
    async fn update_stamps_updated_at_from_the_store_clock() {
        let store: InMemoryRecordStore = Default::default();
        let key: RecordKey = RecordKey::new("scope", "fp");

        store.put(record("scope", "fp")).await.unwrap();
        store.advance_clock(120);
        store
            .update(&key, RecordPatch::completed(json!(1)))
            .await
            .unwrap();

        let found: IdempotencyRecord = store.peek(&key).unwrap();
        let created = chrono::DateTime::parse_from_rfc3339(&found.created_at).unwrap();
        let updated = chrono::DateTime::parse_from_rfc3339(&found.updated_at).unwrap();

        // The stamp moves with the advanced clock, not the real one
        assert!((updated - created).num_seconds() >= 120);
    }

    #[tokio::test]
    async fn expired_records_are_treated_as_absent() {
        let store: InMemoryRecordStore = Default::default();
        let key: RecordKey = RecordKey::new("scope", "fp");

        store.put(record("scope", "fp")).await.unwrap();
        store.advance_clock(601);

        assert!(store.get(&key).await.unwrap().is_none());

        // A fresh insert wins over the expired lock
        store.put(record("scope", "fp")).await.unwrap();

        // But the expired lock can no longer be updated once replaced
        store.advance_clock(601);
        let stale = store.update(&key, RecordPatch::completed(json!(1))).await;
        assert!(matches!(stale, Err(StoreError::PreconditionFailed)));
    }
}
