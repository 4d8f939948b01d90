use crate::config::CacheConfig;
use crate::fingerprint::fingerprint;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::{Debug, Display, Formatter};
use std::future::Future;
use std::sync::Arc;
use store::{IdempotencyRecord, RecordKey, RecordPatch, RecordStatus, RecordStore, StoreError};

/// What a caller gets back from [`IdempotencyCache::execute`]: one of
/// three distinguishable shapes, never an opaque error for the
/// concurrency case.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<Response> {
    /// The freshly computed or cached terminal result.
    Completed(Response),
    /// Replay of a FAILED record: the error serialized when the
    /// original execution failed.
    Failed(Value),
    /// Another execution currently holds the lock for this fingerprint.
    InProgress,
}

/// Errors arising from an idempotent execution.
#[derive(Debug)]
pub enum CacheError<E> {
    /// The store failed before the lock was acquired.
    Storage(StoreError),
    /// The wrapped operation itself failed; always re-raised, recording
    /// the failure is a side effect and never a substitute.
    Operation(E),
    /// A cached response could not be read back as the caller's type.
    BadRecord(String),
}

impl<E: Display> Display for CacheError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Storage(err) => write!(f, "idempotency store failed: {err}"),
            CacheError::Operation(err) => write!(f, "operation failed: {err}"),
            CacheError::BadRecord(err) => write!(f, "bad idempotency record: {err}"),
        }
    }
}

impl<E: Debug + Display> std::error::Error for CacheError<E> {}

/// Coordinates concurrent callers around one record per (scope,
/// fingerprint) in a conditional store.
///
/// Mutual exclusion is achieved entirely through the store's atomic
/// conditional insert; no in-process lock is held. A lock whose owner
/// crashed stays IN_PROGRESS until the store's time-to-live expires it;
/// retried requests during that window are told to wait.
#[derive(Clone)]
pub struct IdempotencyCache {
    record_store: Arc<dyn RecordStore>,
    config: CacheConfig,
}

impl IdempotencyCache {
    pub fn new(record_store: Arc<dyn RecordStore>, config: CacheConfig) -> Self {
        IdempotencyCache {
            record_store,
            config,
        }
    }

    /// Execute `operation` at most once per input fingerprint.
    ///
    /// The input is projected onto the configured fields and hashed;
    /// the same input value is then passed through to the operation
    /// unchanged. Lock acquisition is sequential: the record is created
    /// before the operation runs, so callers destined to be rejected
    /// never invoke it.
    pub async fn execute<Input, Response, Err, Op, Fut>(
        &self,
        input: Input,
        operation: Op,
    ) -> Result<Outcome<Response>, CacheError<Err>>
    where
        Input: Serialize,
        Response: Serialize + DeserializeOwned,
        Err: Display,
        Op: FnOnce(Input) -> Fut,
        Fut: Future<Output = Result<Response, Err>>,
    {
        let payload: Value = serde_json::to_value(&input)
            .map_err(|err| CacheError::BadRecord(err.to_string()))?;
        let fingerprint: String = fingerprint(&self.config.hashed_fields, &payload);
        let key: RecordKey = RecordKey::new(self.config.scope.clone(), fingerprint);

        if let Some(record) = self
            .record_store
            .get(&key)
            .await
            .map_err(CacheError::Storage)?
        {
            tracing::debug!(
                partition_key = %key.partition_key(),
                status = ?record.status,
                "replaying existing record"
            );

            return replay(record);
        }

        let record: IdempotencyRecord = IdempotencyRecord::in_progress(&key, self.config.ttl);

        match self.record_store.put(record).await {
            Ok(()) => {}
            // A concurrent caller won the conditional insert
            Err(StoreError::AlreadyExists) => {
                tracing::debug!(partition_key = %key.partition_key(), "lost the lock race");

                return Ok(Outcome::InProgress);
            }
            Err(err) => return Err(CacheError::Storage(err)),
        }

        // This caller holds the lock; run the operation
        match operation(input).await {
            Ok(response) => {
                match serde_json::to_value(&response) {
                    Ok(payload) => self.finish(&key, RecordPatch::completed(payload)).await,
                    // The record stays locked until the TTL expires it
                    Err(err) => tracing::warn!(
                        partition_key = %key.partition_key(),
                        error = %err,
                        "response not serializable, record left in progress"
                    ),
                }

                Ok(Outcome::Completed(response))
            }
            Err(err) => {
                self.finish(&key, RecordPatch::failed(serialize_error(&err)))
                    .await;

                Err(CacheError::Operation(err))
            }
        }
    }

    /// Best-effort terminal transition. The operation already produced
    /// an authoritative result, so a losing or failing update is only
    /// logged, never raised.
    async fn finish(&self, key: &RecordKey, patch: RecordPatch) {
        if let Err(err) = self.record_store.update(key, patch).await {
            tracing::warn!(
                partition_key = %key.partition_key(),
                error = %err,
                "failed to persist terminal idempotency record"
            );
        }
    }
}

fn replay<Response: DeserializeOwned, Err>(
    record: IdempotencyRecord,
) -> Result<Outcome<Response>, CacheError<Err>> {
    let response: Value = record.response.unwrap_or(Value::Null);

    match record.status {
        RecordStatus::InProgress => Ok(Outcome::InProgress),
        RecordStatus::Completed => serde_json::from_value(response)
            .map(Outcome::Completed)
            .map_err(|err| CacheError::BadRecord(err.to_string())),
        RecordStatus::Failed => Ok(Outcome::Failed(response)),
    }
}

fn serialize_error(err: &impl Display) -> Value {
    serde_json::json!({
        "name": "OperationError",
        "message": err.to_string(),
    })
}
