use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed sort key shared by every idempotency record.
/// This matches the `IdempotencyRecord` layout used by other
/// lambda-powertools libraries.
///
/// https://docs.powertools.aws.dev/lambda/typescript/latest/utilities/idempotency/
pub const SORT_KEY: &str = "IDEMPOTENCY_RECORD";

/// Identifies one record: at most one exists per (scope, fingerprint)
/// at any instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub scope: String,
    pub fingerprint: String,
}

impl RecordKey {
    pub fn new(scope: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        RecordKey {
            scope: scope.into(),
            fingerprint: fingerprint.into(),
        }
    }

    /// Composite partition key, `scope#fingerprint`.
    pub fn partition_key(&self) -> String {
        format!("{}#{}", self.scope, self.fingerprint)
    }
}

/// Transitions are monotonic: IN_PROGRESS to COMPLETED or FAILED,
/// never reversed. The conditional update precondition enforces this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
}

/// One cached execution, keyed by (scope, fingerprint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    #[serde(rename = "PK")]
    pub partition_key: String,
    #[serde(rename = "SK")]
    pub sort_key: String,

    pub status: RecordStatus,
    /// Set only once the record reaches COMPLETED or FAILED.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,

    pub scope: String,
    #[serde(rename = "idempotencyKey")]
    pub idempotency_key: String,

    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
    /// Epoch seconds after which the store may silently discard the
    /// record. Enforced by the store, not the application.
    #[serde(rename = "ttl")]
    pub expires_at: i64,
}

impl IdempotencyRecord {
    /// A fresh lock record, both timestamps stamped from a single clock
    /// reading.
    pub fn in_progress(key: &RecordKey, ttl: Duration) -> Self {
        let now: DateTime<Utc> = Utc::now();
        let timestamp: String = now.to_rfc3339_opts(SecondsFormat::Millis, true);

        IdempotencyRecord {
            partition_key: key.partition_key(),
            sort_key: SORT_KEY.to_string(),
            status: RecordStatus::InProgress,
            response: None,
            scope: key.scope.clone(),
            idempotency_key: key.fingerprint.clone(),
            created_at: timestamp.clone(),
            updated_at: timestamp,
            expires_at: now.timestamp() + ttl.as_secs() as i64,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, RecordStatus::InProgress)
    }
}

/// The terminal-state transition applied once the wrapped operation
/// finishes.
#[derive(Debug, Clone)]
pub struct RecordPatch {
    pub status: RecordStatus,
    pub response: serde_json::Value,
}

impl RecordPatch {
    pub fn completed(response: serde_json::Value) -> Self {
        RecordPatch {
            status: RecordStatus::Completed,
            response,
        }
    }

    pub fn failed(response: serde_json::Value) -> Self {
        RecordPatch {
            status: RecordStatus::Failed,
            response,
        }
    }
}
