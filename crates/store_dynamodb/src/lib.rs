use async_trait::async_trait;
use aws_sdk_dynamodb::operation::get_item::GetItemOutput;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{SecondsFormat, Utc};
use expression::{
    AttributeValues, KeyClause, KeyCondition, QueryExpressions, UpdateExpressions, compile_query,
    compile_update,
};
use std::collections::HashMap;
use store::{
    IdempotencyRecord, RecordKey, RecordPatch, RecordStatus, RecordStore, SORT_KEY, StoreError,
};

const PARTITION_KEY: &str = "PK";
const SORT_KEY_NAME: &str = "SK";

/// Environment variable naming the idempotency table.
pub const IDEMPOTENCY_TABLE_NAME: &str = "IDEMPOTENCY_TABLE_NAME";

/// DynamoDB-backed [`RecordStore`].
///
/// Mutual exclusion rests on the conditional expressions attached to
/// `PutItem` and `UpdateItem`; the record's `ttl` attribute is left to
/// the table's own time-to-live mechanism.
pub struct DynamoDbRecordStore {
    table_name: String,
    dynamodb_client: aws_sdk_dynamodb::Client,
    consistent_read: bool,
}

impl DynamoDbRecordStore {
    pub fn new(dynamodb_client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        DynamoDbRecordStore {
            table_name: table_name.into(),
            dynamodb_client,
            consistent_read: true,
        }
    }

    /// Build a client from ambient AWS configuration and the table name
    /// from [`IDEMPOTENCY_TABLE_NAME`].
    pub async fn from_env() -> Result<Self, StoreError> {
        let table_name: String = std::env::var(IDEMPOTENCY_TABLE_NAME)
            .map_err(|err| StoreError::Backend(err.into()))?;

        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        Ok(Self::new(aws_sdk_dynamodb::Client::new(&config), table_name))
    }

    fn key_item(&self, key: &RecordKey) -> HashMap<String, AttributeValue> {
        HashMap::from([
            (
                PARTITION_KEY.to_string(),
                AttributeValue::S(key.partition_key()),
            ),
            (
                SORT_KEY_NAME.to_string(),
                AttributeValue::S(SORT_KEY.to_string()),
            ),
        ])
    }
}

#[async_trait]
impl RecordStore for DynamoDbRecordStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<IdempotencyRecord>, StoreError> {
        let output: GetItemOutput = self
            .dynamodb_client
            .get_item()
            .table_name(&self.table_name)
            .consistent_read(self.consistent_read)
            .set_key(Some(self.key_item(key)))
            .send()
            .await
            .map_err(|err| StoreError::Backend(err.into()))?;

        let Some(item) = output.item else {
            return Ok(None);
        };

        let record: IdempotencyRecord = serde_dynamo::from_item(item)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;

        Ok(Some(record))
    }

    async fn put(&self, record: IdempotencyRecord) -> Result<(), StoreError> {
        let item: HashMap<String, AttributeValue> = serde_dynamo::to_item(&record)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;

        // Exactly one concurrent insert for a key may succeed
        let guard: KeyCondition = vec![
            KeyClause::not_exists(PARTITION_KEY),
            KeyClause::not_exists(SORT_KEY_NAME),
        ]
        .into();
        let expressions: QueryExpressions = compile_query(&guard, None);

        let result = self
            .dynamodb_client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression(expressions.key_condition_expression)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => match err.into_service_error() {
                PutItemError::ConditionalCheckFailedException(_) => Err(StoreError::AlreadyExists),
                other => Err(StoreError::Backend(other.into())),
            },
        }
    }

    async fn update(&self, key: &RecordKey, patch: RecordPatch) -> Result<(), StoreError> {
        let status: serde_json::Value = serde_json::to_value(patch.status)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        let updated_at: String = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        let assignments: Vec<(String, serde_json::Value)> = vec![
            ("status".to_string(), status),
            ("response".to_string(), patch.response),
            ("updatedAt".to_string(), updated_at.into()),
        ];
        let update: UpdateExpressions = compile_update(&assignments);

        // The record must exist and still hold the in-progress lock
        let guard: KeyCondition = vec![
            KeyClause::exists(PARTITION_KEY),
            KeyClause::exists(SORT_KEY_NAME),
        ]
        .into();
        let mut condition: String = compile_query(&guard, None).key_condition_expression;
        condition.push_str(" AND #status = :expected_status");

        // #status is already aliased by the SET clause
        let mut attribute_values: AttributeValues = update.attribute_values;
        attribute_values.insert(
            ":expected_status".to_string(),
            serde_json::to_value(RecordStatus::InProgress)
                .map_err(|err| StoreError::Serialization(err.to_string()))?,
        );

        let result = self
            .dynamodb_client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(self.key_item(key)))
            .update_expression(update.update_expression)
            .condition_expression(condition)
            .set_expression_attribute_names(Some(update.attribute_names))
            .set_expression_attribute_values(Some(marshall_values(attribute_values)?))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => match err.into_service_error() {
                UpdateItemError::ConditionalCheckFailedException(_) => {
                    Err(StoreError::PreconditionFailed)
                }
                other => Err(StoreError::Backend(other.into())),
            },
        }
    }
}

/// Marshall compiled placeholder values into the store's native
/// attribute representation.
fn marshall_values(
    values: AttributeValues,
) -> Result<HashMap<String, AttributeValue>, StoreError> {
    values
        .into_iter()
        .map(|(placeholder, value)| {
            let value: AttributeValue = serde_dynamo::to_attribute_value(value)
                .map_err(|err| StoreError::Serialization(err.to_string()))?;

            Ok((placeholder, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::operation::put_item::PutItemOutput;
    use aws_sdk_dynamodb::operation::update_item::UpdateItemOutput;
    use aws_sdk_dynamodb::types::error::ConditionalCheckFailedException;
    use aws_smithy_mocks::{mock, mock_client};
    use serde_json::json;
    use std::time::Duration;

    const TABLE: &str = "idempotency";

    fn record() -> IdempotencyRecord {
        IdempotencyRecord::in_progress(
            &RecordKey::new("createOrder", "abc123"),
            Duration::from_secs(600),
        )
    }

    #[tokio::test]
    async fn get_unmarshalls_the_stored_record() {
        let stored: IdempotencyRecord = record();
        let item: HashMap<String, AttributeValue> = serde_dynamo::to_item(&stored).unwrap();

        let get_rule = mock!(aws_sdk_dynamodb::Client::get_item)
            .match_requests(|input| {
                input.key().is_some_and(|key| {
                    key.get(PARTITION_KEY)
                        == Some(&AttributeValue::S("createOrder#abc123".to_string()))
                })
            })
            .then_output(move || GetItemOutput::builder().set_item(Some(item.clone())).build());

        let store: DynamoDbRecordStore =
            DynamoDbRecordStore::new(mock_client!(aws_sdk_dynamodb, [&get_rule]), TABLE);

        let found: IdempotencyRecord = store
            .get(&RecordKey::new("createOrder", "abc123"))
            .await
            .expect("get should succeed")
            .expect("record should be present");

        assert_eq!(RecordStatus::InProgress, found.status);
        assert_eq!("createOrder#abc123", found.partition_key);
        assert_eq!(stored.expires_at, found.expires_at);
    }

    #[tokio::test]
    async fn get_maps_a_missing_item_to_none() {
        let get_rule =
            mock!(aws_sdk_dynamodb::Client::get_item).then_output(|| GetItemOutput::builder().build());

        let store: DynamoDbRecordStore =
            DynamoDbRecordStore::new(mock_client!(aws_sdk_dynamodb, [&get_rule]), TABLE);

        let found = store
            .get(&RecordKey::new("createOrder", "missing"))
            .await
            .expect("get should succeed");

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn put_guards_against_an_existing_record() {
        let put_rule = mock!(aws_sdk_dynamodb::Client::put_item)
            .match_requests(|input| {
                input.condition_expression()
                    == Some("attribute_not_exists(PK) AND attribute_not_exists(SK)")
            })
            .then_output(|| PutItemOutput::builder().build());

        let store: DynamoDbRecordStore =
            DynamoDbRecordStore::new(mock_client!(aws_sdk_dynamodb, [&put_rule]), TABLE);

        store.put(record()).await.expect("put should succeed");
    }

    #[tokio::test]
    async fn put_maps_a_lost_race_to_already_exists() {
        let put_rule = mock!(aws_sdk_dynamodb::Client::put_item).then_error(|| {
            PutItemError::ConditionalCheckFailedException(
                ConditionalCheckFailedException::builder()
                    .message("The conditional request failed")
                    .build(),
            )
        });

        let store: DynamoDbRecordStore =
            DynamoDbRecordStore::new(mock_client!(aws_sdk_dynamodb, [&put_rule]), TABLE);

        let result = store.put(record()).await;

        assert!(matches!(result, Err(StoreError::AlreadyExists)));
    }

    #[tokio::test]
    async fn update_compiles_the_terminal_transition() {
        let update_rule = mock!(aws_sdk_dynamodb::Client::update_item)
            .match_requests(|input| {
                let guarded: bool = input.condition_expression()
                    == Some(
                        "attribute_exists(PK) AND attribute_exists(SK) \
                         AND #status = :expected_status",
                    );
                let sets_status: bool = input
                    .update_expression()
                    .is_some_and(|expression| expression.contains("#status = :status"));

                guarded && sets_status
            })
            .then_output(|| UpdateItemOutput::builder().build());

        let store: DynamoDbRecordStore =
            DynamoDbRecordStore::new(mock_client!(aws_sdk_dynamodb, [&update_rule]), TABLE);

        store
            .update(
                &RecordKey::new("createOrder", "abc123"),
                RecordPatch::completed(json!({ "orderId": 42 })),
            )
            .await
            .expect("update should succeed");
    }

    #[tokio::test]
    async fn update_maps_a_lost_precondition_to_precondition_failed() {
        let update_rule = mock!(aws_sdk_dynamodb::Client::update_item).then_error(|| {
            UpdateItemError::ConditionalCheckFailedException(
                ConditionalCheckFailedException::builder()
                    .message("The conditional request failed")
                    .build(),
            )
        });

        let store: DynamoDbRecordStore =
            DynamoDbRecordStore::new(mock_client!(aws_sdk_dynamodb, [&update_rule]), TABLE);

        let result = store
            .update(
                &RecordKey::new("createOrder", "abc123"),
                RecordPatch::failed(json!({ "message": "boom" })),
            )
            .await;

        assert!(matches!(result, Err(StoreError::PreconditionFailed)));
    }
}
