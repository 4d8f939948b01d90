use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Deterministic content hash over a projection of the payload.
///
/// Only the selected top-level fields participate, so input differences
/// outside them never change the fingerprint. The projection uses a
/// fixed (sorted) field order and a missing field projects as JSON
/// `null`, making the hash independent of how the caller lists the
/// fields and of whether an absent field was omitted or set to nothing.
pub fn fingerprint(fields: &[String], payload: &Value) -> String {
    // BTreeMap keeps the sorted order regardless of serde_json's
    // `preserve_order` feature, which other dependencies may enable.
    let projection: BTreeMap<String, Value> = fields
        .iter()
        .map(|field| {
            let value: Value = payload.get(field).cloned().unwrap_or(Value::Null);

            (field.clone(), value)
        })
        .collect();

    let serialized: String = Value::Object(projection.into_iter().collect()).to_string();

    format!("{:x}", Sha256::digest(serialized.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn equal_projections_hash_identically() {
        let selected: Vec<String> = fields(&["orderId"]);

        let a: Value = json!({ "orderId": 42, "note": "first attempt" });
        let b: Value = json!({ "orderId": 42, "note": "retry" });

        assert_eq!(fingerprint(&selected, &a), fingerprint(&selected, &b));
    }

    #[test]
    fn selected_field_changes_change_the_hash() {
        let selected: Vec<String> = fields(&["orderId"]);

        let a: Value = json!({ "orderId": 42 });
        let b: Value = json!({ "orderId": 43 });

        assert_ne!(fingerprint(&selected, &a), fingerprint(&selected, &b));
    }

    #[test]
    fn field_listing_order_does_not_matter() {
        let payload: Value = json!({ "orderId": 42, "customer": "c1" });

        assert_eq!(
            fingerprint(&fields(&["orderId", "customer"]), &payload),
            fingerprint(&fields(&["customer", "orderId"]), &payload)
        );
    }

    #[test]
    fn missing_fields_project_as_null() {
        let selected: Vec<String> = fields(&["orderId", "coupon"]);

        let absent: Value = json!({ "orderId": 42 });
        let explicit: Value = json!({ "orderId": 42, "coupon": null });

        assert_eq!(
            fingerprint(&selected, &absent),
            fingerprint(&selected, &explicit)
        );
    }
}
