//! Placeholder generation rules, applied per attribute `k`.
//!
//! | value   | key | placeholder | emitted value | destined for              |
//! | ------- | --- | ----------- | ------------- | ------------------------- |
//! | present | yes | `:k`        | the literal   | attribute value map       |
//! | absent  | yes | `k`         | `:k`          | the predicate string      |
//! | present | no  | `:k`        | the literal   | attribute value map       |
//! | absent  | no  | `#k`        | `k`           | attribute name map        |

use serde_json::Value;

/// Rows with a literal value: the value map owns the literal.
pub(crate) fn value_attribute(attribute: &str, value: &Value) -> (String, Value) {
    (format!(":{attribute}"), value.clone())
}

/// The key row without a value: the attribute name is used literally in
/// the predicate string, paired with the placeholder its value travels under.
pub(crate) fn key_attribute(attribute: &str) -> (String, String) {
    (attribute.to_string(), format!(":{attribute}"))
}

/// The non-key row without a value: a reserved-word-safe alias for the name map.
pub(crate) fn name_attribute(attribute: &str) -> (String, String) {
    (format!("#{attribute}"), attribute.to_string())
}
