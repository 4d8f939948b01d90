use crate::attribute::{name_attribute, value_attribute};
use crate::{AttributeNames, AttributeValues};
use serde_json::Value;
use std::collections::HashMap;

/// The artifacts a conditional update call requires.
#[derive(Debug, Default)]
pub struct UpdateExpressions {
    pub update_expression: String,
    pub attribute_names: AttributeNames,
    pub attribute_values: AttributeValues,
}

/// Compile a flat attribute map into a `SET` clause assigning every
/// `#attr = :attr`, plus the matching placeholder maps.
///
/// All supplied attributes are included unconditionally; an attribute
/// left out of `assignments` is simply not updated.
pub fn compile_update(assignments: &[(String, Value)]) -> UpdateExpressions {
    let mut attribute_names: AttributeNames = HashMap::new();
    let mut attribute_values: AttributeValues = HashMap::new();

    let clauses: Vec<String> = assignments
        .iter()
        .map(|(attribute, value)| {
            let (name_placeholder, name) = name_attribute(attribute);
            let (value_placeholder, value) = value_attribute(attribute, value);

            let clause: String = format!("{name_placeholder} = {value_placeholder}");

            attribute_names.insert(name_placeholder, name);
            attribute_values.insert(value_placeholder, value);

            clause
        })
        .collect();

    UpdateExpressions {
        update_expression: format!("SET {}", clauses.join(", ")),
        attribute_names,
        attribute_values,
    }
}
