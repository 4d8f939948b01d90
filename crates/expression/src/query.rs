use crate::attribute::{key_attribute, name_attribute, value_attribute};
use crate::{AttributeNames, AttributeValues, ExpressionError, PredicateFn};
use serde_json::Value;
use std::collections::HashMap;

/// One clause of the primary match.
#[derive(Debug, Clone)]
pub struct KeyClause {
    pub attribute: String,
    pub value: Value,
    pub function: Option<PredicateFn>,
}

impl KeyClause {
    /// Plain equality against a literal value.
    pub fn equals(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        KeyClause {
            attribute: attribute.into(),
            value: value.into(),
            function: None,
        }
    }

    pub fn with_function(
        attribute: impl Into<String>,
        value: impl Into<Value>,
        function: PredicateFn,
    ) -> Self {
        KeyClause {
            attribute: attribute.into(),
            value: value.into(),
            function: Some(function),
        }
    }

    /// As [`KeyClause::with_function`], resolving the function from the
    /// store's own name for it.
    pub fn with_function_name(
        attribute: impl Into<String>,
        value: impl Into<Value>,
        function: &str,
    ) -> Result<Self, ExpressionError> {
        Ok(Self::with_function(attribute, value, function.parse()?))
    }

    pub fn exists(attribute: impl Into<String>) -> Self {
        Self::with_function(attribute, Value::Null, PredicateFn::AttributeExists)
    }

    pub fn not_exists(attribute: impl Into<String>) -> Self {
        Self::with_function(attribute, Value::Null, PredicateFn::AttributeNotExists)
    }
}

/// The primary match: ordered clauses, partition key first.
/// Order is preserved from the input, never sorted.
#[derive(Debug, Clone, Default)]
pub struct KeyCondition {
    pub clauses: Vec<KeyClause>,
}

impl From<Vec<KeyClause>> for KeyCondition {
    fn from(clauses: Vec<KeyClause>) -> Self {
        KeyCondition { clauses }
    }
}

/// Safe placeholder pair handed to the filter composition callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholders {
    /// `#attr`, an alias safe against reserved words.
    pub name: String,
    /// `:attr`, the slot the literal value travels under.
    pub value: String,
}

/// The secondary match. The compiler generates placeholders for each
/// attribute but delegates boolean composition (AND/OR/NOT, nesting) to
/// the caller's callback, which returns the final predicate string.
pub struct FilterCondition {
    pub attributes: Vec<(String, Value)>,
    pub compose: Box<dyn Fn(&HashMap<String, Placeholders>) -> String + Send + Sync>,
}

impl FilterCondition {
    pub fn new(
        attributes: Vec<(String, Value)>,
        compose: impl Fn(&HashMap<String, Placeholders>) -> String + Send + Sync + 'static,
    ) -> Self {
        FilterCondition {
            attributes,
            compose: Box::new(compose),
        }
    }
}

/// The artifacts a conditional query call requires: the predicate
/// strings and both placeholder maps.
#[derive(Debug, Default)]
pub struct QueryExpressions {
    pub key_condition_expression: String,
    pub filter_expression: Option<String>,
    pub attribute_names: AttributeNames,
    pub attribute_values: AttributeValues,
}

/// Compile a key condition, and optionally a filter condition, into the
/// store's predicate syntax.
///
/// Key clauses are joined with `AND` in input order; clauses carrying a
/// predicate function render as `function(attr[, value])`, the rest as
/// `attr = :attr`. Values not consumed by their function (existence and
/// size checks) are not emitted into the value map.
pub fn compile_query(key: &KeyCondition, filter: Option<&FilterCondition>) -> QueryExpressions {
    let mut attribute_names: AttributeNames = HashMap::new();
    let mut attribute_values: AttributeValues = HashMap::new();

    let clauses: Vec<String> = key
        .clauses
        .iter()
        .map(|clause| {
            let (attribute, value_placeholder) = key_attribute(&clause.attribute);
            let takes_value: bool = clause.function.is_none_or(|function| function.takes_value());

            if takes_value {
                let (placeholder, value) = value_attribute(&clause.attribute, &clause.value);
                attribute_values.insert(placeholder, value);
            }

            match clause.function {
                Some(function) => function.render(&attribute, &value_placeholder),
                None => format!("{attribute} = {value_placeholder}"),
            }
        })
        .collect();

    let filter_expression: Option<String> = filter.map(|filter| {
        let mut placeholders: HashMap<String, Placeholders> = HashMap::new();

        for (attribute, value) in &filter.attributes {
            let (value_placeholder, value) = value_attribute(attribute, value);
            let (name_placeholder, name) = name_attribute(attribute);

            attribute_values.insert(value_placeholder.clone(), value);
            attribute_names.insert(name_placeholder.clone(), name);

            placeholders.insert(
                attribute.clone(),
                Placeholders {
                    name: name_placeholder,
                    value: value_placeholder,
                },
            );
        }

        (filter.compose)(&placeholders)
    });

    QueryExpressions {
        key_condition_expression: clauses.join(" AND "),
        filter_expression,
        attribute_names,
        attribute_values,
    }
}
