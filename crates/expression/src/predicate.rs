use crate::ExpressionError;
use std::str::FromStr;

/// Comparison functions supported by the store's query language beyond
/// simple equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateFn {
    AttributeExists,
    AttributeNotExists,
    AttributeType,
    BeginsWith,
    Contains,
    Size,
}

impl PredicateFn {
    pub fn name(&self) -> &'static str {
        match self {
            PredicateFn::AttributeExists => "attribute_exists",
            PredicateFn::AttributeNotExists => "attribute_not_exists",
            PredicateFn::AttributeType => "attribute_type",
            PredicateFn::BeginsWith => "begins_with",
            PredicateFn::Contains => "contains",
            PredicateFn::Size => "size",
        }
    }

    /// Whether the function consumes a literal comparison value.
    pub fn takes_value(&self) -> bool {
        matches!(
            self,
            PredicateFn::AttributeType | PredicateFn::BeginsWith | PredicateFn::Contains
        )
    }

    /// Places the attribute and its value placeholder on the appropriate
    /// arguments of the function.
    pub(crate) fn render(&self, attribute: &str, value_placeholder: &str) -> String {
        if self.takes_value() {
            format!("{}({attribute}, {value_placeholder})", self.name())
        } else {
            format!("{}({attribute})", self.name())
        }
    }
}

impl FromStr for PredicateFn {
    type Err = ExpressionError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "attribute_exists" => Ok(PredicateFn::AttributeExists),
            "attribute_not_exists" => Ok(PredicateFn::AttributeNotExists),
            "attribute_type" => Ok(PredicateFn::AttributeType),
            "begins_with" => Ok(PredicateFn::BeginsWith),
            "contains" => Ok(PredicateFn::Contains),
            "size" => Ok(PredicateFn::Size),
            other => Err(ExpressionError::UnsupportedFunction(other.to_string())),
        }
    }
}
