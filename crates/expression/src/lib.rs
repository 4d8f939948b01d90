use std::collections::HashMap;
use std::fmt::{Display, Formatter};

pub use crate::predicate::PredicateFn;
pub use crate::query::{
    FilterCondition, KeyClause, KeyCondition, Placeholders, QueryExpressions, compile_query,
};
pub use crate::update::{UpdateExpressions, compile_update};

mod attribute;
mod predicate;
mod query;
mod update;

/// Mapping of `#name` placeholders to the literal attribute names they alias.
pub type AttributeNames = HashMap<String, String>;
/// Mapping of `:value` placeholders to the literal values they stand in for.
pub type AttributeValues = HashMap<String, serde_json::Value>;

/// Errors arising from compiling condition descriptors.
#[derive(Debug, PartialEq, Eq)]
pub enum ExpressionError {
    /// A predicate function name the store's query language doesn't have.
    UnsupportedFunction(String),
}

impl Display for ExpressionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpressionError::UnsupportedFunction(name) => {
                write!(f, "predicate function \"{name}\" doesn't exist")
            }
        }
    }
}

impl std::error::Error for ExpressionError {}
