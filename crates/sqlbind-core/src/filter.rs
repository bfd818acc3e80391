//! Declarative row filters.
//!
//! Filters describe predicates over column values without committing to a
//! SQL rendering; the generator translates a filter tree into a
//! parameterized WHERE clause.

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// A predicate over the rows of a query source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// column = value
    Equal(String, Value),
    /// column <> value
    NotEqual(String, Value),
    /// column > value
    Greater(String, Value),
    /// column >= value
    GreaterOrEqual(String, Value),
    /// column < value
    Less(String, Value),
    /// column <= value
    LessOrEqual(String, Value),
    /// column LIKE pattern (`%` and `_` wildcards)
    Like(String, String),
    /// column IS NULL
    IsNull(String),
    /// Every sub-filter must match
    And(Vec<Filter>),
    /// At least one sub-filter must match
    Or(Vec<Filter>),
    /// The sub-filter must not match
    Not(Box<Filter>),
}

impl Filter {
    /// column = value
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Equal(column.into(), value.into())
    }

    /// column > value
    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Greater(column.into(), value.into())
    }

    /// column < value
    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Less(column.into(), value.into())
    }

    /// column LIKE pattern
    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::Like(column.into(), pattern.into())
    }

    /// column IS NULL
    pub fn is_null(column: impl Into<String>) -> Self {
        Filter::IsNull(column.into())
    }

    /// Combine with another filter under AND.
    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut parts) => {
                parts.push(other);
                Filter::And(parts)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    /// Combine with another filter under OR.
    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Or(mut parts) => {
                parts.push(other);
                Filter::Or(parts)
            }
            first => Filter::Or(vec![first, other]),
        }
    }
}
