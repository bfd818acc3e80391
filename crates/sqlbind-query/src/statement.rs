//! Generated statements.

use sqlbind_core::Value;
use std::fmt;

/// A generated SQL string plus the ordered bind values it expects.
///
/// Produced by a [`SqlGenerator`](crate::SqlGenerator) or a freeform
/// delegate and consumed by the query executor.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
}

impl Statement {
    /// Create a statement from SQL text and its bind values.
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// A statement with no bind values.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }

    /// The SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The ordered bind values.
    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let stmt = Statement::new("SELECT * FROM t WHERE id = ?", vec![Value::BigInt(1)]);
        assert_eq!(stmt.sql(), "SELECT * FROM t WHERE id = ?");
        assert_eq!(stmt.params(), &[Value::BigInt(1)]);
        assert_eq!(stmt.to_string(), "SELECT * FROM t WHERE id = ?");
    }

    #[test]
    fn test_raw_has_no_params() {
        assert!(Statement::raw("SELECT 1").params().is_empty());
    }
}
