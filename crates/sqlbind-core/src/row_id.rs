//! Row identity.
//!
//! A [`RowId`] identifies a database row by the ordered tuple of its
//! primary-key column values. Rows that have not been inserted yet carry a
//! temporary identity drawn from a process-wide counter; a temporary id is
//! replaced by a final one exactly once, when the insert commits, and never
//! reverts.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TEMPORARY_ID: AtomicU64 = AtomicU64::new(1);

/// Structural identifier for a database row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowId {
    /// All key-column values are known. Equality is structural over the
    /// ordered tuple.
    Final(Vec<Value>),
    /// Placeholder identity assigned before the database has generated the
    /// final keys. Equality is by serial.
    Temporary(u64),
}

impl RowId {
    /// Create a final row id from the ordered key-column values.
    pub fn new(key: Vec<Value>) -> Self {
        RowId::Final(key)
    }

    /// Allocate a fresh temporary row id.
    pub fn temporary() -> Self {
        RowId::Temporary(NEXT_TEMPORARY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Is this a temporary (pre-insert) identity?
    pub const fn is_temporary(&self) -> bool {
        matches!(self, RowId::Temporary(_))
    }

    /// The key-column values, when this is a final id.
    pub fn key(&self) -> Option<&[Value]> {
        match self {
            RowId::Final(key) => Some(key),
            RowId::Temporary(_) => None,
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Final(key) => {
                write!(f, "[")?;
                for (i, v) in key.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, "]")
            }
            RowId::Temporary(serial) => write!(f, "temp#{serial}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_equality_is_structural() {
        let a = RowId::new(vec![Value::BigInt(1), Value::Text("x".into())]);
        let b = RowId::new(vec![Value::BigInt(1), Value::Text("x".into())]);
        let c = RowId::new(vec![Value::BigInt(2), Value::Text("x".into())]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_temporary_ids_are_distinct() {
        let a = RowId::temporary();
        let b = RowId::temporary();
        assert_ne!(a, b);
        assert!(a.is_temporary());
        assert!(b.is_temporary());
    }

    #[test]
    fn test_temporary_never_equals_final() {
        let t = RowId::temporary();
        let f = RowId::new(vec![Value::BigInt(1)]);
        assert_ne!(t, f);
        assert!(!f.is_temporary());
    }

    #[test]
    fn test_key_accessor() {
        let f = RowId::new(vec![Value::BigInt(9)]);
        assert_eq!(f.key(), Some(&[Value::BigInt(9)][..]));
        assert_eq!(RowId::temporary().key(), None);
    }
}
