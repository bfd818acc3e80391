//! Result ordering descriptors.

use serde::{Deserialize, Serialize};

/// A single ORDER BY term: column name plus direction.
///
/// Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    column: String,
    ascending: bool,
}

impl OrderBy {
    /// Order ascending on the given column.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    /// Order descending on the given column.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }

    /// The column this term orders on.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Whether the ordering is ascending.
    pub fn is_ascending(&self) -> bool {
        self.ascending
    }
}
