//! Result-window descriptor.

use serde::{Deserialize, Serialize};

/// A window over an ordered result set: row offset plus page length.
///
/// A limit of zero means "no bound" (the whole result set from the offset
/// on), matching the page-length convention of the query delegates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    offset: usize,
    limit: usize,
}

impl Range {
    /// A window of `limit` rows starting at `offset`.
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    /// The unbounded window: every row.
    pub fn unbounded() -> Self {
        Self {
            offset: 0,
            limit: 0,
        }
    }

    /// Starting row offset.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Page length; zero means unbounded.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Does this window actually bound the result set?
    pub fn is_bounded(&self) -> bool {
        self.limit > 0
    }
}
