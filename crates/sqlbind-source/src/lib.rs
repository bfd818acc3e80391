//! Transactional query delegates for sqlbind.
//!
//! This crate implements the row-level CRUD + transaction protocol a
//! data-bound container consumes:
//!
//! - [`QueryDelegate`] - the shared contract
//! - [`TransactionContext`] - connection/transaction lifecycle, one active
//!   connection at most, release guaranteed even under failure
//! - [`TableQuery`] - SQL generated for a single table, with primary-key
//!   discovery, optimistic locking and generated-key retrieval
//! - [`FreeformQuery`] - caller-supplied SQL with pluggable
//!   [`FreeformDelegate`] capabilities
//! - [`RowIdChangeNotifier`] - buffered row-id change events delivered on
//!   commit

pub mod delegate;
pub mod freeform;
pub mod table_query;
pub mod transaction;

pub use delegate::{
    ListenerId, QueryDelegate, RowIdChangeEvent, RowIdChangeNotifier,
};
pub use freeform::{FreeformDelegate, FreeformQuery};
pub use table_query::{TableQuery, TableRef};
pub use transaction::TransactionContext;
