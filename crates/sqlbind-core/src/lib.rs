//! Core types and traits for sqlbind.
//!
//! This crate provides the foundational abstractions for the transactional
//! data-binding layer:
//!
//! - `Value` for dynamically-typed SQL values
//! - `Row` / `RowItem` / `ColumnProperty` for result and editable rows
//! - `RowId` for structural row identity (final and temporary flavors)
//! - `Filter` / `OrderBy` / `Range` descriptors consumed by SQL generation
//! - `Connection` / `ConnectionPool` contracts for synchronous execution
//! - the error taxonomy shared by every layer above

pub mod connection;
pub mod error;
pub mod filter;
pub mod identifiers;
pub mod order;
pub mod range;
pub mod row;
pub mod row_id;
pub mod row_item;
pub mod value;

pub use connection::{Connection, ConnectionPool, TableMetadata};
pub use error::{
    ConfigError, Error, OptimisticLockError, PoolError, PoolErrorKind, QueryError, ReadOnlyError,
    Result, TransactionError, TransactionErrorKind, TypeError, UnsupportedError,
};
pub use filter::Filter;
pub use identifiers::{quote_ident, sanitize_identifier};
pub use order::OrderBy;
pub use range::Range;
pub use row::{ColumnInfo, Row};
pub use row_id::RowId;
pub use row_item::{ColumnProperty, RowItem};
pub use value::Value;
