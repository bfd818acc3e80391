//! Transactional SQL data binding.
//!
//! sqlbind connects editable UI state to a relational database through
//! three cooperating layers:
//!
//! - **Query delegates** ([`TableQuery`], [`FreeformQuery`]) implement the
//!   row-level CRUD + transaction protocol ([`QueryDelegate`]) a container
//!   consumes: filtered and stably-ordered paging, optimistic locking via
//!   a version column, generated-key retrieval with buffered row-id change
//!   events.
//! - **SQL generation** ([`SqlGenerator`], [`DefaultSqlGenerator`]) turns
//!   declarative [`Filter`]/[`OrderBy`]/[`Range`] descriptors and editable
//!   [`RowItem`]s into parameterized [`Statement`]s.
//! - **Field binding** ([`FieldGroup`]) binds editable fields to item
//!   properties with buffered commit/rollback: every bound property is
//!   wrapped in a [`TransactionalProperty`] and the whole batch commits
//!   atomically or not at all.
//!
//! # Example
//!
//! ```ignore
//! use sqlbind::{DefaultSqlGenerator, Filter, TableQuery};
//! use std::sync::Arc;
//!
//! let mut query = TableQuery::new("people", pool, Box::new(DefaultSqlGenerator::new()))?;
//! query.set_version_column("version");
//! query.set_filters(vec![Filter::gt("age", 18i64)]);
//!
//! query.begin_transaction()?;
//! for row in query.results(0, 50)? {
//!     // hand rows to the container / grid
//! }
//! query.commit()?;
//! ```
//!
//! The `mem` module provides an embedded in-memory backend implementing
//! the connection contracts, used throughout the test suite.

pub use sqlbind_core::{
    quote_ident, sanitize_identifier, ColumnInfo, ColumnProperty, ConfigError, Connection,
    ConnectionPool, Error, Filter, OptimisticLockError, OrderBy, PoolError, PoolErrorKind,
    QueryError, Range, ReadOnlyError, Result, Row, RowId, RowItem, TableMetadata,
    TransactionError, TransactionErrorKind, TypeError, UnsupportedError, Value,
};

pub use sqlbind_query::{DefaultSqlGenerator, Dialect, SqlGenerator, Statement};

pub use sqlbind_pool::{PoolConfig, PoolStats, SimplePool};

pub use sqlbind_source::{
    FreeformDelegate, FreeformQuery, ListenerId, QueryDelegate, RowIdChangeEvent,
    RowIdChangeNotifier, TableQuery, TableRef, TransactionContext,
};

pub use sqlbind_binder::{
    BindError, CommitError, CommitEvent, CommitHandler, Field, FieldGroup, FieldRef, HandlerId,
    Item, ObjectProperty, Property, PropertyItem, PropertyRef, TransactionalProperty, ValueField,
};

/// The embedded in-memory backend.
pub mod mem {
    pub use sqlbind_mem::{mem_pool, mem_pool_with_config, MemConnection, MemDatabase, TableSpec};
}
