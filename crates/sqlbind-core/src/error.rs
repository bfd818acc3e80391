//! Error types for sqlbind operations.

use crate::row_id::RowId;
use std::fmt;

/// The primary error type for all sqlbind operations.
#[derive(Debug)]
pub enum Error {
    /// Configuration errors (bad table name, missing primary key,
    /// empty query string). Fatal at construction, not retryable.
    Config(ConfigError),
    /// Transaction-state errors (begin while active, commit while idle).
    /// Programming errors; fail fast.
    Transaction(TransactionError),
    /// Query execution errors
    Query(QueryError),
    /// A write affected zero rows because another writer changed or
    /// removed the row first. Callers reload and retry.
    OptimisticLock(OptimisticLockError),
    /// The operation is not available in the current configuration
    Unsupported(UnsupportedError),
    /// A value had an unexpected type or shape
    Type(TypeError),
    /// Connection pool errors
    Pool(PoolError),
    /// Write attempted on a read-only property
    ReadOnly(ReadOnlyError),
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// beginTransaction while a transaction is already active
    AlreadyActive,
    /// commit/rollback without an active transaction
    NotActive,
}

#[derive(Debug)]
pub struct QueryError {
    pub message: String,
    /// The SQL that failed, when known
    pub sql: Option<String>,
}

#[derive(Debug)]
pub struct OptimisticLockError {
    pub message: String,
    /// Identity of the row the conflicting write targeted
    pub row_id: RowId,
}

#[derive(Debug)]
pub struct UnsupportedError {
    pub message: String,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct PoolError {
    pub kind: PoolErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolErrorKind {
    /// No connection available and the pool is at capacity
    Exhausted,
    /// The pool has been closed
    Closed,
    /// The connection factory failed
    Factory,
}

#[derive(Debug)]
pub struct ReadOnlyError {
    /// Name of the property the write targeted
    pub property: String,
}

impl Error {
    /// Build a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
        })
    }

    /// Build a transaction-state error.
    pub fn transaction(kind: TransactionErrorKind, message: impl Into<String>) -> Self {
        Error::Transaction(TransactionError {
            kind,
            message: message.into(),
        })
    }

    /// Build a query error without an attached SQL string.
    pub fn query(message: impl Into<String>) -> Self {
        Error::Query(QueryError {
            message: message.into(),
            sql: None,
        })
    }

    /// Build a query error carrying the failing SQL.
    pub fn query_with_sql(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Error::Query(QueryError {
            message: message.into(),
            sql: Some(sql.into()),
        })
    }

    /// Build an optimistic-lock conflict for the given row.
    pub fn optimistic_lock(message: impl Into<String>, row_id: RowId) -> Self {
        Error::OptimisticLock(OptimisticLockError {
            message: message.into(),
            row_id,
        })
    }

    /// Build an unsupported-operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::Unsupported(UnsupportedError {
            message: message.into(),
        })
    }

    /// Build a read-only property error.
    pub fn read_only(property: impl Into<String>) -> Self {
        Error::ReadOnly(ReadOnlyError {
            property: property.into(),
        })
    }

    /// Is this an optimistic-lock conflict?
    pub fn is_optimistic_lock(&self) -> bool {
        matches!(self, Error::OptimisticLock(_))
    }

    /// Is this an error a caller can reasonably retry (after reloading
    /// state or waiting for a connection)?
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::OptimisticLock(_) => true,
            Error::Pool(p) => p.kind == PoolErrorKind::Exhausted,
            _ => false,
        }
    }

    /// Get the SQL that caused this error, if available.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Query(e) => {
                if let Some(sql) = &e.sql {
                    write!(f, "Query error: {} (sql: {})", e.message, sql)
                } else {
                    write!(f, "Query error: {}", e.message)
                }
            }
            Error::OptimisticLock(e) => {
                write!(f, "Optimistic lock failure on row {}: {}", e.row_id, e.message)
            }
            Error::Unsupported(e) => write!(f, "Unsupported operation: {}", e.message),
            Error::Type(e) => {
                if let Some(col) = &e.column {
                    write!(
                        f,
                        "Type error in column '{}': expected {}, found {}",
                        col, e.expected, e.actual
                    )
                } else {
                    write!(f, "Type error: expected {}, found {}", e.expected, e.actual)
                }
            }
            Error::Pool(e) => write!(f, "Pool error: {}", e.message),
            Error::ReadOnly(e) => write!(f, "Property '{}' is read-only", e.property),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<OptimisticLockError> for Error {
    fn from(err: OptimisticLockError) -> Self {
        Error::OptimisticLock(err)
    }
}

impl From<UnsupportedError> for Error {
    fn from(err: UnsupportedError) -> Self {
        Error::Unsupported(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<PoolError> for Error {
    fn from(err: PoolError) -> Self {
        Error::Pool(err)
    }
}

impl From<ReadOnlyError> for Error {
    fn from(err: ReadOnlyError) -> Self {
        Error::ReadOnly(err)
    }
}

/// Result type alias for sqlbind operations.
pub type Result<T> = std::result::Result<T, Error>;
