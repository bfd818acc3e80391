//! Database connection and pool contracts.
//!
//! This module defines the synchronous abstractions the query layer runs
//! against:
//!
//! - [`Connection`] - executes parameterized SQL and controls the
//!   connection-level transaction mode
//! - [`ConnectionPool`] - hands out and reclaims connections
//! - [`TableMetadata`] - the result of table/primary-key discovery
//!
//! Execution blocks the calling thread until the database responds; no
//! timeout is enforced at this layer. Reserve/release pairing is the only
//! contract with the pool: every reserved connection is released exactly
//! once, even under partial failure.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// Resolved table identity plus the primary-key columns discovered from
/// database metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    /// Catalog the table was found under, if any
    pub catalog: Option<String>,
    /// Schema the table was found under, if any
    pub schema: Option<String>,
    /// Table name in the spelling the database reported
    pub table: String,
    /// Primary-key column names, in key order
    pub primary_key_columns: Vec<String>,
}

/// A synchronous database connection.
///
/// Connections start in auto-commit mode. Disabling auto-commit opens a
/// transaction scope that is closed by [`commit`](Connection::commit) or
/// [`rollback`](Connection::rollback).
pub trait Connection: Send {
    /// Execute a query and return the materialized rows.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a statement (INSERT, UPDATE, DELETE) and return the number
    /// of affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute an INSERT and additionally return the generated-keys row
    /// for the given key columns, when the database produced one.
    fn execute_returning_keys(
        &mut self,
        sql: &str,
        params: &[Value],
        key_columns: &[String],
    ) -> Result<(u64, Option<Row>)>;

    /// Enable or disable auto-commit mode.
    fn set_auto_commit(&mut self, enabled: bool) -> Result<()>;

    /// Is the connection in auto-commit mode?
    fn auto_commit(&self) -> bool;

    /// Commit the open transaction scope.
    fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction scope.
    fn rollback(&mut self) -> Result<()>;

    /// Look up a table by exact name and report its resolved identity and
    /// primary-key columns. Returns `Ok(None)` when the table is unknown;
    /// callers retry with upper-cased identifiers for databases that fold
    /// case.
    fn table_metadata(
        &mut self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Option<TableMetadata>>;
}

/// Hands out database connections and takes them back.
///
/// `release` is infallible from the caller's perspective: a pool that fails
/// to reclaim a connection logs and drops it rather than propagating.
pub trait ConnectionPool: Send + Sync {
    /// The connection type this pool manages.
    type Conn: Connection;

    /// Reserve a live connection, or fail (for example when the pool is at
    /// capacity).
    fn reserve(&self) -> Result<Self::Conn>;

    /// Return a previously reserved connection to the pool.
    fn release(&self, conn: Self::Conn);
}
