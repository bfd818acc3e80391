//! Freeform query delegate.
//!
//! [`FreeformQuery`] executes a caller-supplied SQL string and optionally
//! hands SQL construction to a pluggable [`FreeformDelegate`]. Each
//! delegate capability comes in two tiers: a statement tier producing
//! parameterized [`Statement`]s and a string tier producing plain SQL.
//! Capability methods return `Option`, where `None` means "not provided",
//! so the fallback order (statement tier, then string tier, then the raw
//! query) is visible in the control flow instead of being driven by
//! caught exceptions.

use crate::delegate::QueryDelegate;
use crate::transaction::TransactionContext;
use regex::Regex;
use sqlbind_core::{
    quote_ident, Connection, ConnectionPool, Error, Filter, OrderBy, Result, Row, RowItem, Value,
};
use sqlbind_query::Statement;
use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};

static WHERE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bwhere\b").expect("static pattern"));

/// Pluggable SQL construction for a freeform query.
///
/// Every method has an unsupported default, so a delegate implements only
/// the capabilities it actually has. The query always prefers the
/// statement tier over the string tier.
pub trait FreeformDelegate<C: Connection> {
    /// Parameterized paged query.
    fn paged_statement(&self, offset: usize, page_length: usize) -> Option<Statement> {
        let _ = (offset, page_length);
        None
    }

    /// Plain-SQL paged query.
    fn paged_sql(&self, offset: usize, page_length: usize) -> Option<String> {
        let _ = (offset, page_length);
        None
    }

    /// Parameterized count query.
    fn count_statement(&self) -> Option<Statement> {
        None
    }

    /// Plain-SQL count query.
    fn count_sql(&self) -> Option<String> {
        None
    }

    /// Parameterized row-existence query for the given key values.
    fn contains_statement(&self, keys: &[Value]) -> Option<Statement> {
        let _ = keys;
        None
    }

    /// Plain-SQL row-existence query for the given key values.
    fn contains_sql(&self, keys: &[Value]) -> Option<String> {
        let _ = keys;
        None
    }

    /// Accept a new filter set.
    fn set_filters(&mut self, filters: Vec<Filter>) -> Result<()> {
        let _ = filters;
        Err(Error::unsupported("delegate does not support filters"))
    }

    /// Accept a new ordering.
    fn set_order_by(&mut self, order_bys: Vec<OrderBy>) -> Result<()> {
        let _ = order_bys;
        Err(Error::unsupported("delegate does not support ordering"))
    }

    /// Write the row through the given (transactional) connection.
    fn store_row(&mut self, conn: &mut C, row: &mut RowItem) -> Result<u64> {
        let _ = (conn, row);
        Err(Error::unsupported("delegate does not support storing rows"))
    }

    /// Delete the row through the given (transactional) connection.
    fn remove_row(&mut self, conn: &mut C, row: &RowItem) -> Result<bool> {
        let _ = (conn, row);
        Err(Error::unsupported("delegate does not support removing rows"))
    }
}

/// Query delegate driven by an arbitrary SQL string.
pub struct FreeformQuery<P: ConnectionPool> {
    query_string: String,
    primary_key_columns: Vec<String>,
    tx: TransactionContext<P>,
    delegate: Option<Box<dyn FreeformDelegate<P::Conn> + Send>>,
}

impl<P: ConnectionPool> FreeformQuery<P> {
    /// Create a freeform query. Read-only mode is forced when no key
    /// columns are given; key columns must not contain empty strings and
    /// the query string must be non-empty.
    pub fn new(
        query_string: impl Into<String>,
        primary_key_columns: Vec<String>,
        pool: Arc<P>,
    ) -> Result<Self> {
        let query_string = query_string.into();
        if query_string.trim().is_empty() {
            return Err(Error::config("the query string may not be empty"));
        }
        if primary_key_columns.iter().any(|c| c.is_empty()) {
            return Err(Error::config(
                "the primary key columns contain an empty string",
            ));
        }
        Ok(Self {
            query_string,
            primary_key_columns,
            tx: TransactionContext::new(pool),
            delegate: None,
        })
    }

    /// The configured query string.
    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    /// Install a delegate.
    pub fn set_delegate(&mut self, delegate: Box<dyn FreeformDelegate<P::Conn> + Send>) {
        self.delegate = Some(delegate);
    }

    /// Remove the delegate.
    pub fn clear_delegate(&mut self) {
        self.delegate = None;
    }

    pub fn has_delegate(&self) -> bool {
        self.delegate.is_some()
    }

    /// Is a transaction open on this query?
    pub fn is_in_transaction(&self) -> bool {
        self.tx.is_active()
    }

    /// Number of rows the query returns.
    ///
    /// Prefers a delegate count statement, then a delegate count query
    /// string. Without either, the full result query is executed and its
    /// rows are counted; correct, but potentially slow on large sets.
    pub fn count(&mut self) -> Result<u64> {
        if let Some(stmt) = self.delegate.as_ref().and_then(|d| d.count_statement()) {
            tracing::debug!(sql = %stmt, "counting via delegate statement");
            let rows = self
                .tx
                .with_connection(|conn| conn.query(stmt.sql(), stmt.params()))?;
            return count_from_rows(&rows);
        }
        if let Some(sql) = self.delegate.as_ref().and_then(|d| d.count_sql()) {
            tracing::debug!(sql = %sql, "counting via delegate query string");
            let rows = self.tx.with_connection(|conn| conn.query(&sql, &[]))?;
            return count_from_rows(&rows);
        }
        tracing::debug!("no delegate count support; scanning the full result set");
        let sql = self.query_string.clone();
        let rows = self.tx.with_connection(|conn| conn.query(&sql, &[]))?;
        Ok(rows.len() as u64)
    }

    /// Fetch the results.
    ///
    /// Offset and page length reach the database only when the delegate
    /// provides a paged statement or paged query string; otherwise the raw
    /// configured query runs and the caller clips, as reported by
    /// [`respects_paging_limits`](Self::respects_paging_limits).
    pub fn results(&mut self, offset: usize, page_length: usize) -> Result<Vec<Row>> {
        if let Some(stmt) = self
            .delegate
            .as_ref()
            .and_then(|d| d.paged_statement(offset, page_length))
        {
            tracing::debug!(sql = %stmt, "executing delegate statement");
            return self
                .tx
                .with_connection(|conn| conn.query(stmt.sql(), stmt.params()));
        }
        let sql = self
            .delegate
            .as_ref()
            .and_then(|d| d.paged_sql(offset, page_length))
            .unwrap_or_else(|| self.query_string.clone());
        tracing::debug!(sql = %sql, "executing query");
        self.tx.with_connection(|conn| conn.query(&sql, &[]))
    }

    /// True when the delegate can page server-side.
    pub fn respects_paging_limits(&self) -> bool {
        let Some(delegate) = &self.delegate else {
            return false;
        };
        if delegate.paged_statement(0, 50).is_some() {
            return true;
        }
        delegate
            .paged_sql(0, 50)
            .is_some_and(|sql| !sql.is_empty())
    }

    /// Forward the filter set to the delegate. Without a delegate only an
    /// empty (reset) filter set is accepted.
    pub fn set_filters(&mut self, filters: Vec<Filter>) -> Result<()> {
        match &mut self.delegate {
            Some(delegate) => delegate.set_filters(filters),
            None if filters.is_empty() => Ok(()),
            None => Err(Error::unsupported(
                "no freeform delegate configured to handle filters",
            )),
        }
    }

    /// Forward the ordering to the delegate. Without a delegate only an
    /// empty (reset) ordering is accepted.
    pub fn set_order_by(&mut self, order_bys: Vec<OrderBy>) -> Result<()> {
        match &mut self.delegate {
            Some(delegate) => delegate.set_order_by(order_bys),
            None if order_bys.is_empty() => Ok(()),
            None => Err(Error::unsupported(
                "no freeform delegate configured to handle ordering",
            )),
        }
    }

    /// Store the row through the delegate. Requires an open transaction
    /// and a key-column configuration; both are checked before the
    /// delegate is consulted.
    pub fn store_row(&mut self, row: &mut RowItem) -> Result<u64> {
        self.check_writable()?;
        let Some(delegate) = self.delegate.as_mut() else {
            return Err(Error::unsupported("no freeform delegate configured"));
        };
        self.tx.with_connection(|conn| delegate.store_row(conn, row))
    }

    /// Remove the row through the delegate. Requirements match
    /// [`store_row`](Self::store_row).
    pub fn remove_row(&mut self, row: &RowItem) -> Result<bool> {
        self.check_writable()?;
        let Some(delegate) = self.delegate.as_mut() else {
            return Err(Error::unsupported("no freeform delegate configured"));
        };
        self.tx
            .with_connection(|conn| delegate.remove_row(conn, row))
    }

    fn check_writable(&self) -> Result<()> {
        if !self.tx.is_active() {
            return Err(Error::transaction(
                sqlbind_core::TransactionErrorKind::NotActive,
                "no transaction is active",
            ));
        }
        if self.primary_key_columns.is_empty() {
            return Err(Error::unsupported(
                "cannot write through a read-only freeform query",
            ));
        }
        Ok(())
    }

    /// Open a transaction.
    pub fn begin_transaction(&mut self) -> Result<()> {
        tracing::debug!("begin transaction");
        self.tx.begin()
    }

    /// Commit the open transaction.
    pub fn commit(&mut self) -> Result<()> {
        tracing::debug!("commit");
        self.tx.commit()
    }

    /// Roll back the open transaction.
    pub fn rollback(&mut self) -> Result<()> {
        tracing::debug!("rollback");
        self.tx.rollback()
    }

    /// The configured key columns.
    pub fn primary_key_columns(&self) -> &[String] {
        &self.primary_key_columns
    }

    /// Does any row match the given key values?
    ///
    /// Prefers a delegate statement, then a delegate query string. The
    /// final fallback rewrites the configured query's WHERE clause
    /// textually. That rewrite is best-effort only: complex queries
    /// should supply a delegate override instead.
    pub fn contains_row_with_key(&mut self, keys: &[Value]) -> Result<bool> {
        if keys.len() != self.primary_key_columns.len() {
            return Err(Error::query(format!(
                "expected {} key value(s), got {}",
                self.primary_key_columns.len(),
                keys.len()
            )));
        }
        if let Some(stmt) = self
            .delegate
            .as_ref()
            .and_then(|d| d.contains_statement(keys))
        {
            tracing::debug!(sql = %stmt, "row lookup via delegate statement");
            let rows = self
                .tx
                .with_connection(|conn| conn.query(stmt.sql(), stmt.params()))?;
            return Ok(!rows.is_empty());
        }
        let sql = match self.delegate.as_ref().and_then(|d| d.contains_sql(keys)) {
            Some(sql) => sql,
            None => self.rewrite_where_clause(keys),
        };
        tracing::debug!(sql = %sql, "row lookup");
        let rows = self.tx.with_connection(|conn| conn.query(&sql, &[]))?;
        Ok(!rows.is_empty())
    }

    /// Splice a key-equality clause into the configured query.
    ///
    /// An existing `WHERE` token (located case-insensitively) is rewritten
    /// so the original condition is AND-ed after the key clause; without
    /// one, a new WHERE clause is appended.
    fn rewrite_where_clause(&self, keys: &[Value]) -> String {
        let mut clause = String::new();
        for (ix, column) in self.primary_key_columns.iter().enumerate() {
            if ix > 0 {
                clause.push_str(" AND ");
            }
            clause.push_str(&quote_ident(column));
            match &keys[ix] {
                Value::Null => clause.push_str(" IS NULL"),
                value => {
                    let _ = write!(clause, " = {}", sql_literal(value));
                }
            }
        }
        if let Some(m) = WHERE_TOKEN.find(&self.query_string) {
            let before = &self.query_string[..m.start()];
            let after = &self.query_string[m.end()..];
            format!("{before}WHERE {clause} AND{after}")
        } else {
            format!("{} WHERE {}", self.query_string, clause)
        }
    }
}

/// Render a value as an inline SQL literal for the heuristic rewrite.
fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        Value::Int(n) => format!("'{n}'"),
        Value::BigInt(n) => format!("'{n}'"),
        Value::Double(n) => format!("'{n}'"),
        Value::Timestamp(n) => format!("'{n}'"),
        Value::Decimal(s) | Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Bytes(_) | Value::Default => "NULL".to_string(),
    }
}

fn count_from_rows(rows: &[Row]) -> Result<u64> {
    let value = rows
        .first()
        .and_then(|row| row.get(0))
        .ok_or_else(|| Error::query("count query returned no rows"))?;
    value
        .as_i64()
        .map(|n| n.max(0) as u64)
        .ok_or_else(|| Error::query("count query returned a non-numeric value"))
}

impl<P: ConnectionPool> QueryDelegate for FreeformQuery<P> {
    fn count(&mut self) -> Result<u64> {
        FreeformQuery::count(self)
    }

    fn results(&mut self, offset: usize, page_length: usize) -> Result<Vec<Row>> {
        FreeformQuery::results(self, offset, page_length)
    }

    fn respects_paging_limits(&self) -> bool {
        FreeformQuery::respects_paging_limits(self)
    }

    fn set_filters(&mut self, filters: Vec<Filter>) -> Result<()> {
        FreeformQuery::set_filters(self, filters)
    }

    fn set_order_by(&mut self, order_bys: Vec<OrderBy>) -> Result<()> {
        FreeformQuery::set_order_by(self, order_bys)
    }

    fn store_row(&mut self, row: &mut RowItem) -> Result<u64> {
        FreeformQuery::store_row(self, row)
    }

    fn remove_row(&mut self, row: &RowItem) -> Result<bool> {
        FreeformQuery::remove_row(self, row)
    }

    fn begin_transaction(&mut self) -> Result<()> {
        FreeformQuery::begin_transaction(self)
    }

    fn commit(&mut self) -> Result<()> {
        FreeformQuery::commit(self)
    }

    fn rollback(&mut self) -> Result<()> {
        FreeformQuery::rollback(self)
    }

    fn primary_key_columns(&self) -> &[String] {
        FreeformQuery::primary_key_columns(self)
    }

    fn contains_row_with_key(&mut self, keys: &[Value]) -> Result<bool> {
        FreeformQuery::contains_row_with_key(self, keys)
    }
}
