//! Table-backed query delegate.
//!
//! [`TableQuery`] generates and executes SQL for one physical table:
//! primary-key discovery from database metadata, filtered/ordered paging,
//! optimistic-locking enforcement through a version column, and generated-
//! key retrieval with row-id change notification.

use crate::delegate::{
    ListenerId, QueryDelegate, RowIdChangeEvent, RowIdChangeNotifier,
};
use crate::transaction::TransactionContext;
use sqlbind_core::{
    sanitize_identifier, Connection, ConnectionPool, Error, Filter, OrderBy, Range, Result, Row,
    RowId, RowItem, TableMetadata, Value,
};
use sqlbind_query::SqlGenerator;
use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

/// Names a table, optionally qualified by catalog and schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    catalog: Option<String>,
    schema: Option<String>,
    table: String,
}

impl TableRef {
    /// An unqualified table name.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: None,
            table: table.into(),
        }
    }

    /// Qualify with a catalog name.
    pub fn catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    /// Qualify with a schema name.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn catalog_name(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Catalog, schema and table concatenated with dots, as used in
    /// generated statements.
    pub fn full_name(&self) -> String {
        let mut name = String::new();
        if let Some(catalog) = &self.catalog {
            name.push_str(catalog);
            name.push('.');
        }
        if let Some(schema) = &self.schema {
            name.push_str(schema);
            name.push('.');
        }
        name.push_str(&self.table);
        name
    }

    fn sanitized(&self) -> TableRef {
        TableRef {
            catalog: self.catalog.as_deref().map(sanitize_identifier),
            schema: self.schema.as_deref().map(sanitize_identifier),
            table: sanitize_identifier(&self.table),
        }
    }

    fn upper_cased(&self) -> TableRef {
        TableRef {
            catalog: self.catalog.as_deref().map(str::to_uppercase),
            schema: self.schema.as_deref().map(str::to_uppercase),
            table: self.table.to_uppercase(),
        }
    }
}

/// Query delegate for a single database table.
pub struct TableQuery<P: ConnectionPool> {
    table: TableRef,
    /// Cached concatenation of catalog, schema and table name
    full_table_name: String,
    primary_key_columns: Vec<String>,
    version_column: Option<String>,
    filters: Vec<Filter>,
    order_bys: Vec<OrderBy>,
    generator: Box<dyn SqlGenerator + Send>,
    tx: TransactionContext<P>,
    listeners: Vec<(ListenerId, Box<dyn FnMut(&RowIdChangeEvent) + Send>)>,
    next_listener_id: u64,
    /// Row-id change events held back until commit
    buffered_events: Vec<RowIdChangeEvent>,
}

impl<P: ConnectionPool> TableQuery<P> {
    /// Create a query for an unqualified table name. Special characters in
    /// the name are stripped; use [`with_ref_unescaped`](Self::with_ref_unescaped)
    /// to pass names through untouched.
    pub fn new(
        table: impl Into<String>,
        pool: Arc<P>,
        generator: Box<dyn SqlGenerator + Send>,
    ) -> Result<Self> {
        Self::build(TableRef::new(table), pool, generator, true)
    }

    /// Create a query for a qualified table reference, sanitizing each
    /// name component.
    pub fn with_ref(
        table: TableRef,
        pool: Arc<P>,
        generator: Box<dyn SqlGenerator + Send>,
    ) -> Result<Self> {
        Self::build(table, pool, generator, true)
    }

    /// Create a query for a qualified table reference using the names
    /// exactly as given.
    pub fn with_ref_unescaped(
        table: TableRef,
        pool: Arc<P>,
        generator: Box<dyn SqlGenerator + Send>,
    ) -> Result<Self> {
        Self::build(table, pool, generator, false)
    }

    fn build(
        table: TableRef,
        pool: Arc<P>,
        generator: Box<dyn SqlGenerator + Send>,
        escape_names: bool,
    ) -> Result<Self> {
        let table = if escape_names {
            table.sanitized()
        } else {
            table
        };
        if table.table.trim().is_empty() {
            return Err(Error::config("table name must be non-empty"));
        }
        let mut tx = TransactionContext::new(pool);
        let metadata = Self::fetch_metadata(&mut tx, &table)?;
        let resolved = TableRef {
            catalog: metadata.catalog.clone(),
            schema: metadata.schema.clone(),
            table: metadata.table.clone(),
        };
        if metadata.primary_key_columns.is_empty() {
            return Err(Error::config(format!(
                "primary key constraints have not been defined for the table \"{}\"; \
                 use a freeform query to access it",
                resolved.full_name()
            )));
        }
        let full_table_name = resolved.full_name();
        Ok(Self {
            table: resolved,
            full_table_name,
            primary_key_columns: metadata.primary_key_columns,
            version_column: None,
            filters: Vec::new(),
            order_bys: Vec::new(),
            generator,
            tx,
            listeners: Vec::new(),
            next_listener_id: 0,
            buffered_events: Vec::new(),
        })
    }

    /// Resolve the table through database metadata, retrying with
    /// upper-cased identifiers for databases that fold case.
    fn fetch_metadata(tx: &mut TransactionContext<P>, table: &TableRef) -> Result<TableMetadata> {
        let upper = table.upper_cased();
        let full_name = table.full_name();
        tx.with_connection(|conn| {
            if let Some(metadata) = conn.table_metadata(
                table.catalog.as_deref(),
                table.schema.as_deref(),
                &table.table,
            )? {
                return Ok(metadata);
            }
            if let Some(metadata) = conn.table_metadata(
                upper.catalog.as_deref(),
                upper.schema.as_deref(),
                &upper.table,
            )? {
                return Ok(metadata);
            }
            Err(Error::config(format!(
                "table with the name \"{full_name}\" was not found; check your database contents"
            )))
        })
    }

    /// Table name without catalog or schema qualification.
    pub fn table_name(&self) -> &str {
        self.table.table_name()
    }

    pub fn catalog_name(&self) -> Option<&str> {
        self.table.catalog_name()
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.table.schema_name()
    }

    /// The name used in generated statements.
    pub fn full_table_name(&self) -> &str {
        &self.full_table_name
    }

    pub fn version_column(&self) -> Option<&str> {
        self.version_column.as_deref()
    }

    /// Configure the optimistic-locking version column. Stores check the
    /// affected-row count once a version column is set: zero affected rows
    /// means another writer got there first.
    pub fn set_version_column(&mut self, column: impl Into<String>) {
        self.version_column = Some(column.into());
    }

    /// Is a transaction open on this query?
    pub fn is_in_transaction(&self) -> bool {
        self.tx.is_active()
    }

    /// Number of rows matching the current filters. Opens and closes a
    /// transaction transparently when none is active.
    pub fn count(&mut self) -> Result<u64> {
        tracing::debug!(table = %self.full_table_name, "fetching row count");
        let stmt = self.generator.select_query(
            &self.full_table_name,
            &self.filters,
            &[],
            Range::unbounded(),
            Some("COUNT(*)"),
        );
        let rows = self.run_in_implicit_tx(|q| {
            q.tx.with_connection(|conn| conn.query(stmt.sql(), stmt.params()))
        })?;
        let value = rows
            .first()
            .and_then(|row| row.get(0))
            .ok_or_else(|| Error::query_with_sql("count query returned no rows", stmt.sql()))?;
        value
            .as_i64()
            .map(|n| n.max(0) as u64)
            .ok_or_else(|| Error::query("count query returned a non-numeric value"))
    }

    /// Fetch a window of rows honoring the current filters and ordering.
    ///
    /// When no explicit ordering is set, rows are ordered ascending over
    /// all primary-key columns so paging is stable across calls.
    pub fn results(&mut self, offset: usize, page_length: usize) -> Result<Vec<Row>> {
        let order_bys = if self.order_bys.is_empty() {
            self.primary_key_columns
                .iter()
                .map(|column| OrderBy::asc(column.as_str()))
                .collect()
        } else {
            self.order_bys.clone()
        };
        let stmt = self.generator.select_query(
            &self.full_table_name,
            &self.filters,
            &order_bys,
            Range::new(offset, page_length),
            None,
        );
        tracing::debug!(sql = %stmt, "executing query");
        self.tx
            .with_connection(|conn| conn.query(stmt.sql(), stmt.params()))
    }

    /// Offset and page length are applied server-side.
    pub fn respects_paging_limits(&self) -> bool {
        true
    }

    /// Replace the filter set.
    pub fn set_filters(&mut self, filters: Vec<Filter>) {
        self.filters = filters;
    }

    /// Replace the ordering; an empty vector restores primary-key order.
    pub fn set_order_by(&mut self, order_bys: Vec<OrderBy>) {
        self.order_bys = order_bys;
    }

    /// Insert or update the row, depending on whether its id is temporary.
    ///
    /// On insert, the generated keys are read back and the resulting
    /// row-id change event is buffered until [`commit`](Self::commit);
    /// the row keeps its temporary id until the event is delivered.
    pub fn store_row(&mut self, row: &mut RowItem) -> Result<u64> {
        self.set_version_column_flag(row);
        let affected = if row.id().is_temporary() {
            let stmt = self.generator.insert_query(&self.full_table_name, row)?;
            tracing::debug!(sql = %stmt, "executing insert");
            let key_columns = self.primary_key_columns.clone();
            let (count, keys) = self.tx.with_connection(|conn| {
                conn.execute_returning_keys(stmt.sql(), stmt.params(), &key_columns)
            })?;
            if count > 0 {
                if let Some(new_id) = reconcile_row_id(&self.primary_key_columns, row, keys) {
                    self.buffered_events
                        .push(RowIdChangeEvent::new(row.id().clone(), new_id));
                }
            }
            count
        } else {
            let stmt = self.generator.update_query(&self.full_table_name, row)?;
            tracing::debug!(sql = %stmt, "executing update");
            self.tx
                .with_connection(|conn| conn.execute(stmt.sql(), stmt.params()))?
        };
        if self.version_column.is_some() && affected == 0 {
            return Err(Error::optimistic_lock(
                "someone else changed the row that was being stored",
                row.id().clone(),
            ));
        }
        Ok(affected)
    }

    /// Insert the row immediately inside its own transaction and return
    /// the final row id. Supports add flows that need the definitive id
    /// without waiting for an explicit commit.
    pub fn store_row_immediately(&mut self, row: &mut RowItem) -> Result<RowId> {
        self.begin_transaction()?;
        match self.insert_and_resolve(row) {
            Ok(new_id) => {
                self.commit()?;
                Ok(new_id)
            }
            Err(e) => {
                if let Err(rollback_err) = self.rollback() {
                    tracing::warn!(
                        error = %rollback_err,
                        "rollback after failed immediate store also failed"
                    );
                }
                Err(e)
            }
        }
    }

    fn insert_and_resolve(&mut self, row: &mut RowItem) -> Result<RowId> {
        self.set_version_column_flag(row);
        let stmt = self.generator.insert_query(&self.full_table_name, row)?;
        tracing::debug!(sql = %stmt, "executing immediate insert");
        let key_columns = self.primary_key_columns.clone();
        let (affected, keys) = self.tx.with_connection(|conn| {
            conn.execute_returning_keys(stmt.sql(), stmt.params(), &key_columns)
        })?;
        if affected == 0 {
            return Err(Error::query("insert affected no rows"));
        }
        reconcile_row_id(&self.primary_key_columns, row, keys)
            .ok_or_else(|| Error::query("insert did not produce a generated row id"))
    }

    /// Delete the row, matching on primary key and, when configured, the
    /// version column. Returns `false` for a plain "not found"; with a
    /// version column, zero affected rows is an optimistic-lock conflict.
    pub fn remove_row(&mut self, row: &RowItem) -> Result<bool> {
        tracing::debug!(row_id = %row.id(), "removing row");
        let stmt = self.generator.delete_query(
            &self.full_table_name,
            &self.primary_key_columns,
            self.version_column.as_deref(),
            row,
        )?;
        let affected = self
            .tx
            .with_connection(|conn| conn.execute(stmt.sql(), stmt.params()))?;
        if affected == 1 {
            return Ok(true);
        }
        if self.version_column.is_some() {
            return Err(Error::optimistic_lock(
                "someone else changed the row that was being deleted",
                row.id().clone(),
            ));
        }
        Ok(false)
    }

    /// Open a transaction.
    pub fn begin_transaction(&mut self) -> Result<()> {
        tracing::debug!(table = %self.full_table_name, "begin transaction");
        self.tx.begin()
    }

    /// Commit the open transaction, then deliver the buffered row-id
    /// change events.
    ///
    /// The buffer is taken and cleared on every attempt, before the
    /// underlying commit, so neither a failed commit nor a panicking
    /// listener can leave stale events behind for the next call.
    pub fn commit(&mut self) -> Result<()> {
        tracing::debug!(table = %self.full_table_name, "commit");
        let events = mem::take(&mut self.buffered_events);
        self.tx.commit()?;
        for event in &events {
            for (_, listener) in &mut self.listeners {
                listener(event);
            }
        }
        Ok(())
    }

    /// Roll back the open transaction. Buffered events are discarded and
    /// never delivered.
    pub fn rollback(&mut self) -> Result<()> {
        tracing::debug!(table = %self.full_table_name, "rollback");
        self.buffered_events.clear();
        self.tx.rollback()
    }

    /// The discovered primary-key columns, in key order.
    pub fn primary_key_columns(&self) -> &[String] {
        &self.primary_key_columns
    }

    /// Does any row match the given primary-key values in addition to the
    /// current filters? Opens and closes a transaction transparently when
    /// none is active.
    pub fn contains_row_with_key(&mut self, keys: &[Value]) -> Result<bool> {
        if keys.len() != self.primary_key_columns.len() {
            return Err(Error::query(format!(
                "expected {} key value(s), got {}",
                self.primary_key_columns.len(),
                keys.len()
            )));
        }
        let mut filters = self.filters.clone();
        for (column, key) in self.primary_key_columns.iter().zip(keys) {
            filters.push(Filter::Equal(column.clone(), key.clone()));
        }
        let stmt = self.generator.select_query(
            &self.full_table_name,
            &filters,
            &self.order_bys,
            Range::unbounded(),
            Some("*"),
        );
        let rows = self.run_in_implicit_tx(|q| {
            q.tx.with_connection(|conn| conn.query(stmt.sql(), stmt.params()))
        })?;
        Ok(!rows.is_empty())
    }

    fn set_version_column_flag(&self, row: &mut RowItem) {
        if let Some(column) = &self.version_column {
            if let Some(prop) = row.property_mut(column) {
                prop.set_version_column(true);
            }
        }
    }

    /// Run `f` inside the current transaction, or inside a transparently
    /// opened one that is committed afterwards even when `f` fails.
    fn run_in_implicit_tx<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let implicit = !self.tx.is_active();
        if implicit {
            self.begin_transaction()?;
        }
        let result = f(self);
        if implicit {
            let closed = self.commit();
            let value = result?;
            closed?;
            return Ok(value);
        }
        result
    }
}

/// Derive the final row id from the generated-keys row.
///
/// One generated value with a single key column uses the value directly.
/// One generated value with several key columns reuses it for every column
/// that is not externally writable and copies the assigned value for the
/// rest. Several generated values map by column name. Counts that match
/// neither shape are reported, since they usually indicate a generator or
/// database mismatch.
fn reconcile_row_id(
    primary_key_columns: &[String],
    row: &RowItem,
    keys: Option<Row>,
) -> Option<RowId> {
    let Some(keys) = keys else {
        tracing::warn!("insert returned no generated-keys row");
        return None;
    };
    let info = keys.column_info();
    let mut values: HashMap<&str, Value> = HashMap::new();
    for (i, name) in info.names().iter().enumerate() {
        values.insert(name.as_str(), keys.get(i).cloned().unwrap_or(Value::Null));
    }
    let mut new_key = Vec::with_capacity(primary_key_columns.len());
    if values.len() == 1 {
        let single = values.values().next().cloned().unwrap_or(Value::Null);
        if primary_key_columns.len() == 1 {
            new_key.push(single);
        } else {
            tracing::warn!(
                generated = 1,
                expected = primary_key_columns.len(),
                "generated key count does not match primary-key columns; \
                 reusing the single value for non-writable key columns"
            );
            for column in primary_key_columns {
                let Some(prop) = row.property(column) else {
                    tracing::warn!(column = %column, "row is missing a primary-key property");
                    return None;
                };
                if prop.is_read_only() {
                    new_key.push(single.clone());
                } else {
                    new_key.push(prop.effective_value().clone());
                }
            }
        }
    } else {
        if values.len() != primary_key_columns.len() {
            tracing::warn!(
                generated = values.len(),
                expected = primary_key_columns.len(),
                "generated key count does not match primary-key columns"
            );
        }
        for column in primary_key_columns {
            new_key.push(values.get(column.as_str()).cloned().unwrap_or(Value::Null));
        }
    }
    Some(RowId::new(new_key))
}

impl<P: ConnectionPool> QueryDelegate for TableQuery<P> {
    fn count(&mut self) -> Result<u64> {
        TableQuery::count(self)
    }

    fn results(&mut self, offset: usize, page_length: usize) -> Result<Vec<Row>> {
        TableQuery::results(self, offset, page_length)
    }

    fn respects_paging_limits(&self) -> bool {
        TableQuery::respects_paging_limits(self)
    }

    fn set_filters(&mut self, filters: Vec<Filter>) -> Result<()> {
        TableQuery::set_filters(self, filters);
        Ok(())
    }

    fn set_order_by(&mut self, order_bys: Vec<OrderBy>) -> Result<()> {
        TableQuery::set_order_by(self, order_bys);
        Ok(())
    }

    fn store_row(&mut self, row: &mut RowItem) -> Result<u64> {
        TableQuery::store_row(self, row)
    }

    fn remove_row(&mut self, row: &RowItem) -> Result<bool> {
        TableQuery::remove_row(self, row)
    }

    fn begin_transaction(&mut self) -> Result<()> {
        TableQuery::begin_transaction(self)
    }

    fn commit(&mut self) -> Result<()> {
        TableQuery::commit(self)
    }

    fn rollback(&mut self) -> Result<()> {
        TableQuery::rollback(self)
    }

    fn primary_key_columns(&self) -> &[String] {
        TableQuery::primary_key_columns(self)
    }

    fn contains_row_with_key(&mut self, keys: &[Value]) -> Result<bool> {
        TableQuery::contains_row_with_key(self, keys)
    }
}

impl<P: ConnectionPool> RowIdChangeNotifier for TableQuery<P> {
    fn add_row_id_change_listener(
        &mut self,
        listener: Box<dyn FnMut(&RowIdChangeEvent) + Send>,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, listener));
        id
    }

    fn remove_row_id_change_listener(&mut self, id: ListenerId) {
        self.listeners.retain(|(lid, _)| *lid != id);
    }
}
