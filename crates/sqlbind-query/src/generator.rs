//! SQL generation strategy.
//!
//! A [`SqlGenerator`] turns a table name plus declarative descriptors
//! (filters, ordering, a result window, an editable row) into parameterized
//! [`Statement`]s. The [`DefaultSqlGenerator`] covers ANSI-ish SQL with
//! LIMIT/OFFSET paging; databases needing a different shape plug in their
//! own implementation.

use crate::dialect::Dialect;
use crate::statement::Statement;
use sqlbind_core::{Error, Filter, OrderBy, Range, Result, RowItem, Value};

/// Produces parameterized statements for SELECT/INSERT/UPDATE/DELETE.
pub trait SqlGenerator {
    /// Generate a SELECT over `table` honoring filters, ordering, the
    /// result window and an optional projection (defaults to `*`).
    fn select_query(
        &self,
        table: &str,
        filters: &[Filter],
        order_bys: &[OrderBy],
        range: Range,
        projection: Option<&str>,
    ) -> Statement;

    /// Generate an INSERT writing the row's writable values.
    fn insert_query(&self, table: &str, row: &RowItem) -> Result<Statement>;

    /// Generate an UPDATE writing the row's staged values, matched on the
    /// committed primary-key values (and the committed version value when a
    /// version column is flagged). The flagged version column itself is
    /// advanced by one, so its value changes on every successful update.
    fn update_query(&self, table: &str, row: &RowItem) -> Result<Statement>;

    /// Generate a DELETE matched on the committed primary-key values plus
    /// the version column when one is configured.
    fn delete_query(
        &self,
        table: &str,
        primary_key_columns: &[String],
        version_column: Option<&str>,
        row: &RowItem,
    ) -> Result<Statement>;
}

/// The standard generator: ANSI quoting, LIMIT/OFFSET paging.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSqlGenerator {
    dialect: Dialect,
}

impl DefaultSqlGenerator {
    /// Create a generator for the default dialect (Postgres).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator for a specific dialect.
    pub fn with_dialect(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn next_placeholder(&self, params: &[Value]) -> String {
        self.dialect.placeholder(params.len() + 1)
    }

    fn append_comparison(
        &self,
        sql: &mut String,
        params: &mut Vec<Value>,
        column: &str,
        op: &str,
        value: &Value,
    ) {
        sql.push_str(&self.dialect.quote_identifier(column));
        // NULL never matches a plain comparison; use the IS forms
        if value.is_null() {
            match op {
                "=" => sql.push_str(" IS NULL"),
                "<>" => sql.push_str(" IS NOT NULL"),
                _ => {
                    sql.push(' ');
                    sql.push_str(op);
                    sql.push_str(" NULL");
                }
            }
            return;
        }
        sql.push(' ');
        sql.push_str(op);
        sql.push(' ');
        sql.push_str(&self.next_placeholder(params));
        params.push(value.clone());
    }

    fn append_filter(&self, sql: &mut String, params: &mut Vec<Value>, filter: &Filter) {
        match filter {
            Filter::Equal(col, v) => self.append_comparison(sql, params, col, "=", v),
            Filter::NotEqual(col, v) => self.append_comparison(sql, params, col, "<>", v),
            Filter::Greater(col, v) => self.append_comparison(sql, params, col, ">", v),
            Filter::GreaterOrEqual(col, v) => self.append_comparison(sql, params, col, ">=", v),
            Filter::Less(col, v) => self.append_comparison(sql, params, col, "<", v),
            Filter::LessOrEqual(col, v) => self.append_comparison(sql, params, col, "<=", v),
            Filter::Like(col, pattern) => {
                sql.push_str(&self.dialect.quote_identifier(col));
                sql.push_str(" LIKE ");
                sql.push_str(&self.next_placeholder(params));
                params.push(Value::Text(pattern.clone()));
            }
            Filter::IsNull(col) => {
                sql.push_str(&self.dialect.quote_identifier(col));
                sql.push_str(" IS NULL");
            }
            Filter::And(parts) => self.append_group(sql, params, parts, " AND ", "1 = 1"),
            Filter::Or(parts) => self.append_group(sql, params, parts, " OR ", "1 = 0"),
            Filter::Not(inner) => {
                sql.push_str("NOT (");
                self.append_filter(sql, params, inner);
                sql.push(')');
            }
        }
    }

    fn append_group(
        &self,
        sql: &mut String,
        params: &mut Vec<Value>,
        parts: &[Filter],
        joiner: &str,
        empty: &str,
    ) {
        if parts.is_empty() {
            sql.push_str(empty);
            return;
        }
        sql.push('(');
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                sql.push_str(joiner);
            }
            self.append_filter(sql, params, part);
        }
        sql.push(')');
    }

    fn append_where(&self, sql: &mut String, params: &mut Vec<Value>, filters: &[Filter]) {
        if filters.is_empty() {
            return;
        }
        sql.push_str(" WHERE ");
        for (i, filter) in filters.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            self.append_filter(sql, params, filter);
        }
    }
}

impl SqlGenerator for DefaultSqlGenerator {
    fn select_query(
        &self,
        table: &str,
        filters: &[Filter],
        order_bys: &[OrderBy],
        range: Range,
        projection: Option<&str>,
    ) -> Statement {
        let mut sql = format!("SELECT {} FROM {}", projection.unwrap_or("*"), table);
        let mut params = Vec::new();
        self.append_where(&mut sql, &mut params, filters);
        if !order_bys.is_empty() {
            sql.push_str(" ORDER BY ");
            for (i, ob) in order_bys.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(&self.dialect.quote_identifier(ob.column()));
                sql.push_str(if ob.is_ascending() { " ASC" } else { " DESC" });
            }
        }
        if range.is_bounded() {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", range.limit(), range.offset()));
        }
        Statement::new(sql, params)
    }

    fn insert_query(&self, table: &str, row: &RowItem) -> Result<Statement> {
        let mut columns = Vec::new();
        let mut params = Vec::new();
        for prop in row.properties() {
            if prop.is_read_only() {
                continue;
            }
            let value = prop.effective_value();
            if matches!(value, Value::Default) {
                continue;
            }
            // Null key values are left to the database's key generation
            if prop.is_primary_key() && value.is_null() {
                continue;
            }
            columns.push(self.dialect.quote_identifier(prop.name()));
            params.push(value.clone());
        }
        if columns.is_empty() {
            return Err(Error::query("row has no writable values to insert"));
        }
        let placeholders: Vec<String> = (1..=params.len())
            .map(|i| self.dialect.placeholder(i))
            .collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );
        Ok(Statement::new(sql, params))
    }

    fn update_query(&self, table: &str, row: &RowItem) -> Result<Statement> {
        let mut sets = Vec::new();
        let mut params = Vec::new();
        for prop in row.properties() {
            if prop.is_primary_key() || prop.is_read_only() || prop.is_version_column() {
                continue;
            }
            let placeholder = self.next_placeholder(&params);
            sets.push(format!(
                "{} = {}",
                self.dialect.quote_identifier(prop.name()),
                placeholder
            ));
            params.push(prop.effective_value().clone());
        }
        let version = row.properties().iter().find(|p| p.is_version_column());
        if let Some(vp) = version {
            let quoted = self.dialect.quote_identifier(vp.name());
            sets.push(format!("{quoted} = {quoted} + 1"));
        }
        if sets.is_empty() {
            return Err(Error::query("row has no writable values to update"));
        }

        let mut sql = format!("UPDATE {} SET {}", table, sets.join(", "));
        let mut conditions = String::new();
        for prop in row.properties().iter().filter(|p| p.is_primary_key()) {
            if !conditions.is_empty() {
                conditions.push_str(" AND ");
            }
            self.append_comparison(&mut conditions, &mut params, prop.name(), "=", prop.value());
        }
        if conditions.is_empty() {
            return Err(Error::query("row has no primary-key properties to match"));
        }
        if let Some(vp) = version {
            conditions.push_str(" AND ");
            // Match on the version the row was loaded with; a concurrent
            // writer has advanced it and the update affects zero rows.
            self.append_comparison(&mut conditions, &mut params, vp.name(), "=", vp.value());
        }
        sql.push_str(" WHERE ");
        sql.push_str(&conditions);
        Ok(Statement::new(sql, params))
    }

    fn delete_query(
        &self,
        table: &str,
        primary_key_columns: &[String],
        version_column: Option<&str>,
        row: &RowItem,
    ) -> Result<Statement> {
        let mut conditions = String::new();
        let mut params = Vec::new();
        for column in primary_key_columns {
            let prop = row.property(column).ok_or_else(|| {
                Error::query(format!("row is missing primary-key column \"{column}\""))
            })?;
            if !conditions.is_empty() {
                conditions.push_str(" AND ");
            }
            self.append_comparison(&mut conditions, &mut params, column, "=", prop.value());
        }
        if let Some(column) = version_column {
            let prop = row.property(column).ok_or_else(|| {
                Error::query(format!("row is missing version column \"{column}\""))
            })?;
            if !conditions.is_empty() {
                conditions.push_str(" AND ");
            }
            self.append_comparison(&mut conditions, &mut params, column, "=", prop.value());
        }
        if conditions.is_empty() {
            return Err(Error::query("delete requires at least one key column"));
        }
        Ok(Statement::new(
            format!("DELETE FROM {table} WHERE {conditions}"),
            params,
        ))
    }
}
