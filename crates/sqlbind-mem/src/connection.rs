//! Connection implementation over the in-memory database.
//!
//! Transaction model: with auto-commit off, the first write clones the
//! shared database into a private overlay; reads and writes then run
//! against the overlay until `commit` publishes it back or `rollback`
//! drops it. Reads before the first write see the live database, so a
//! transaction opened after another writer's commit observes that commit.
//! Publishing replaces the database wholesale; concurrent open
//! transactions are last-commit-wins, which is all the test scenarios of
//! this layer require.

use crate::engine::{ExecOutcome, MemDatabase};
use crate::parser::parse;
use sqlbind_core::{Connection, Error, Result, Row, TableMetadata, Value};
use std::sync::{Arc, Mutex};

/// A connection to a shared [`MemDatabase`].
pub struct MemConnection {
    db: Arc<Mutex<MemDatabase>>,
    auto_commit: bool,
    overlay: Option<MemDatabase>,
}

impl MemConnection {
    pub fn new(db: Arc<Mutex<MemDatabase>>) -> Self {
        Self {
            db,
            auto_commit: true,
            overlay: None,
        }
    }

    fn run(&mut self, sql: &str, params: &[Value]) -> Result<ExecOutcome> {
        let command = parse(sql)?;
        tracing::trace!(sql = %sql, "executing");
        if self.auto_commit {
            let mut db = self.db.lock().expect("database lock poisoned");
            return db.execute(&command, params);
        }
        if command.is_write() && self.overlay.is_none() {
            let snapshot = self.db.lock().expect("database lock poisoned").clone();
            self.overlay = Some(snapshot);
        }
        match &mut self.overlay {
            Some(overlay) => overlay.execute(&command, params),
            None => self
                .db
                .lock()
                .expect("database lock poisoned")
                .execute(&command, params),
        }
    }

    fn publish(&mut self) {
        if let Some(overlay) = self.overlay.take() {
            *self.db.lock().expect("database lock poisoned") = overlay;
        }
    }
}

impl Connection for MemConnection {
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        match self.run(sql, params)? {
            ExecOutcome::Rows(rows) => Ok(rows),
            _ => Err(Error::query_with_sql(
                "statement does not produce a result set",
                sql,
            )),
        }
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        match self.run(sql, params)? {
            ExecOutcome::Affected(n) => Ok(n),
            ExecOutcome::Inserted { affected, .. } => Ok(affected),
            ExecOutcome::Rows(_) => Err(Error::query_with_sql(
                "statement produces a result set",
                sql,
            )),
        }
    }

    fn execute_returning_keys(
        &mut self,
        sql: &str,
        params: &[Value],
        key_columns: &[String],
    ) -> Result<(u64, Option<Row>)> {
        match self.run(sql, params)? {
            ExecOutcome::Inserted { affected, row } => {
                let mut names = Vec::new();
                let mut values = Vec::new();
                for column in key_columns {
                    if let Some((_, value)) = row.iter().find(|(name, _)| name == column) {
                        names.push(column.clone());
                        values.push(value.clone());
                    }
                }
                let keys = if names.is_empty() {
                    None
                } else {
                    Some(Row::new(names, values))
                };
                Ok((affected, keys))
            }
            ExecOutcome::Affected(n) => Ok((n, None)),
            ExecOutcome::Rows(_) => Err(Error::query_with_sql(
                "statement produces a result set",
                sql,
            )),
        }
    }

    fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        // re-enabling auto-commit publishes the open scope, as drivers do
        if enabled {
            self.publish();
        }
        self.auto_commit = enabled;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn commit(&mut self) -> Result<()> {
        self.publish();
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.overlay = None;
        Ok(())
    }

    fn table_metadata(
        &mut self,
        _catalog: Option<&str>,
        _schema: Option<&str>,
        table: &str,
    ) -> Result<Option<TableMetadata>> {
        let db = self.db.lock().expect("database lock poisoned");
        Ok(db.table_metadata(table))
    }
}
