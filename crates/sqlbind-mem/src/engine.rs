//! The in-memory database.
//!
//! Tables are declared up front with [`TableSpec`]; rows are plain value
//! vectors. Statement execution interprets the parsed commands from
//! [`crate::parser`] directly. Comparison semantics follow SQL loosely:
//! NULL never matches a comparison, numeric values compare across integer
//! and floating types, and numeric strings coerce when compared against
//! numbers.

use crate::parser::{
    Assignment, CmpOp, Command, Delete, Insert, Operand, Pred, Projection, Select, Update,
};
use regex::Regex;
use sqlbind_core::{ColumnInfo, Error, Result, Row, TableMetadata, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One column of a table declaration.
#[derive(Debug, Clone)]
struct ColumnSpec {
    name: String,
    auto_increment: bool,
}

/// Declares a table: columns, key-generation and primary key.
#[derive(Debug, Clone)]
pub struct TableSpec {
    name: String,
    columns: Vec<ColumnSpec>,
    primary_keys: Vec<String>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_keys: Vec::new(),
        }
    }

    /// Add a plain column.
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(ColumnSpec {
            name: name.into(),
            auto_increment: false,
        });
        self
    }

    /// Add a column whose value the engine generates when an insert omits
    /// it.
    pub fn auto_increment(mut self, name: impl Into<String>) -> Self {
        self.columns.push(ColumnSpec {
            name: name.into(),
            auto_increment: true,
        });
        self
    }

    /// Declare the primary-key columns.
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_keys = columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone)]
struct MemTable {
    spec: TableSpec,
    rows: Vec<Vec<Value>>,
    next_key: i64,
}

impl MemTable {
    fn column_index(&self, name: &str) -> Result<usize> {
        self.spec
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| {
                Error::query(format!(
                    "no column \"{}\" in table \"{}\"",
                    name, self.spec.name
                ))
            })
    }

    fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::new(ColumnInfo::new(
            self.spec.columns.iter().map(|c| c.name.clone()).collect(),
        ))
    }
}

/// Result of executing one statement.
pub(crate) enum ExecOutcome {
    Rows(Vec<Row>),
    Affected(u64),
    Inserted {
        affected: u64,
        /// The inserted row as (column, value) pairs
        row: Vec<(String, Value)>,
    },
}

/// A shared in-memory database: named tables plus their rows.
#[derive(Debug, Clone, Default)]
pub struct MemDatabase {
    tables: BTreeMap<String, MemTable>,
}

impl MemDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table. Replaces any previous declaration of the same
    /// name.
    pub fn create_table(&mut self, spec: TableSpec) {
        self.tables.insert(
            spec.name.clone(),
            MemTable {
                spec,
                rows: Vec::new(),
                next_key: 1,
            },
        );
    }

    /// Insert a row directly, in declaration column order. Test fixture
    /// convenience; goes through no SQL. Auto-increment counters advance
    /// past any key values given here.
    pub fn insert_row(&mut self, table: &str, values: Vec<Value>) -> Result<()> {
        let table = self.table_mut(table)?;
        if values.len() != table.spec.columns.len() {
            return Err(Error::query(format!(
                "expected {} value(s), got {}",
                table.spec.columns.len(),
                values.len()
            )));
        }
        for (spec, value) in table.spec.columns.iter().zip(&values) {
            if spec.auto_increment {
                if let Some(n) = value.as_i64() {
                    table.next_key = table.next_key.max(n + 1);
                }
            }
        }
        table.rows.push(values);
        Ok(())
    }

    /// Number of rows currently in a table.
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.get(table).map(|t| t.rows.len())
    }

    /// Case-sensitive metadata lookup; the flat namespace ignores catalog
    /// and schema qualifiers.
    pub fn table_metadata(&self, table: &str) -> Option<TableMetadata> {
        self.tables.get(table).map(|t| TableMetadata {
            catalog: None,
            schema: None,
            table: t.spec.name.clone(),
            primary_key_columns: t.spec.primary_keys.clone(),
        })
    }

    fn table(&self, name: &str) -> Result<&MemTable> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::query(format!("no table named \"{name}\"")))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::query(format!("no table named \"{name}\"")))
    }

    pub(crate) fn execute(&mut self, command: &Command, params: &[Value]) -> Result<ExecOutcome> {
        match command {
            Command::Select(select) => self.run_select(select, params).map(ExecOutcome::Rows),
            Command::Insert(insert) => self.run_insert(insert, params),
            Command::Update(update) => self.run_update(update, params).map(ExecOutcome::Affected),
            Command::Delete(delete) => self.run_delete(delete, params).map(ExecOutcome::Affected),
        }
    }

    fn run_select(&self, select: &Select, params: &[Value]) -> Result<Vec<Row>> {
        let table = self.table(&select.table)?;
        let mut matched: Vec<&Vec<Value>> = Vec::new();
        for row in &table.rows {
            if eval_predicate(select.predicate.as_ref(), table, row, params)? {
                matched.push(row);
            }
        }
        if !select.order_by.is_empty() {
            let mut keys = Vec::new();
            for (column, ascending) in &select.order_by {
                keys.push((table.column_index(column)?, *ascending));
            }
            matched.sort_by(|a, b| {
                for (index, ascending) in &keys {
                    let ordering = sort_values(&a[*index], &b[*index]);
                    if ordering != Ordering::Equal {
                        return if *ascending {
                            ordering
                        } else {
                            ordering.reverse()
                        };
                    }
                }
                Ordering::Equal
            });
        }
        let offset = select.offset.unwrap_or(0);
        let matched: Vec<&Vec<Value>> = matched
            .into_iter()
            .skip(offset)
            .take(select.limit.unwrap_or(usize::MAX))
            .collect();
        match &select.projection {
            Projection::Count => {
                let n = matched.len() as i64;
                Ok(vec![Row::new(
                    vec!["COUNT(*)".to_string()],
                    vec![Value::BigInt(n)],
                )])
            }
            Projection::All => {
                let info = table.column_info();
                Ok(matched
                    .into_iter()
                    .map(|values| Row::with_columns(Arc::clone(&info), values.clone()))
                    .collect())
            }
            Projection::Columns(columns) => {
                let mut indices = Vec::new();
                for column in columns {
                    indices.push(table.column_index(column)?);
                }
                let info = Arc::new(ColumnInfo::new(columns.clone()));
                Ok(matched
                    .into_iter()
                    .map(|values| {
                        Row::with_columns(
                            Arc::clone(&info),
                            indices.iter().map(|i| values[*i].clone()).collect(),
                        )
                    })
                    .collect())
            }
        }
    }

    fn run_insert(&mut self, insert: &Insert, params: &[Value]) -> Result<ExecOutcome> {
        let mut provided = Vec::new();
        for (column, operand) in insert.columns.iter().zip(&insert.values) {
            provided.push((column.clone(), resolve(operand, params)?));
        }
        let table = self.table_mut(&insert.table)?;
        for (column, _) in &provided {
            table.column_index(column)?;
        }
        let mut values = Vec::with_capacity(table.spec.columns.len());
        for spec in &table.spec.columns {
            let given = provided
                .iter()
                .find(|(name, _)| *name == spec.name)
                .map(|(_, v)| v.clone());
            let value = match given {
                Some(v) => v,
                None if spec.auto_increment => {
                    let key = table.next_key;
                    table.next_key += 1;
                    Value::BigInt(key)
                }
                None => Value::Null,
            };
            values.push(value);
        }
        let row: Vec<(String, Value)> = table
            .spec
            .columns
            .iter()
            .zip(&values)
            .map(|(c, v)| (c.name.clone(), v.clone()))
            .collect();
        table.rows.push(values);
        Ok(ExecOutcome::Inserted { affected: 1, row })
    }

    fn run_update(&mut self, update: &Update, params: &[Value]) -> Result<u64> {
        // resolve against an immutable borrow first
        let (indices, predicate_rows) = {
            let table = self.table(&update.table)?;
            let mut indices = Vec::new();
            for assignment in &update.assignments {
                let column = match assignment {
                    Assignment::Set { column, .. } | Assignment::Increment { column, .. } => column,
                };
                indices.push(table.column_index(column)?);
            }
            let mut matched = Vec::new();
            for (i, row) in table.rows.iter().enumerate() {
                if eval_predicate(update.predicate.as_ref(), table, row, params)? {
                    matched.push(i);
                }
            }
            (indices, matched)
        };
        let mut resolved = Vec::new();
        for assignment in &update.assignments {
            resolved.push(match assignment {
                Assignment::Set { operand, .. } => Some(resolve(operand, params)?),
                Assignment::Increment { .. } => None,
            });
        }
        let table = self.table_mut(&update.table)?;
        for row_index in &predicate_rows {
            for ((assignment, value), column_index) in
                update.assignments.iter().zip(&resolved).zip(&indices)
            {
                let slot = &mut table.rows[*row_index][*column_index];
                match (assignment, value) {
                    (Assignment::Set { .. }, Some(v)) => *slot = v.clone(),
                    (Assignment::Increment { amount, .. }, _) => {
                        *slot = match slot {
                            Value::Int(n) => Value::Int(*n + *amount as i32),
                            Value::BigInt(n) => Value::BigInt(*n + amount),
                            other => {
                                return Err(Error::query(format!(
                                    "cannot increment non-integer value of type {}",
                                    other.type_name()
                                )));
                            }
                        };
                    }
                    (Assignment::Set { .. }, None) => unreachable!("set resolved above"),
                }
            }
        }
        Ok(predicate_rows.len() as u64)
    }

    fn run_delete(&mut self, delete: &Delete, params: &[Value]) -> Result<u64> {
        let keep = {
            let table = self.table(&delete.table)?;
            let mut keep = Vec::with_capacity(table.rows.len());
            for row in &table.rows {
                keep.push(!eval_predicate(delete.predicate.as_ref(), table, row, params)?);
            }
            keep
        };
        let table = self.table_mut(&delete.table)?;
        let before = table.rows.len();
        let mut keep_iter = keep.iter();
        table.rows.retain(|_| *keep_iter.next().unwrap_or(&true));
        Ok((before - table.rows.len()) as u64)
    }
}

fn resolve(operand: &Operand, params: &[Value]) -> Result<Value> {
    match operand {
        Operand::Param(index) => params.get(*index).cloned().ok_or_else(|| {
            Error::query(format!("missing bind value for parameter {}", index + 1))
        }),
        Operand::Literal(value) => Ok(value.clone()),
    }
}

fn eval_predicate(
    predicate: Option<&Pred>,
    table: &MemTable,
    row: &[Value],
    params: &[Value],
) -> Result<bool> {
    let Some(predicate) = predicate else {
        return Ok(true);
    };
    eval(predicate, table, row, params)
}

fn eval(predicate: &Pred, table: &MemTable, row: &[Value], params: &[Value]) -> Result<bool> {
    match predicate {
        Pred::Cmp {
            column,
            op,
            operand,
        } => {
            let value = &row[table.column_index(column)?];
            let other = resolve(operand, params)?;
            if value.is_null() || other.is_null() {
                return Ok(false);
            }
            let Some(ordering) = compare_values(value, &other) else {
                return Ok(false);
            };
            Ok(match op {
                CmpOp::Eq => ordering == Ordering::Equal,
                CmpOp::Ne => ordering != Ordering::Equal,
                CmpOp::Lt => ordering == Ordering::Less,
                CmpOp::Le => ordering != Ordering::Greater,
                CmpOp::Gt => ordering == Ordering::Greater,
                CmpOp::Ge => ordering != Ordering::Less,
            })
        }
        Pred::Like { column, operand } => {
            let value = &row[table.column_index(column)?];
            let pattern = resolve(operand, params)?;
            let (Value::Text(text), Some(pattern)) = (value, pattern.as_str().map(str::to_string))
            else {
                return Ok(false);
            };
            Ok(like_regex(&pattern)?.is_match(text))
        }
        Pred::IsNull { column, negated } => {
            let value = &row[table.column_index(column)?];
            Ok(value.is_null() != *negated)
        }
        Pred::And(parts) => {
            for part in parts {
                if !eval(part, table, row, params)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Pred::Or(parts) => {
            for part in parts {
                if eval(part, table, row, params)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Pred::Not(inner) => Ok(!eval(inner, table, row, params)?),
    }
}

/// Translate a SQL LIKE pattern into an anchored regex.
fn like_regex(pattern: &str) -> Result<Regex> {
    let mut regex = String::from("^");
    for c in pattern.chars() {
        match c {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');
    Regex::new(&regex).map_err(|e| Error::query(format!("bad LIKE pattern: {e}")))
}

/// Compare two values with SQL-ish coercion: numerics compare across
/// types, numeric strings coerce against numbers, text compares
/// lexicographically.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        (Value::Text(x), y) if y.as_f64().is_some() => {
            let x: f64 = x.trim().parse().ok()?;
            x.partial_cmp(&y.as_f64()?)
        }
        (x, Value::Text(y)) if x.as_f64().is_some() => {
            let y: f64 = y.trim().parse().ok()?;
            x.as_f64()?.partial_cmp(&y)
        }
        (Value::Timestamp(x), Value::Timestamp(y)) => Some(x.cmp(y)),
        (x, y) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return Some(x.cmp(&y));
            }
            x.as_f64()?.partial_cmp(&y.as_f64()?)
        }
    }
}

/// Total order for ORDER BY: NULLs first, incomparable values equal.
fn sort_values(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => compare_values(a, b).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn people_db() -> MemDatabase {
        let mut db = MemDatabase::new();
        db.create_table(
            TableSpec::new("people")
                .auto_increment("id")
                .column("name")
                .column("age")
                .primary_key(&["id"]),
        );
        db.insert_row(
            "people",
            vec![
                Value::BigInt(1),
                Value::Text("Ada".into()),
                Value::BigInt(36),
            ],
        )
        .unwrap();
        db.insert_row(
            "people",
            vec![
                Value::BigInt(2),
                Value::Text("Grace".into()),
                Value::BigInt(45),
            ],
        )
        .unwrap();
        db.insert_row(
            "people",
            vec![Value::BigInt(3), Value::Text("Lin".into()), Value::Null],
        )
        .unwrap();
        db
    }

    fn select_rows(db: &mut MemDatabase, sql: &str, params: &[Value]) -> Vec<Row> {
        match db.execute(&parse(sql).unwrap(), params).unwrap() {
            ExecOutcome::Rows(rows) => rows,
            _ => panic!("expected rows"),
        }
    }

    fn affected(db: &mut MemDatabase, sql: &str, params: &[Value]) -> u64 {
        match db.execute(&parse(sql).unwrap(), params).unwrap() {
            ExecOutcome::Affected(n) => n,
            ExecOutcome::Inserted { affected, .. } => affected,
            ExecOutcome::Rows(_) => panic!("expected a row count"),
        }
    }

    #[test]
    fn test_select_all() {
        let mut db = people_db();
        let rows = select_rows(&mut db, "SELECT * FROM people", &[]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get_by_name("name"), Some(&Value::Text("Ada".into())));
    }

    #[test]
    fn test_select_filtered_with_param() {
        let mut db = people_db();
        let rows = select_rows(
            &mut db,
            "SELECT * FROM people WHERE \"age\" > ?",
            &[Value::BigInt(40)],
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].get_by_name("name"),
            Some(&Value::Text("Grace".into()))
        );
    }

    #[test]
    fn test_null_never_matches_comparison() {
        let mut db = people_db();
        let rows = select_rows(
            &mut db,
            "SELECT * FROM people WHERE \"age\" <> ?",
            &[Value::BigInt(36)],
        );
        // Lin's NULL age does not match <>
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_is_null() {
        let mut db = people_db();
        let rows = select_rows(&mut db, "SELECT * FROM people WHERE \"age\" IS NULL", &[]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_by_name("name"), Some(&Value::Text("Lin".into())));
    }

    #[test]
    fn test_order_limit_offset() {
        let mut db = people_db();
        let rows = select_rows(
            &mut db,
            "SELECT * FROM people ORDER BY \"name\" DESC LIMIT 2 OFFSET 1",
            &[],
        );
        let names: Vec<_> = rows
            .iter()
            .map(|r| r.get_by_name("name").cloned().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![Value::Text("Grace".into()), Value::Text("Ada".into())]
        );
    }

    #[test]
    fn test_count() {
        let mut db = people_db();
        let rows = select_rows(&mut db, "SELECT COUNT(*) FROM people WHERE age > 30", &[]);
        assert_eq!(rows[0].get(0), Some(&Value::BigInt(2)));
    }

    #[test]
    fn test_projection_columns() {
        let mut db = people_db();
        let rows = select_rows(&mut db, "SELECT name, id FROM people LIMIT 1", &[]);
        assert_eq!(rows[0].get(0), Some(&Value::Text("Ada".into())));
        assert_eq!(rows[0].get(1), Some(&Value::BigInt(1)));
    }

    #[test]
    fn test_insert_generates_key() {
        let mut db = people_db();
        let outcome = db
            .execute(
                &parse("INSERT INTO people (\"name\", \"age\") VALUES (?, ?)").unwrap(),
                &[Value::Text("Mei".into()), Value::BigInt(28)],
            )
            .unwrap();
        let ExecOutcome::Inserted { affected, row } = outcome else {
            panic!("expected insert outcome");
        };
        assert_eq!(affected, 1);
        // auto-increment continues past the fixture rows
        assert_eq!(row[0], ("id".to_string(), Value::BigInt(4)));
        assert_eq!(db.row_count("people"), Some(4));
    }

    #[test]
    fn test_update_with_increment() {
        let mut db = people_db();
        let n = affected(
            &mut db,
            "UPDATE people SET \"age\" = \"age\" + 1 WHERE \"id\" = ?",
            &[Value::BigInt(1)],
        );
        assert_eq!(n, 1);
        let rows = select_rows(
            &mut db,
            "SELECT * FROM people WHERE \"id\" = ?",
            &[Value::BigInt(1)],
        );
        assert_eq!(rows[0].get_by_name("age"), Some(&Value::BigInt(37)));
    }

    #[test]
    fn test_update_no_match_affects_zero() {
        let mut db = people_db();
        let n = affected(
            &mut db,
            "UPDATE people SET \"name\" = ? WHERE \"id\" = ?",
            &[Value::Text("X".into()), Value::BigInt(99)],
        );
        assert_eq!(n, 0);
    }

    #[test]
    fn test_delete() {
        let mut db = people_db();
        let n = affected(
            &mut db,
            "DELETE FROM people WHERE \"id\" = ?",
            &[Value::BigInt(2)],
        );
        assert_eq!(n, 1);
        assert_eq!(db.row_count("people"), Some(2));
    }

    #[test]
    fn test_like() {
        let mut db = people_db();
        let rows = select_rows(&mut db, "SELECT * FROM people WHERE name LIKE 'G%'", &[]);
        assert_eq!(rows.len(), 1);
        let rows = select_rows(&mut db, "SELECT * FROM people WHERE name LIKE '_da'", &[]);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_text_number_coercion() {
        let mut db = people_db();
        // keys rendered as quoted literals by the heuristic rewrite still
        // match integer columns
        let rows = select_rows(&mut db, "SELECT * FROM people WHERE id = '1'", &[]);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_unknown_table_and_column() {
        let mut db = people_db();
        assert!(db
            .execute(&parse("SELECT * FROM missing").unwrap(), &[])
            .is_err());
        assert!(db
            .execute(&parse("SELECT * FROM people WHERE nope = 1").unwrap(), &[])
            .is_err());
    }

    #[test]
    fn test_missing_bind_value() {
        let mut db = people_db();
        assert!(db
            .execute(&parse("SELECT * FROM people WHERE id = ?").unwrap(), &[])
            .is_err());
    }
}
