//! Editable row representation.
//!
//! A [`RowItem`] is an ordered collection of [`ColumnProperty`] values keyed
//! by column name and identified by a [`RowId`]. Edits are staged on the
//! property (`modified_value`) separately from the committed value, so the
//! generator can build UPDATE statements that write the staged values while
//! matching on the committed ones.

use crate::error::Result;
use crate::row::Row;
use crate::row_id::RowId;
use crate::value::Value;
use crate::Error;

/// A named, typed, editable column value.
#[derive(Debug, Clone)]
pub struct ColumnProperty {
    name: String,
    /// Committed value, as loaded from (or last stored to) the database
    value: Value,
    /// Staged value from edits; cleared on commit/discard
    modified_value: Option<Value>,
    read_only: bool,
    nullable: bool,
    primary_key: bool,
    version_column: bool,
}

impl ColumnProperty {
    /// Create a writable, nullable, non-key property.
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            modified_value: None,
            read_only: false,
            nullable: true,
            primary_key: false,
            version_column: false,
        }
    }

    /// Mark as read-only (not externally writable).
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Mark as (non-)nullable.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Mark as a primary-key member.
    pub fn primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The committed value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The staged value when one exists, otherwise the committed value.
    /// This is what a store operation writes.
    pub fn effective_value(&self) -> &Value {
        self.modified_value.as_ref().unwrap_or(&self.value)
    }

    /// Stage a new value. Fails on a read-only property.
    pub fn set_value(&mut self, value: Value) -> Result<()> {
        if self.read_only {
            return Err(Error::read_only(&self.name));
        }
        self.modified_value = Some(value);
        Ok(())
    }

    /// Has a value been staged since the last commit/discard?
    pub fn is_modified(&self) -> bool {
        self.modified_value.is_some()
    }

    /// Fold the staged value into the committed one. Called after the row
    /// has been successfully stored.
    pub fn commit_value(&mut self) {
        if let Some(v) = self.modified_value.take() {
            self.value = v;
        }
    }

    /// Drop the staged value.
    pub fn discard(&mut self) {
        self.modified_value = None;
    }

    /// Replace the committed value outright (used when reloading from the
    /// database); clears any staged edit.
    pub fn reset_value(&mut self, value: Value) {
        self.value = value;
        self.modified_value = None;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Change the read-only flag in place (for properties built from
    /// result rows, where writability is known only afterwards).
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_version_column(&self) -> bool {
        self.version_column
    }

    /// Flag this property as the optimistic-locking version column.
    pub fn set_version_column(&mut self, version_column: bool) {
        self.version_column = version_column;
    }
}

/// An ordered collection of properties identified by a row id.
#[derive(Debug, Clone)]
pub struct RowItem {
    id: RowId,
    properties: Vec<ColumnProperty>,
}

impl RowItem {
    /// Create a row item from its identity and ordered properties.
    pub fn new(id: RowId, properties: Vec<ColumnProperty>) -> Self {
        Self { id, properties }
    }

    /// Build an editable item from a result row: every column becomes a
    /// writable property, with the listed primary-key columns flagged.
    pub fn from_row(id: RowId, row: &Row, primary_key_columns: &[String]) -> Self {
        let info = row.column_info();
        let properties = info
            .names()
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value = row.get(i).cloned().unwrap_or(Value::Null);
                ColumnProperty::new(name.clone(), value)
                    .primary_key(primary_key_columns.contains(name))
            })
            .collect();
        Self { id, properties }
    }

    pub fn id(&self) -> &RowId {
        &self.id
    }

    /// Replace the identity. A temporary id transitions to its final form
    /// exactly once, after the insert that produced it commits.
    pub fn set_id(&mut self, id: RowId) {
        self.id = id;
    }

    /// Look up a property by column name.
    pub fn property(&self, name: &str) -> Option<&ColumnProperty> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Look up a property by column name, mutably.
    pub fn property_mut(&mut self, name: &str) -> Option<&mut ColumnProperty> {
        self.properties.iter_mut().find(|p| p.name() == name)
    }

    /// All properties in column order.
    pub fn properties(&self) -> &[ColumnProperty] {
        &self.properties
    }

    /// All properties in column order, mutably.
    pub fn properties_mut(&mut self) -> &mut [ColumnProperty] {
        &mut self.properties
    }

    /// Column names in order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(ColumnProperty::name)
    }

    /// Fold every staged value into its committed one.
    pub fn commit_values(&mut self) {
        for p in &mut self.properties {
            p.commit_value();
        }
    }
}
