//! Transactional property wrapper.
//!
//! A [`TransactionalProperty`] sits between a field and its source
//! property. Writes stage on the wrapper while a transaction is open and
//! only reach the source on `commit`; `rollback` discards the staged value
//! and restores the source to its pre-transaction snapshot, which also
//! covers batches where some wrappers had already propagated.

use crate::property::{Property, PropertyRef};
use sqlbind_core::{Result, Value};

/// Wraps a source property with staged-value transaction semantics.
pub struct TransactionalProperty {
    source: PropertyRef,
    /// Value staged by writes during a transaction
    staged: Option<Value>,
    /// Source value captured at transaction start
    snapshot: Option<Value>,
    in_transaction: bool,
}

impl TransactionalProperty {
    /// Wrap a source property.
    pub fn new(source: PropertyRef) -> Self {
        Self {
            source,
            staged: None,
            snapshot: None,
            in_transaction: false,
        }
    }

    /// The wrapped source property.
    pub fn source(&self) -> &PropertyRef {
        &self.source
    }

    pub fn is_in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Begin staging: snapshot the source's current value so rollback can
    /// restore it.
    pub fn start_transaction(&mut self) {
        self.in_transaction = true;
        self.snapshot = Some(self.source.borrow().value());
    }

    /// Propagate the staged value (if any) to the source and end the
    /// transaction.
    pub fn commit(&mut self) -> Result<()> {
        let result = match self.staged.take() {
            Some(value) => self.source.borrow_mut().set_value(value),
            None => Ok(()),
        };
        self.in_transaction = false;
        self.snapshot = None;
        result
    }

    /// Discard the staged value and restore the source to its snapshot.
    /// A no-op outside a transaction.
    pub fn rollback(&mut self) -> Result<()> {
        self.staged = None;
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        match self.snapshot.take() {
            Some(snapshot) => {
                // only touch the source if something was propagated
                if self.source.borrow().value() != snapshot {
                    self.source.borrow_mut().set_value(snapshot)
                } else {
                    Ok(())
                }
            }
            None => Ok(()),
        }
    }
}

impl Property for TransactionalProperty {
    fn value(&self) -> Value {
        match &self.staged {
            Some(value) => value.clone(),
            None => self.source.borrow().value(),
        }
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        if self.source.borrow().is_read_only() {
            return Err(sqlbind_core::Error::read_only("wrapped property"));
        }
        if self.in_transaction {
            self.staged = Some(value);
            return Ok(());
        }
        self.source.borrow_mut().set_value(value)
    }

    fn is_read_only(&self) -> bool {
        self.source.borrow().is_read_only()
    }
}
