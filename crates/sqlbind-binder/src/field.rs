//! The editable-field contract.
//!
//! Widgets implement [`Field`]; the group only relies on this surface.
//! [`ValueField`] is the plain single-value implementation used by tests
//! and demos.

use crate::property::PropertyRef;
use sqlbind_core::{Error, Result, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// An editable UI field that can attach to a property data source.
pub trait Field {
    /// The attached property data source, if any.
    fn property_data_source(&self) -> Option<PropertyRef>;

    /// Attach (or detach, with `None`) a property data source.
    fn set_property_data_source(&mut self, property: Option<PropertyRef>);

    /// Is the field buffering edits locally?
    fn is_buffered(&self) -> bool;

    /// Switch buffering. Unbuffered fields write edits straight through.
    fn set_buffered(&mut self, buffered: bool);

    /// Push the buffered edit into the property data source.
    fn commit(&mut self) -> Result<()>;

    /// Drop the buffered edit and reload from the property data source.
    fn discard(&mut self) -> Result<()>;

    /// Has the field been edited since the last commit/discard?
    fn is_modified(&self) -> bool;

    fn is_read_only(&self) -> bool;

    fn set_read_only(&mut self, read_only: bool);

    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);
}

/// Shared handle to a field.
pub type FieldRef = Rc<RefCell<dyn Field>>;

/// A plain single-value field.
pub struct ValueField {
    caption: String,
    buffer: Value,
    modified: bool,
    buffered: bool,
    read_only: bool,
    enabled: bool,
    property: Option<PropertyRef>,
}

impl ValueField {
    pub fn new(caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
            buffer: Value::Null,
            modified: false,
            buffered: true,
            read_only: false,
            enabled: true,
            property: None,
        }
    }

    /// Wrap in a shared handle.
    pub fn shared(caption: impl Into<String>) -> Rc<RefCell<ValueField>> {
        Rc::new(RefCell::new(Self::new(caption)))
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// The field's current (possibly uncommitted) value.
    pub fn value(&self) -> Value {
        self.buffer.clone()
    }

    /// Edit the field. Buffered fields stage the edit locally; unbuffered
    /// fields write it through to the property immediately.
    pub fn set_value(&mut self, value: Value) -> Result<()> {
        if self.read_only {
            return Err(Error::read_only(&self.caption));
        }
        self.buffer = value;
        self.modified = true;
        if !self.buffered {
            if let Some(property) = &self.property {
                property.borrow_mut().set_value(self.buffer.clone())?;
            }
            self.modified = false;
        }
        Ok(())
    }

    fn reload_from_property(&mut self) {
        if let Some(property) = &self.property {
            self.buffer = property.borrow().value();
        }
        self.modified = false;
    }
}

impl Field for ValueField {
    fn property_data_source(&self) -> Option<PropertyRef> {
        self.property.clone()
    }

    fn set_property_data_source(&mut self, property: Option<PropertyRef>) {
        self.property = property;
        self.reload_from_property();
    }

    fn is_buffered(&self) -> bool {
        self.buffered
    }

    fn set_buffered(&mut self, buffered: bool) {
        self.buffered = buffered;
    }

    fn commit(&mut self) -> Result<()> {
        if let Some(property) = &self.property {
            if self.modified {
                property.borrow_mut().set_value(self.buffer.clone())?;
            }
        }
        self.modified = false;
        Ok(())
    }

    fn discard(&mut self) -> Result<()> {
        self.reload_from_property();
        Ok(())
    }

    fn is_modified(&self) -> bool {
        self.modified
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}
