//! Property and item contracts.
//!
//! A [`Property`] is a named editable value a field can attach to; an
//! [`Item`] resolves property ids to shared property handles. Handles are
//! `Rc<RefCell<_>>`: binding runs on the single request-processing thread,
//! like the widgets it serves.

use sqlbind_core::{ColumnProperty, Result, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// An editable value with a read-only flag.
pub trait Property {
    /// Current value.
    fn value(&self) -> Value;

    /// Replace the value. Fails on a read-only property.
    fn set_value(&mut self, value: Value) -> Result<()>;

    /// Can the value not be written?
    fn is_read_only(&self) -> bool;
}

/// Shared handle to a property.
pub type PropertyRef = Rc<RefCell<dyn Property>>;

impl Property for ColumnProperty {
    fn value(&self) -> Value {
        self.effective_value().clone()
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        ColumnProperty::set_value(self, value)
    }

    fn is_read_only(&self) -> bool {
        ColumnProperty::is_read_only(self)
    }
}

/// A free-standing property holding a plain value.
#[derive(Debug, Clone)]
pub struct ObjectProperty {
    value: Value,
    read_only: bool,
}

impl ObjectProperty {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            read_only: false,
        }
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Wrap in a shared handle.
    pub fn shared(value: impl Into<Value>) -> Rc<RefCell<ObjectProperty>> {
        Rc::new(RefCell::new(Self::new(value)))
    }
}

impl Property for ObjectProperty {
    fn value(&self) -> Value {
        self.value.clone()
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        if self.read_only {
            return Err(sqlbind_core::Error::read_only("object property"));
        }
        self.value = value;
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// Resolves property ids to shared properties.
pub trait Item {
    /// Look up a property by id.
    fn property(&self, id: &str) -> Option<PropertyRef>;

    /// All property ids, in item order.
    fn property_ids(&self) -> Vec<String>;
}

/// An item over explicitly registered shared properties, in insertion
/// order.
#[derive(Default)]
pub struct PropertyItem {
    entries: Vec<(String, PropertyRef)>,
}

impl PropertyItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a property under an id (builder form).
    pub fn with(mut self, id: impl Into<String>, property: PropertyRef) -> Self {
        self.add(id, property);
        self
    }

    /// Register a property under an id.
    pub fn add(&mut self, id: impl Into<String>, property: PropertyRef) {
        self.entries.push((id.into(), property));
    }
}

impl Item for PropertyItem {
    fn property(&self, id: &str) -> Option<PropertyRef> {
        self.entries
            .iter()
            .find(|(name, _)| name == id)
            .map(|(_, p)| Rc::clone(p))
    }

    fn property_ids(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_property_set_and_get() {
        let p = ObjectProperty::shared("Ada");
        p.borrow_mut()
            .set_value(Value::Text("Grace".into()))
            .unwrap();
        assert_eq!(p.borrow().value(), Value::Text("Grace".into()));
    }

    #[test]
    fn test_object_property_read_only() {
        let mut p = ObjectProperty::new(1i64).read_only(true);
        assert!(p.is_read_only());
        assert!(p.set_value(Value::BigInt(2)).is_err());
    }

    #[test]
    fn test_column_property_implements_property() {
        let mut p = ColumnProperty::new("name", Value::Text("Ada".into()));
        Property::set_value(&mut p, Value::Text("Grace".into())).unwrap();
        // edits stage on the column property; the committed value stays
        assert_eq!(Property::value(&p), Value::Text("Grace".into()));
        assert_eq!(p.value(), &Value::Text("Ada".into()));
    }

    #[test]
    fn test_property_item_lookup() {
        let item = PropertyItem::new()
            .with("name", ObjectProperty::shared("Ada") as PropertyRef)
            .with("age", ObjectProperty::shared(36i64) as PropertyRef);
        assert!(item.property("name").is_some());
        assert!(item.property("missing").is_none());
        assert_eq!(item.property_ids(), vec!["name", "age"]);
    }
}
