//! Field groups: binding fields to an item with buffered commit.
//!
//! A [`FieldGroup`] binds editable fields to the properties of an item.
//! Every bound property is wrapped in a
//! [`TransactionalProperty`](crate::TransactionalProperty) so edits stage
//! instead of hitting the source directly. `commit` applies every field's
//! edit to every wrapped property atomically: any failure (a commit
//! handler aborting, a field refusing its value, a property write failing)
//! rolls the whole batch back.

use crate::field::FieldRef;
use crate::property::{Item, PropertyRef};
use crate::transactional::TransactionalProperty;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Failure to bind a field to a property id.
#[derive(Debug)]
pub struct BindError {
    pub message: String,
}

impl BindError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BindError {}

/// A commit that was aborted; the cause is preserved.
#[derive(Debug)]
pub struct CommitError {
    pub message: String,
    pub cause: Option<Box<dyn std::error::Error>>,
}

impl CommitError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn caused_by(
        message: impl Into<String>,
        cause: impl std::error::Error + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}", self.message, cause),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for CommitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_deref()
    }
}

/// Handle for removing a registered commit handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Context passed to commit handlers.
pub struct CommitEvent<'a> {
    group: &'a FieldGroup,
}

impl CommitEvent<'_> {
    /// The group being committed.
    pub fn field_group(&self) -> &FieldGroup {
        self.group
    }
}

/// Runs custom logic around a group commit. Either side may abort the
/// commit by returning an error; the whole batch is then rolled back.
pub trait CommitHandler {
    /// Called after field transactions start, before field values are
    /// pushed into the wrapped properties.
    fn pre_commit(&self, event: &CommitEvent<'_>) -> Result<(), CommitError> {
        let _ = event;
        Ok(())
    }

    /// Called after field values are pushed, before the wrapped properties
    /// commit.
    fn post_commit(&self, event: &CommitEvent<'_>) -> Result<(), CommitError> {
        let _ = event;
        Ok(())
    }
}

struct Binding {
    property_id: String,
    field: FieldRef,
    wrapper: Option<Rc<RefCell<TransactionalProperty>>>,
}

/// Binds fields to item properties and commits them as one batch.
pub struct FieldGroup {
    item: Option<Box<dyn Item>>,
    buffered: bool,
    enabled: bool,
    read_only: bool,
    bindings: Vec<Binding>,
    handlers: Vec<(HandlerId, Box<dyn CommitHandler>)>,
    next_handler_id: u64,
}

impl FieldGroup {
    /// An empty group; set an item with
    /// [`set_item_data_source`](Self::set_item_data_source).
    pub fn new() -> Self {
        Self {
            item: None,
            buffered: true,
            enabled: true,
            read_only: false,
            bindings: Vec::new(),
            handlers: Vec::new(),
            next_handler_id: 0,
        }
    }

    /// A group bound to the given item.
    pub fn with_item(item: Box<dyn Item>) -> Self {
        let mut group = Self::new();
        group.item = Some(item);
        group
    }

    /// Replace the item and rebind every existing field-to-property-id
    /// association against it.
    pub fn set_item_data_source(&mut self, item: Box<dyn Item>) -> Result<(), BindError> {
        self.item = Some(item);
        for index in 0..self.bindings.len() {
            self.attach_binding(index)?;
        }
        Ok(())
    }

    pub fn has_item_data_source(&self) -> bool {
        self.item.is_some()
    }

    /// Bind a field to a property id. Fails when the id is already bound
    /// to a different field. Before an item is set the association is
    /// recorded and attached when one arrives.
    pub fn bind(&mut self, field: FieldRef, property_id: impl Into<String>) -> Result<(), BindError> {
        let property_id = property_id.into();
        let index = match self
            .bindings
            .iter()
            .position(|b| b.property_id == property_id)
        {
            Some(existing) => {
                if !Rc::ptr_eq(&self.bindings[existing].field, &field) {
                    return Err(BindError::new(format!(
                        "property id \"{property_id}\" is already bound to another field"
                    )));
                }
                existing
            }
            None => {
                self.bindings.push(Binding {
                    property_id,
                    field,
                    wrapper: None,
                });
                self.bindings.len() - 1
            }
        };
        if self.item.is_some() {
            self.attach_binding(index)?;
        }
        Ok(())
    }

    /// Detach a field from its property id and remove it from the group.
    pub fn unbind(&mut self, field: &FieldRef) -> Result<(), BindError> {
        let index = self
            .bindings
            .iter()
            .position(|b| Rc::ptr_eq(&b.field, field))
            .ok_or_else(|| BindError::new("the given field is not part of this field group"))?;
        let binding = self.bindings.remove(index);
        binding.field.borrow_mut().set_property_data_source(None);
        Ok(())
    }

    fn attach_binding(&mut self, index: usize) -> Result<(), BindError> {
        let Some(item) = &self.item else {
            return Ok(());
        };
        let property_id = self.bindings[index].property_id.clone();
        let property = item.property(&property_id).ok_or_else(|| {
            BindError::new(format!(
                "a property with id \"{property_id}\" was not found in the item"
            ))
        })?;
        let wrapper = Rc::new(RefCell::new(TransactionalProperty::new(property)));
        let field = Rc::clone(&self.bindings[index].field);
        self.bindings[index].wrapper = Some(Rc::clone(&wrapper));
        field
            .borrow_mut()
            .set_property_data_source(Some(wrapper as PropertyRef));
        self.configure_field(&field);
        Ok(())
    }

    fn configure_field(&self, field: &FieldRef) {
        let mut f = field.borrow_mut();
        f.set_buffered(self.buffered);
        f.set_enabled(self.enabled);
        let source_read_only = f
            .property_data_source()
            .is_some_and(|p| p.borrow().is_read_only());
        f.set_read_only(source_read_only || self.read_only);
    }

    /// Is buffered commit in use? Defaults to true.
    pub fn is_buffered(&self) -> bool {
        self.buffered
    }

    /// Switch buffering on all bound fields. Unbuffered groups apply edits
    /// directly and `commit` becomes a no-op.
    pub fn set_buffered(&mut self, buffered: bool) {
        if buffered == self.buffered {
            return;
        }
        self.buffered = buffered;
        for binding in &self.bindings {
            binding.field.borrow_mut().set_buffered(buffered);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Update the enabled state of all bound fields.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        for binding in &self.bindings {
            binding.field.borrow_mut().set_enabled(enabled);
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Update the read-only state of all bound fields; fields whose data
    /// source is read-only stay read-only regardless.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
        for binding in &self.bindings {
            let mut field = binding.field.borrow_mut();
            let source_read_only = field
                .property_data_source()
                .is_some_and(|p| p.borrow().is_read_only());
            field.set_read_only(source_read_only || read_only);
        }
    }

    /// All bound fields, in binding order.
    pub fn fields(&self) -> Vec<FieldRef> {
        self.bindings.iter().map(|b| Rc::clone(&b.field)).collect()
    }

    /// The field bound to a property id.
    pub fn field(&self, property_id: &str) -> Option<FieldRef> {
        self.bindings
            .iter()
            .find(|b| b.property_id == property_id)
            .map(|b| Rc::clone(&b.field))
    }

    /// The property id a field is bound to.
    pub fn property_id(&self, field: &FieldRef) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| Rc::ptr_eq(&b.field, field))
            .map(|b| b.property_id.as_str())
    }

    /// Property ids with a bound field, in binding order.
    pub fn bound_property_ids(&self) -> Vec<String> {
        self.bindings.iter().map(|b| b.property_id.clone()).collect()
    }

    /// Item property ids without a bound field. Empty before an item is
    /// set.
    pub fn unbound_property_ids(&self) -> Vec<String> {
        let Some(item) = &self.item else {
            return Vec::new();
        };
        item.property_ids()
            .into_iter()
            .filter(|id| !self.bindings.iter().any(|b| &b.property_id == id))
            .collect()
    }

    /// Has any bound field been edited since the last commit/discard?
    pub fn is_modified(&self) -> bool {
        self.bindings
            .iter()
            .any(|b| b.field.borrow().is_modified())
    }

    /// Register a commit handler; returns a handle for removal.
    pub fn add_commit_handler(&mut self, handler: Box<dyn CommitHandler>) -> HandlerId {
        let id = HandlerId(self.next_handler_id);
        self.next_handler_id += 1;
        self.handlers.push((id, handler));
        id
    }

    /// Remove a previously registered commit handler.
    pub fn remove_commit_handler(&mut self, id: HandlerId) {
        self.handlers.retain(|(hid, _)| *hid != id);
    }

    /// Commit all bound fields as one batch.
    ///
    /// A no-op when buffering is off. Otherwise: start a transaction on
    /// every wrapper, run pre-commit handlers, push every field's edit
    /// into its wrapped property, run post-commit handlers, then commit
    /// every wrapper. Any failure rolls every wrapper back (best-effort)
    /// and surfaces as a [`CommitError`] carrying the cause.
    pub fn commit(&mut self) -> Result<(), CommitError> {
        if !self.buffered {
            return Ok(());
        }
        for binding in &self.bindings {
            let Some(wrapper) = &binding.wrapper else {
                return Err(CommitError::new(format!(
                    "property \"{}\" is not attached to a data source",
                    binding.property_id
                )));
            };
            wrapper.borrow_mut().start_transaction();
        }
        if let Err(cause) = self.run_commit_steps() {
            self.rollback_all();
            return Err(cause);
        }
        Ok(())
    }

    fn run_commit_steps(&self) -> Result<(), CommitError> {
        self.fire_pre_commit()?;
        for binding in &self.bindings {
            binding
                .field
                .borrow_mut()
                .commit()
                .map_err(|e| CommitError::caused_by("field commit failed", e))?;
        }
        self.fire_post_commit()?;
        for binding in &self.bindings {
            if let Some(wrapper) = &binding.wrapper {
                wrapper
                    .borrow_mut()
                    .commit()
                    .map_err(|e| CommitError::caused_by("property commit failed", e))?;
            }
        }
        Ok(())
    }

    fn rollback_all(&self) {
        for binding in &self.bindings {
            if let Some(wrapper) = &binding.wrapper {
                if let Err(e) = wrapper.borrow_mut().rollback() {
                    tracing::warn!(
                        property = %binding.property_id,
                        error = %e,
                        "rollback failed; continuing with the remaining properties"
                    );
                }
            }
        }
    }

    fn fire_pre_commit(&self) -> Result<(), CommitError> {
        let event = CommitEvent { group: self };
        for (_, handler) in &self.handlers {
            handler.pre_commit(&event)?;
        }
        Ok(())
    }

    fn fire_post_commit(&self) -> Result<(), CommitError> {
        let event = CommitEvent { group: self };
        for (_, handler) in &self.handlers {
            handler.post_commit(&event)?;
        }
        Ok(())
    }

    /// Discard every bound field's edits, best-effort: one field failing
    /// does not stop the rest.
    pub fn discard(&mut self) {
        for binding in &self.bindings {
            if let Err(e) = binding.field.borrow_mut().discard() {
                tracing::warn!(
                    property = %binding.property_id,
                    error = %e,
                    "discard failed; continuing with the remaining fields"
                );
            }
        }
    }
}

impl Default for FieldGroup {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, ValueField};
    use crate::property::{ObjectProperty, Property, PropertyItem};
    use sqlbind_core::Value;

    fn name_age_item() -> (Box<PropertyItem>, PropertyRef, PropertyRef) {
        let name = ObjectProperty::shared("Ada");
        let age = ObjectProperty::shared(36i64);
        let item = PropertyItem::new()
            .with("name", name.clone() as PropertyRef)
            .with("age", age.clone() as PropertyRef);
        (Box::new(item), name as PropertyRef, age as PropertyRef)
    }

    #[test]
    fn test_bind_and_commit_two_fields() {
        let (item, name, age) = name_age_item();
        let mut group = FieldGroup::with_item(item);
        let name_field = ValueField::shared("name");
        let age_field = ValueField::shared("age");
        group.bind(name_field.clone(), "name").unwrap();
        group.bind(age_field.clone(), "age").unwrap();

        name_field
            .borrow_mut()
            .set_value(Value::Text("Grace".into()))
            .unwrap();
        age_field.borrow_mut().set_value(Value::BigInt(45)).unwrap();
        assert!(group.is_modified());

        group.commit().unwrap();
        assert_eq!(name.borrow().value(), Value::Text("Grace".into()));
        assert_eq!(age.borrow().value(), Value::BigInt(45));
    }

    #[test]
    fn test_bind_same_property_to_other_field_fails() {
        let (item, _, _) = name_age_item();
        let mut group = FieldGroup::with_item(item);
        group.bind(ValueField::shared("a"), "name").unwrap();
        let err = group.bind(ValueField::shared("b"), "name").unwrap_err();
        assert!(err.message.contains("already bound"));
    }

    #[test]
    fn test_bind_missing_property_fails() {
        let (item, _, _) = name_age_item();
        let mut group = FieldGroup::with_item(item);
        let err = group.bind(ValueField::shared("x"), "missing").unwrap_err();
        assert!(err.message.contains("was not found"));
    }

    #[test]
    fn test_edits_stay_buffered_until_commit() {
        let (item, name, _) = name_age_item();
        let mut group = FieldGroup::with_item(item);
        let field = ValueField::shared("name");
        group.bind(field.clone(), "name").unwrap();
        field
            .borrow_mut()
            .set_value(Value::Text("Grace".into()))
            .unwrap();
        assert_eq!(name.borrow().value(), Value::Text("Ada".into()));
        group.commit().unwrap();
        assert_eq!(name.borrow().value(), Value::Text("Grace".into()));
    }

    struct AbortingHandler {
        on_post: bool,
    }

    impl CommitHandler for AbortingHandler {
        fn pre_commit(&self, _event: &CommitEvent<'_>) -> Result<(), CommitError> {
            if self.on_post {
                Ok(())
            } else {
                Err(CommitError::new("pre-commit abort"))
            }
        }

        fn post_commit(&self, _event: &CommitEvent<'_>) -> Result<(), CommitError> {
            if self.on_post {
                Err(CommitError::new("post-commit abort"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_post_commit_abort_rolls_back_all_properties() {
        let (item, name, age) = name_age_item();
        let mut group = FieldGroup::with_item(item);
        let name_field = ValueField::shared("name");
        let age_field = ValueField::shared("age");
        group.bind(name_field.clone(), "name").unwrap();
        group.bind(age_field.clone(), "age").unwrap();
        group.add_commit_handler(Box::new(AbortingHandler { on_post: true }));

        name_field
            .borrow_mut()
            .set_value(Value::Text("Grace".into()))
            .unwrap();
        age_field.borrow_mut().set_value(Value::BigInt(45)).unwrap();

        let err = group.commit().unwrap_err();
        assert!(err.message.contains("post-commit abort"));
        // neither source property was updated
        assert_eq!(name.borrow().value(), Value::Text("Ada".into()));
        assert_eq!(age.borrow().value(), Value::BigInt(36));
    }

    #[test]
    fn test_pre_commit_abort_keeps_sources() {
        let (item, name, _) = name_age_item();
        let mut group = FieldGroup::with_item(item);
        let field = ValueField::shared("name");
        group.bind(field.clone(), "name").unwrap();
        let id = group.add_commit_handler(Box::new(AbortingHandler { on_post: false }));

        field
            .borrow_mut()
            .set_value(Value::Text("Grace".into()))
            .unwrap();
        assert!(group.commit().is_err());
        assert_eq!(name.borrow().value(), Value::Text("Ada".into()));

        // removing the handler lets the commit through
        group.remove_commit_handler(id);
        group.commit().unwrap();
        assert_eq!(name.borrow().value(), Value::Text("Grace".into()));
    }

    #[test]
    fn test_unbuffered_commit_is_noop() {
        let (item, name, _) = name_age_item();
        let mut group = FieldGroup::with_item(item);
        let field = ValueField::shared("name");
        group.bind(field.clone(), "name").unwrap();
        group.set_buffered(false);
        // unbuffered edits reach the wrapper (and source) immediately
        field
            .borrow_mut()
            .set_value(Value::Text("Grace".into()))
            .unwrap();
        assert_eq!(name.borrow().value(), Value::Text("Grace".into()));
        group.commit().unwrap();
    }

    #[test]
    fn test_discard_resets_fields() {
        let (item, _, _) = name_age_item();
        let mut group = FieldGroup::with_item(item);
        let field = ValueField::shared("name");
        group.bind(field.clone(), "name").unwrap();
        field
            .borrow_mut()
            .set_value(Value::Text("Grace".into()))
            .unwrap();
        group.discard();
        assert_eq!(field.borrow().value(), Value::Text("Ada".into()));
        assert!(!group.is_modified());
    }

    #[test]
    fn test_set_item_data_source_rebinds() {
        let (item, _, _) = name_age_item();
        let mut group = FieldGroup::with_item(item);
        let field = ValueField::shared("name");
        group.bind(field.clone(), "name").unwrap();

        let new_name = ObjectProperty::shared("Lin");
        let new_item = PropertyItem::new()
            .with("name", new_name.clone() as PropertyRef)
            .with("age", ObjectProperty::shared(20i64) as PropertyRef);
        group.set_item_data_source(Box::new(new_item)).unwrap();

        assert_eq!(field.borrow().value(), Value::Text("Lin".into()));
        field
            .borrow_mut()
            .set_value(Value::Text("Mei".into()))
            .unwrap();
        group.commit().unwrap();
        assert_eq!(new_name.borrow().value(), Value::Text("Mei".into()));
    }

    #[test]
    fn test_bind_before_item_attaches_later() {
        let mut group = FieldGroup::new();
        let field = ValueField::shared("name");
        group.bind(field.clone(), "name").unwrap();
        assert!(field.borrow().property_data_source().is_none());

        let (item, _, _) = name_age_item();
        group.set_item_data_source(item).unwrap();
        assert!(field.borrow().property_data_source().is_some());
        assert_eq!(field.borrow().value(), Value::Text("Ada".into()));
    }

    #[test]
    fn test_unbind_detaches() {
        let (item, _, _) = name_age_item();
        let mut group = FieldGroup::with_item(item);
        let field: FieldRef = ValueField::shared("name");
        group.bind(field.clone(), "name").unwrap();
        group.unbind(&field).unwrap();
        assert!(field.borrow().property_data_source().is_none());
        assert!(group.bound_property_ids().is_empty());
        // the property is bindable again
        group.bind(ValueField::shared("other"), "name").unwrap();
    }

    #[test]
    fn test_unbound_property_ids() {
        let (item, _, _) = name_age_item();
        let mut group = FieldGroup::with_item(item);
        group.bind(ValueField::shared("name"), "name").unwrap();
        assert_eq!(group.unbound_property_ids(), vec!["age".to_string()]);
    }

    #[test]
    fn test_read_only_source_forces_read_only_field() {
        let ro = Rc::new(RefCell::new(ObjectProperty::new("fixed").read_only(true)));
        let item = PropertyItem::new().with("code", ro as PropertyRef);
        let mut group = FieldGroup::with_item(Box::new(item));
        let field = ValueField::shared("code");
        group.bind(field.clone(), "code").unwrap();
        assert!(field.borrow().is_read_only());
    }
}
