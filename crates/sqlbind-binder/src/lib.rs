//! Buffered field-to-property binding for sqlbind.
//!
//! This crate binds editable UI fields to data-source properties with
//! buffered commit/rollback semantics:
//!
//! - [`Property`] / [`Item`] - the data-source contracts
//! - [`Field`] / [`ValueField`] - the editable-widget contract
//! - [`TransactionalProperty`] - staged writes with an independent
//!   transaction per bound property
//! - [`FieldGroup`] - binds fields to an item and commits all of them
//!   atomically, with pre/post commit handlers

pub mod field;
pub mod group;
pub mod property;
pub mod transactional;

pub use field::{Field, FieldRef, ValueField};
pub use group::{
    BindError, CommitError, CommitEvent, CommitHandler, FieldGroup, HandlerId,
};
pub use property::{Item, ObjectProperty, Property, PropertyItem, PropertyRef};
pub use transactional::TransactionalProperty;
