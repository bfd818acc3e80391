//! SQL statement generation for sqlbind.
//!
//! This crate turns declarative descriptors from `sqlbind-core` into
//! parameterized SQL:
//!
//! - [`Statement`] - generated SQL text plus ordered bind values
//! - [`Dialect`] - placeholder and quoting differences between databases
//! - [`SqlGenerator`] / [`DefaultSqlGenerator`] - the generation strategy

pub mod dialect;
pub mod generator;
pub mod statement;

pub use dialect::Dialect;
pub use generator::{DefaultSqlGenerator, SqlGenerator};
pub use statement::Statement;
