//! Dynamic schema access layer.
//!
//! Introspects a relational database's tables, columns, and foreign-key
//! constraints at runtime, exposes a nested condition DSL compiled to SQL
//! fragments, and can recursively expand a result set across the
//! foreign-key graph into nested records (cycle-safe). Supports MySQL and
//! SQLite.

pub mod catalog;
pub mod condition;
pub mod connection;
pub mod db;
pub mod error;
mod fetch;
pub mod graph;
pub mod models;
pub mod table;
pub mod value;

pub use catalog::TableFilter;
pub use condition::{CondValue, Condition, ConditionMap};
pub use connection::Connection;
pub use db::{Backend, ExecOutcome};
pub use error::{DbError, DbResult};
pub use graph::{ColumnKey, RelationshipGraph};
pub use models::{ColumnDescriptor, Record, TableDescriptor};
pub use table::Table;
