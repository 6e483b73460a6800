//! Data models shared across the access layer.

pub mod record;
pub mod schema;

pub use record::Record;
pub use schema::{ColumnDescriptor, TableDescriptor};
