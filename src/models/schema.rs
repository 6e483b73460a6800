//! Schema descriptors.
//!
//! Descriptors are built once per table by introspection, then shared
//! immutably (`Arc<TableDescriptor>`) for the life of the connection.

use crate::db::pool::Backend;
use crate::db::types::{TypeCategory, categorize_type};
use serde::Serialize;

/// A single column of an introspected table.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Full declared type (e.g., `varchar(30)`, `bigint unsigned`)
    pub data_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
    /// Logical category derived from the declared type.
    #[serde(skip)]
    pub category: TypeCategory,
}

impl ColumnDescriptor {
    /// Create a column descriptor, classifying its declared type.
    pub fn new(
        name: impl Into<String>,
        data_type: impl Into<String>,
        nullable: bool,
        backend: Backend,
    ) -> Self {
        let data_type = data_type.into();
        let category = categorize_type(&data_type, backend);
        Self {
            name: name.into(),
            data_type,
            nullable,
            is_primary_key: false,
            category,
        }
    }

    /// Mark this column as part of the primary key.
    pub fn with_primary_key(mut self, is_pk: bool) -> Self {
        self.is_primary_key = is_pk;
        self
    }

    /// Whether values in this column coerce to integers before quoting.
    pub fn is_integer(&self) -> bool {
        self.category == TypeCategory::Integer
    }
}

/// An introspected table: its columns in declaration order and its
/// primary key, if one exists.
#[derive(Debug, Clone, Serialize)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    /// First column flagged primary in declaration order. Composite keys keep
    /// only their leading column; the key-shorthand selector uses it alone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
}

impl TableDescriptor {
    /// Create an empty table descriptor.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
        }
    }

    /// Append a column, recording the first primary-key column seen.
    pub fn with_column(mut self, column: ColumnDescriptor) -> Self {
        if column.is_primary_key && self.primary_key.is_none() {
            self.primary_key = Some(column.name.clone());
        }
        self.columns.push(column);
        self
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether the table has a column with this name.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_key_is_first_flagged_column() {
        let table = TableDescriptor::new("orders")
            .with_column(ColumnDescriptor::new(
                "created",
                "datetime",
                true,
                Backend::MySql,
            ))
            .with_column(
                ColumnDescriptor::new("id", "int unsigned", false, Backend::MySql)
                    .with_primary_key(true),
            )
            .with_column(
                ColumnDescriptor::new("batch", "int", false, Backend::MySql)
                    .with_primary_key(true),
            );

        assert_eq!(table.primary_key.as_deref(), Some("id"));
        assert_eq!(table.column_names(), vec!["created", "id", "batch"]);
    }

    #[test]
    fn test_column_classification() {
        let col = ColumnDescriptor::new("qty", "bigint unsigned", false, Backend::MySql);
        assert!(col.is_integer());
        let col = ColumnDescriptor::new("label", "varchar(80)", true, Backend::MySql);
        assert!(!col.is_integer());
    }

    #[test]
    fn test_column_lookup() {
        let table = TableDescriptor::new("users").with_column(ColumnDescriptor::new(
            "name",
            "text",
            true,
            Backend::Sqlite,
        ));
        assert!(table.has_column("name"));
        assert!(table.column("missing").is_none());
    }
}
