//! Schema catalog: table listing and column introspection.
//!
//! The table list is discovered once at connect time, optionally restricted
//! by a [`TableFilter`]. Column descriptors are built lazily, on the first
//! reference to a table, from the backend's introspection surface: MySQL's
//! `information_schema`, SQLite's `sqlite_master` and `PRAGMA table_info`.

use crate::db::pool::DbPool;
use crate::error::{DbError, DbResult};
use crate::models::TableDescriptor;
use tracing::debug;

/// Restriction applied to table discovery at connect time.
#[derive(Debug, Clone)]
pub enum TableFilter {
    /// An exact allow-list of table names.
    Exact(Vec<String>),
    /// A single SQL `LIKE` pattern (`%` wildcards).
    Pattern(String),
}

/// List table names visible through the connection, applying the filter.
pub async fn list_tables(pool: &DbPool, filter: Option<&TableFilter>) -> DbResult<Vec<String>> {
    let tables = match pool {
        DbPool::MySql(pool) => mysql::list_tables(pool, filter).await?,
        DbPool::Sqlite(pool) => sqlite::list_tables(pool, filter).await?,
    };
    debug!(count = tables.len(), "Listed tables");
    Ok(tables)
}

/// Introspect one table's columns and primary key.
///
/// Fails with `NotFound` when the table has no columns, which is how both
/// backends report a name that does not exist.
pub async fn describe_table(pool: &DbPool, table: &str) -> DbResult<TableDescriptor> {
    let descriptor = match pool {
        DbPool::MySql(pool) => mysql::describe_table(pool, table).await?,
        DbPool::Sqlite(pool) => sqlite::describe_table(pool, table).await?,
    };

    if descriptor.columns.is_empty() {
        return Err(DbError::not_found(format!("table `{table}`")));
    }

    debug!(
        table = %table,
        columns = descriptor.columns.len(),
        primary_key = ?descriptor.primary_key,
        "Described table"
    );
    Ok(descriptor)
}

// =============================================================================
// SQL Queries
// =============================================================================

mod queries {
    pub mod mysql {
        pub const LIST_TABLES: &str = r#"
            SELECT TABLE_NAME
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = DATABASE()
              AND TABLE_TYPE = 'BASE TABLE'
        "#;

        pub const DESCRIBE_COLUMNS: &str = r#"
            SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_KEY
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = DATABASE()
              AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;
    }

    pub mod sqlite {
        pub const LIST_TABLES: &str = r#"
            SELECT name
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
        "#;
    }
}

// =============================================================================
// Backend Implementations
// =============================================================================

mod mysql {
    use super::*;
    use crate::db::pool::Backend;
    use crate::models::ColumnDescriptor;
    use sqlx::{MySqlPool, Row};

    pub async fn list_tables(
        pool: &MySqlPool,
        filter: Option<&TableFilter>,
    ) -> DbResult<Vec<String>> {
        let mut sql = queries::mysql::LIST_TABLES.to_string();
        match filter {
            Some(TableFilter::Exact(names)) => {
                let placeholders = vec!["?"; names.len()].join(", ");
                sql.push_str(&format!(" AND TABLE_NAME IN ({placeholders})"));
            }
            Some(TableFilter::Pattern(_)) => {
                sql.push_str(" AND TABLE_NAME LIKE ?");
            }
            None => {}
        }
        sql.push_str(" ORDER BY TABLE_NAME");

        let mut query = sqlx::query(&sql);
        match filter {
            Some(TableFilter::Exact(names)) => {
                for name in names {
                    query = query.bind(name);
                }
            }
            Some(TableFilter::Pattern(pattern)) => {
                query = query.bind(pattern);
            }
            None => {}
        }

        let rows = query
            .fetch_all(pool)
            .await
            .map_err(|e| DbError::from_sqlx(e, &sql))?;
        Ok(rows
            .iter()
            .map(|row| row.get::<String, _>("TABLE_NAME"))
            .collect())
    }

    pub async fn describe_table(pool: &MySqlPool, table: &str) -> DbResult<TableDescriptor> {
        let rows = sqlx::query(queries::mysql::DESCRIBE_COLUMNS)
            .bind(table)
            .fetch_all(pool)
            .await
            .map_err(|e| DbError::from_sqlx(e, queries::mysql::DESCRIBE_COLUMNS))?;

        let mut descriptor = TableDescriptor::new(table);
        for row in &rows {
            let name: String = row.get("COLUMN_NAME");
            let data_type: String = row.get("COLUMN_TYPE");
            let nullable: String = row.get("IS_NULLABLE");
            let column_key: String = row.get("COLUMN_KEY");

            descriptor = descriptor.with_column(
                ColumnDescriptor::new(name, data_type, nullable == "YES", Backend::MySql)
                    .with_primary_key(column_key == "PRI"),
            );
        }
        Ok(descriptor)
    }
}

mod sqlite {
    use super::*;
    use crate::db::pool::Backend;
    use crate::models::ColumnDescriptor;
    use sqlx::{Row, SqlitePool};

    pub async fn list_tables(
        pool: &SqlitePool,
        filter: Option<&TableFilter>,
    ) -> DbResult<Vec<String>> {
        let mut sql = queries::sqlite::LIST_TABLES.to_string();
        match filter {
            Some(TableFilter::Exact(names)) => {
                let placeholders = vec!["?"; names.len()].join(", ");
                sql.push_str(&format!(" AND name IN ({placeholders})"));
            }
            Some(TableFilter::Pattern(_)) => {
                sql.push_str(" AND name LIKE ?");
            }
            None => {}
        }
        sql.push_str(" ORDER BY name");

        let mut query = sqlx::query(&sql);
        match filter {
            Some(TableFilter::Exact(names)) => {
                for name in names {
                    query = query.bind(name);
                }
            }
            Some(TableFilter::Pattern(pattern)) => {
                query = query.bind(pattern);
            }
            None => {}
        }

        let rows = query
            .fetch_all(pool)
            .await
            .map_err(|e| DbError::from_sqlx(e, &sql))?;
        Ok(rows.iter().map(|row| row.get::<String, _>("name")).collect())
    }

    pub async fn describe_table(pool: &SqlitePool, table: &str) -> DbResult<TableDescriptor> {
        // PRAGMA arguments cannot be bound; single quotes in the name are
        // doubled so a hostile table name cannot break out of the literal
        let sql = format!("PRAGMA table_info('{}')", table.replace('\'', "''"));
        let rows = sqlx::query(&sql)
            .fetch_all(pool)
            .await
            .map_err(|e| DbError::from_sqlx(e, &sql))?;

        let mut descriptor = TableDescriptor::new(table);
        for row in &rows {
            let name: String = row.get("name");
            let data_type: String = row.get("type");
            let notnull: i64 = row.get("notnull");
            let pk: i64 = row.get("pk");

            descriptor = descriptor.with_column(
                ColumnDescriptor::new(name, data_type, notnull == 0, Backend::Sqlite)
                    .with_primary_key(pk > 0),
            );
        }
        Ok(descriptor)
    }
}
