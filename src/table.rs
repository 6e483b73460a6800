//! Per-table accessor: the CRUD surface.
//!
//! A [`Table`] is created by [`Connection::table`](crate::connection::Connection::table)
//! and scoped to one introspected table. Reads compile a [`Condition`] into
//! a statement fragment; writes prepare every field through the value
//! preparer, dropping fields that name no known column. Mutations that
//! change zero rows fail with `NotFound` so callers can tell "nothing
//! matched" from "matched and changed".

use crate::condition::{self, CompiledCondition, Condition};
use crate::connection::Connection;
use crate::db::executor;
use crate::db::pool::Backend;
use crate::error::{DbError, DbResult};
use crate::fetch;
use crate::models::{Record, TableDescriptor};
use crate::value::prepare_value;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;

pub struct Table<'c> {
    conn: &'c Connection,
    descriptor: Arc<TableDescriptor>,
}

impl<'c> Table<'c> {
    pub(crate) fn new(conn: &'c Connection, descriptor: Arc<TableDescriptor>) -> Self {
        Self { conn, descriptor }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.descriptor.column_names()
    }

    /// Referrer sets for every column of this table that other tables hold
    /// a foreign key into.
    pub fn relationships(&self) -> Vec<(&str, &[crate::graph::ColumnKey])> {
        self.descriptor
            .columns
            .iter()
            .map(|c| {
                (
                    c.name.as_str(),
                    self.conn.graph().referrers_of(&self.descriptor.name, &c.name),
                )
            })
            .filter(|(_, referrers)| !referrers.is_empty())
            .collect()
    }

    fn backend(&self) -> Backend {
        self.conn.backend()
    }

    fn compile(&self, condition: Option<&Condition>) -> DbResult<CompiledCondition> {
        match condition {
            Some(cond) => condition::compile(
                cond,
                self.descriptor.primary_key.as_deref(),
                self.backend(),
            ),
            None => Ok(CompiledCondition::default()),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetch rows matching the condition; no condition means all rows.
    pub async fn select(&self, condition: Option<&Condition>) -> DbResult<Vec<Record>> {
        let compiled = self.compile(condition)?;
        let sql = format!(
            "SELECT * FROM `{}`{}",
            self.descriptor.name,
            compiled.fragment()
        );
        executor::fetch_all(self.conn.pool(), &sql).await
    }

    /// Fetch rows and recursively attach related rows from every table the
    /// relationship graph links to this one.
    pub async fn select_expanded(&self, condition: Option<&Condition>) -> DbResult<Vec<Record>> {
        let rows = self.select(condition).await?;
        fetch::expand_rows(self.conn, &self.descriptor.name, rows).await
    }

    /// Fetch the first matching row; `NotFound` when nothing matches.
    pub async fn select_one(&self, condition: Option<&Condition>) -> DbResult<Record> {
        let mut compiled = self.compile(condition)?;
        compiled.limit = Some("1".to_string());
        let sql = format!(
            "SELECT * FROM `{}`{}",
            self.descriptor.name,
            compiled.fragment()
        );
        let mut rows = executor::fetch_all(self.conn.pool(), &sql).await?;
        if rows.is_empty() {
            return Err(DbError::not_found(format!(
                "no row in `{}` matched the selector",
                self.descriptor.name
            )));
        }
        Ok(rows.swap_remove(0))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert one record, returning the backend-generated key (0 when the
    /// table has no auto-increment key). Fields naming no known column are
    /// dropped.
    pub async fn insert(&self, record: &Record) -> DbResult<i64> {
        let prepared = self.prepare_record(record)?;
        let columns: Vec<String> = prepared.iter().map(|(f, _)| format!("`{f}`")).collect();
        let values: Vec<&str> = prepared.iter().map(|(_, v)| v.as_str()).collect();
        let sql = format!(
            "INSERT INTO `{}` ({}) VALUES ({})",
            self.descriptor.name,
            columns.join(", "),
            values.join(", ")
        );

        let outcome = executor::execute(self.conn.pool(), &sql).await?;
        debug!(
            table = %self.descriptor.name,
            id = outcome.last_insert_id,
            "Inserted row"
        );
        Ok(outcome.last_insert_id)
    }

    /// Update matching rows, returning how many changed. Fails with
    /// `Validation` when the selector compiles to no clauses, and with
    /// `NotFound` when zero rows changed.
    pub async fn update(&self, selector: &Condition, record: &Record) -> DbResult<u64> {
        let compiled = self.require_selector(selector)?;
        let prepared = self.prepare_record(record)?;
        let assignments: Vec<String> = prepared
            .iter()
            .map(|(f, v)| format!("`{f}` = {v}"))
            .collect();
        let sql = format!(
            "UPDATE `{}` SET {}{}",
            self.descriptor.name,
            assignments.join(", "),
            compiled.fragment()
        );

        let outcome = executor::execute(self.conn.pool(), &sql).await?;
        if outcome.rows_affected == 0 {
            return Err(DbError::not_found(format!(
                "update matched no rows in `{}`",
                self.descriptor.name
            )));
        }
        debug!(
            table = %self.descriptor.name,
            rows = outcome.rows_affected,
            "Updated rows"
        );
        Ok(outcome.rows_affected)
    }

    /// Insert the record, or update every non-key field in place when the
    /// key already exists.
    pub async fn upsert(&self, record: &Record) -> DbResult<u64> {
        let prepared = self.prepare_record(record)?;
        let columns: Vec<String> = prepared.iter().map(|(f, _)| format!("`{f}`")).collect();
        let values: Vec<&str> = prepared.iter().map(|(_, v)| v.as_str()).collect();

        let pk = self.descriptor.primary_key.as_deref();
        let assignments: Vec<String> = prepared
            .iter()
            .filter(|(f, _)| Some(f.as_str()) != pk)
            .map(|(f, v)| format!("`{f}` = {v}"))
            .collect();

        let sql = match self.backend() {
            Backend::MySql => {
                // A key-only record still needs one assignment for the
                // ON DUPLICATE clause; a self-assignment is a no-op
                let update = if assignments.is_empty() {
                    let pk = pk.ok_or_else(|| {
                        DbError::validation("upsert needs a non-key field or a primary key")
                    })?;
                    format!("`{pk}` = `{pk}`")
                } else {
                    assignments.join(", ")
                };
                format!(
                    "INSERT INTO `{}` ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {}",
                    self.descriptor.name,
                    columns.join(", "),
                    values.join(", "),
                    update
                )
            }
            Backend::Sqlite => {
                let pk = pk.ok_or_else(|| {
                    DbError::validation(format!(
                        "upsert on `{}` requires a primary key",
                        self.descriptor.name
                    ))
                })?;
                let action = if assignments.is_empty() {
                    "DO NOTHING".to_string()
                } else {
                    format!("DO UPDATE SET {}", assignments.join(", "))
                };
                format!(
                    "INSERT INTO `{}` ({}) VALUES ({}) ON CONFLICT(`{pk}`) {}",
                    self.descriptor.name,
                    columns.join(", "),
                    values.join(", "),
                    action
                )
            }
        };

        let outcome = executor::execute(self.conn.pool(), &sql).await?;
        debug!(
            table = %self.descriptor.name,
            rows = outcome.rows_affected,
            "Upserted row"
        );
        Ok(outcome.rows_affected)
    }

    /// Delete matching rows; selector rules as in [`Table::update`].
    pub async fn delete(&self, selector: &Condition) -> DbResult<u64> {
        let compiled = self.require_selector(selector)?;
        let sql = format!(
            "DELETE FROM `{}`{}",
            self.descriptor.name,
            compiled.fragment()
        );

        let outcome = executor::execute(self.conn.pool(), &sql).await?;
        if outcome.rows_affected == 0 {
            return Err(DbError::not_found(format!(
                "delete matched no rows in `{}`",
                self.descriptor.name
            )));
        }
        debug!(
            table = %self.descriptor.name,
            rows = outcome.rows_affected,
            "Deleted rows"
        );
        Ok(outcome.rows_affected)
    }

    // =========================================================================
    // Single-Column Reads
    // =========================================================================

    /// Values of one column across matching rows.
    pub async fn column_values(
        &self,
        column: &str,
        condition: Option<&Condition>,
    ) -> DbResult<Vec<JsonValue>> {
        self.fetch_column(column, condition, false).await
    }

    /// Distinct values of one column across matching rows.
    pub async fn distinct_values(
        &self,
        column: &str,
        condition: Option<&Condition>,
    ) -> DbResult<Vec<JsonValue>> {
        self.fetch_column(column, condition, true).await
    }

    /// First matching value of one column; `NotFound` when nothing matches.
    pub async fn column_value(
        &self,
        column: &str,
        condition: Option<&Condition>,
    ) -> DbResult<JsonValue> {
        let mut values = self.fetch_column(column, condition, false).await?;
        if values.is_empty() {
            return Err(DbError::not_found(format!(
                "no value for `{}`.`{column}` matched the selector",
                self.descriptor.name
            )));
        }
        Ok(values.swap_remove(0))
    }

    async fn fetch_column(
        &self,
        column: &str,
        condition: Option<&Condition>,
        distinct: bool,
    ) -> DbResult<Vec<JsonValue>> {
        if !self.descriptor.has_column(column) {
            return Err(DbError::not_found(format!(
                "column `{column}` in table `{}`",
                self.descriptor.name
            )));
        }

        let compiled = self.compile(condition)?;
        let sql = format!(
            "SELECT {}`{column}` FROM `{}`{}",
            if distinct { "DISTINCT " } else { "" },
            self.descriptor.name,
            compiled.fragment()
        );
        let rows = executor::fetch_all(self.conn.pool(), &sql).await?;
        Ok(rows
            .into_iter()
            .map(|mut row| row.remove(column).unwrap_or(JsonValue::Null))
            .collect())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Prepare every known field of a record as `(column, literal)` pairs.
    fn prepare_record(&self, record: &Record) -> DbResult<Vec<(String, String)>> {
        let mut prepared = Vec::new();
        for (field, value) in record {
            let Some(column) = self.descriptor.column(field) else {
                debug!(
                    table = %self.descriptor.name,
                    field = %field,
                    "Dropping field naming no known column"
                );
                continue;
            };
            let literal = prepare_value(column.category, self.backend(), value)?;
            prepared.push((field.clone(), literal));
        }
        if prepared.is_empty() {
            return Err(DbError::validation(format!(
                "no field of the record names a column of `{}`",
                self.descriptor.name
            )));
        }
        Ok(prepared)
    }

    /// Compile a mutation selector, rejecting one that filters nothing.
    fn require_selector(&self, selector: &Condition) -> DbResult<CompiledCondition> {
        let compiled = self.compile(Some(selector))?;
        if compiled.clauses.is_empty() {
            return Err(DbError::validation(format!(
                "a mutation on `{}` requires a row selector",
                self.descriptor.name
            )));
        }
        Ok(compiled)
    }
}
