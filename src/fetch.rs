//! Dependency-aware fetch: recursive expansion across the relationship
//! graph.
//!
//! Given a base result set, attach under each row the related rows from
//! every table that references, or is referenced by, the current table's
//! columns. Traversal state is an `originator` (the table the walk started
//! from) and a `trail` (tables already visited in this branch). The trail
//! grows by one table per recursive call and no table is revisited within a
//! branch, so the walk terminates on any finite schema, cycles included.
//! Only the first path to a related table within a branch is expanded;
//! later paths find it on the trail and are dropped.
//!
//! # Architecture
//!
//! Each relationship decision happens once per (column, related table):
//! the related table joins the current branch's trail *before* the per-row
//! recursion, so sibling columns of the same invocation skip it too.
//! Expansion is strictly depth-first, one query per related table per row
//! per level; errors at any depth abort the whole expansion.

use crate::condition::{CondValue, Condition};
use crate::connection::Connection;
use crate::error::DbResult;
use crate::graph::ColumnKey;
use crate::models::{Record, record};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value as JsonValue;
use tracing::debug;

/// Expand a base result set fetched from `table`.
pub(crate) async fn expand_rows(
    conn: &Connection,
    table: &str,
    rows: Vec<Record>,
) -> DbResult<Vec<Record>> {
    expand(conn, table.to_string(), rows, table.to_string(), Vec::new()).await
}

/// One level of expansion. Boxed because async recursion needs an
/// indirection through a heap-allocated future.
fn expand(
    conn: &Connection,
    table: String,
    mut rows: Vec<Record>,
    originator: String,
    mut trail: Vec<String>,
) -> BoxFuture<'_, DbResult<Vec<Record>>> {
    async move {
        if rows.is_empty() {
            return Ok(rows);
        }

        trail.push(table.clone());
        let descriptor = conn.descriptor(&table).await?;

        for column in &descriptor.columns {
            // Downward: tables holding a foreign key into this column
            let referrers: Vec<ColumnKey> =
                conn.graph().referrers_of(&table, &column.name).to_vec();
            for referrer in referrers {
                if skip(&referrer.table, &originator, &trail, conn) {
                    continue;
                }
                debug!(
                    from = %format!("{table}.{}", column.name),
                    to = %referrer,
                    "Expanding dependent rows"
                );
                trail.push(referrer.table.clone());
                attach(conn, &mut rows, &column.name, &referrer, &originator, &trail).await?;
            }

            // Upward: tables this column holds a foreign key into
            let providers: Vec<ColumnKey> = conn
                .graph()
                .referenced_by(&table, &column.name)
                .into_iter()
                .cloned()
                .collect();
            for provider in providers {
                if skip(&provider.table, &originator, &trail, conn) {
                    continue;
                }
                debug!(
                    from = %format!("{table}.{}", column.name),
                    to = %provider,
                    "Expanding provider rows"
                );
                trail.push(provider.table.clone());
                attach(conn, &mut rows, &column.name, &provider, &originator, &trail).await?;
            }
        }

        Ok(rows)
    }
    .boxed()
}

/// Whether a related table is outside this branch's reach: the walk never
/// returns to its origin, never revisits a trailed table, and ignores
/// tables the connection's filter excluded from the catalog.
fn skip(related_table: &str, originator: &str, trail: &[String], conn: &Connection) -> bool {
    related_table == originator
        || trail.iter().any(|t| t == related_table)
        || !conn.has_table(related_table)
}

/// Fetch and nest related rows under every row of the current set, keyed by
/// the related table's name. Rows whose linking value is null stay bare.
async fn attach(
    conn: &Connection,
    rows: &mut [Record],
    local_column: &str,
    related: &ColumnKey,
    originator: &str,
    trail: &[String],
) -> DbResult<()> {
    for row in rows.iter_mut() {
        let value = record::field(row, local_column);
        if value.is_null() {
            continue;
        }

        let selector = Condition::Where(vec![(
            related.column.clone(),
            CondValue::from_json(value)?,
        )]);
        let fetched = conn
            .table(&related.table)
            .await?
            .select(Some(&selector))
            .await?;
        let nested = expand(
            conn,
            related.table.clone(),
            fetched,
            originator.to_string(),
            trail.to_vec(),
        )
        .await?;

        row.insert(
            related.table.clone(),
            JsonValue::Array(nested.into_iter().map(JsonValue::Object).collect()),
        );
    }
    Ok(())
}
