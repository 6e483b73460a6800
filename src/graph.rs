//! Foreign-key relationship graph.
//!
//! Maps a referenced (table, column) pair to the ordered set of (table,
//! column) pairs that reference it, discovered once per connection from
//! constraint metadata. The graph only stores the referenced→referrers
//! direction; upward lookups scan the value sets, which stays cheap because
//! constraint counts are small. Cycles are allowed here — termination over
//! cyclic schemas is the traversal's job, not the graph's.

use crate::db::pool::DbPool;
use crate::error::{DbError, DbResult};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// One side of a foreign-key constraint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ColumnKey {
    pub table: String,
    pub column: String,
}

impl ColumnKey {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl std::fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Referenced column → columns referencing it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RelationshipGraph {
    edges: BTreeMap<ColumnKey, Vec<ColumnKey>>,
}

impl RelationshipGraph {
    /// Discover the graph from constraint metadata. `tables` is the
    /// connection's (possibly filtered) table list; SQLite has no global
    /// constraint listing, so discovery walks it table by table.
    pub async fn build(pool: &DbPool, tables: &[String]) -> DbResult<Self> {
        let graph = match pool {
            DbPool::MySql(pool) => mysql::build(pool).await?,
            DbPool::Sqlite(pool) => sqlite::build(pool, tables).await?,
        };
        debug!(
            referenced_columns = graph.edges.len(),
            "Built relationship graph"
        );
        Ok(graph)
    }

    /// Record that `referrer` holds a foreign key to `referenced`.
    /// Duplicate constraints collapse; first-seen order is kept.
    pub fn insert(&mut self, referenced: ColumnKey, referrer: ColumnKey) {
        let referrers = self.edges.entry(referenced).or_default();
        if !referrers.contains(&referrer) {
            referrers.push(referrer);
        }
    }

    /// Columns referencing the given (table, column); empty when none are
    /// known.
    pub fn referrers_of(&self, table: &str, column: &str) -> &[ColumnKey] {
        let key = ColumnKey::new(table, column);
        self.edges.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Referenced columns whose referrer set contains the given (table,
    /// column): the upward direction, found by scanning the value sets.
    pub fn referenced_by(&self, table: &str, column: &str) -> Vec<&ColumnKey> {
        self.edges
            .iter()
            .filter(|(_, referrers)| {
                referrers
                    .iter()
                    .any(|r| r.table == table && r.column == column)
            })
            .map(|(referenced, _)| referenced)
            .collect()
    }

    /// All (referenced, referrers) entries in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (&ColumnKey, &[ColumnKey])> {
        self.edges.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

// =============================================================================
// Backend Discovery
// =============================================================================

mod mysql {
    use super::*;
    use sqlx::{MySqlPool, Row};

    const LIST_FOREIGN_KEYS: &str = r#"
        SELECT TABLE_NAME, COLUMN_NAME, REFERENCED_TABLE_NAME, REFERENCED_COLUMN_NAME
        FROM information_schema.KEY_COLUMN_USAGE
        WHERE TABLE_SCHEMA = DATABASE()
          AND REFERENCED_TABLE_NAME IS NOT NULL
        ORDER BY TABLE_NAME, ORDINAL_POSITION
    "#;

    pub async fn build(pool: &MySqlPool) -> DbResult<RelationshipGraph> {
        let rows = sqlx::query(LIST_FOREIGN_KEYS)
            .fetch_all(pool)
            .await
            .map_err(|e| DbError::from_sqlx(e, LIST_FOREIGN_KEYS))?;

        let mut graph = RelationshipGraph::default();
        for row in &rows {
            let table: String = row.get("TABLE_NAME");
            let column: String = row.get("COLUMN_NAME");
            let ref_table: String = row.get("REFERENCED_TABLE_NAME");
            let ref_column: String = row.get("REFERENCED_COLUMN_NAME");
            graph.insert(
                ColumnKey::new(ref_table, ref_column),
                ColumnKey::new(table, column),
            );
        }
        Ok(graph)
    }
}

mod sqlite {
    use super::*;
    use sqlx::{Row, SqlitePool};

    pub async fn build(pool: &SqlitePool, tables: &[String]) -> DbResult<RelationshipGraph> {
        let mut graph = RelationshipGraph::default();

        for table in tables {
            let sql = format!("PRAGMA foreign_key_list('{}')", table.replace('\'', "''"));
            let rows = sqlx::query(&sql)
                .fetch_all(pool)
                .await
                .map_err(|e| DbError::from_sqlx(e, &sql))?;

            for row in &rows {
                let ref_table: String = row.get("table");
                let from: String = row.get("from");
                // "to" is NULL when the constraint names only the parent
                // table; such implicit-key references are skipped
                let to: Option<String> = row.get("to");
                if let Some(ref_column) = to {
                    graph.insert(
                        ColumnKey::new(ref_table, ref_column),
                        ColumnKey::new(table.clone(), from),
                    );
                }
            }
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> RelationshipGraph {
        let mut graph = RelationshipGraph::default();
        graph.insert(
            ColumnKey::new("node", "nid"),
            ColumnKey::new("comments", "nid"),
        );
        graph.insert(
            ColumnKey::new("node", "nid"),
            ColumnKey::new("node_revisions", "nid"),
        );
        graph.insert(
            ColumnKey::new("users", "uid"),
            ColumnKey::new("node", "uid"),
        );
        graph
    }

    #[test]
    fn test_referrers_preserve_order_and_dedup() {
        let mut graph = sample_graph();
        graph.insert(
            ColumnKey::new("node", "nid"),
            ColumnKey::new("comments", "nid"),
        );

        let referrers = graph.referrers_of("node", "nid");
        assert_eq!(referrers.len(), 2);
        assert_eq!(referrers[0], ColumnKey::new("comments", "nid"));
        assert_eq!(referrers[1], ColumnKey::new("node_revisions", "nid"));
    }

    #[test]
    fn test_absent_key_means_no_referrers() {
        let graph = sample_graph();
        assert!(graph.referrers_of("node", "title").is_empty());
        assert!(graph.referrers_of("ghosts", "id").is_empty());
    }

    #[test]
    fn test_upward_lookup_scans_values() {
        let graph = sample_graph();
        let referenced = graph.referenced_by("node", "uid");
        assert_eq!(referenced, vec![&ColumnKey::new("users", "uid")]);
        assert!(graph.referenced_by("node", "title").is_empty());
    }

    #[test]
    fn test_cycles_are_representable() {
        let mut graph = RelationshipGraph::default();
        graph.insert(ColumnKey::new("a", "id"), ColumnKey::new("b", "a_id"));
        graph.insert(ColumnKey::new("b", "id"), ColumnKey::new("a", "b_id"));
        assert_eq!(graph.referrers_of("a", "id").len(), 1);
        assert_eq!(graph.referrers_of("b", "id").len(), 1);
    }
}
