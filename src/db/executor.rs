//! Statement execution.
//!
//! Two entry points: [`fetch_all`] for statements that return rows and
//! [`execute`] for statements that do not. Every call is a single awaited
//! round-trip on the pool's one connection; rows come back as JSON records
//! decoded per backend.

use crate::db::pool::DbPool;
use crate::db::types::RowToRecord;
use crate::error::{DbError, DbResult};
use crate::models::Record;
use tracing::debug;

/// Outcome of a non-returning statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    /// Auto-generated key of the last inserted row, 0 when the backend
    /// reports none.
    pub last_insert_id: i64,
}

/// Run a row-returning statement and decode every row to a [`Record`].
pub async fn fetch_all(pool: &DbPool, sql: &str) -> DbResult<Vec<Record>> {
    debug!(sql = %sql, "Executing query");

    match pool {
        DbPool::MySql(pool) => {
            let rows = sqlx::query(sql)
                .fetch_all(pool)
                .await
                .map_err(|e| DbError::from_sqlx(e, sql))?;
            Ok(rows.iter().map(RowToRecord::to_record).collect())
        }
        DbPool::Sqlite(pool) => {
            let rows = sqlx::query(sql)
                .fetch_all(pool)
                .await
                .map_err(|e| DbError::from_sqlx(e, sql))?;
            Ok(rows.iter().map(RowToRecord::to_record).collect())
        }
    }
}

/// Run a non-returning statement and report affected rows and the last
/// generated key.
pub async fn execute(pool: &DbPool, sql: &str) -> DbResult<ExecOutcome> {
    debug!(sql = %sql, "Executing statement");

    match pool {
        DbPool::MySql(pool) => {
            let result = sqlx::query(sql)
                .execute(pool)
                .await
                .map_err(|e| DbError::from_sqlx(e, sql))?;
            Ok(ExecOutcome {
                rows_affected: result.rows_affected(),
                last_insert_id: result.last_insert_id() as i64,
            })
        }
        DbPool::Sqlite(pool) => {
            let result = sqlx::query(sql)
                .execute(pool)
                .await
                .map_err(|e| DbError::from_sqlx(e, sql))?;
            Ok(ExecOutcome {
                rows_affected: result.rows_affected(),
                last_insert_id: result.last_insert_rowid(),
            })
        }
    }
}
