//! Error types for the schema access layer.
//!
//! All fallible operations return [`DbResult`]. The taxonomy is small on
//! purpose: connection-level failures, name lookups and empty-match reads,
//! statements the backend rejected, and caller mistakes caught before a
//! statement is ever sent.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// The backend could not be reached or the database could not be selected.
    #[error("connection failed: {message}")]
    Connection { message: String, suggestion: String },

    /// An unknown table/column name, or a selector that matched zero rows
    /// where at least one was required.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// The backend rejected or failed a statement. Carries the backend's
    /// error text and the offending statement.
    #[error("query failed: {message} (statement: {statement})")]
    Query { message: String, statement: String },

    /// A malformed request caught before reaching the backend: a missing or
    /// empty selector on update/delete, a non-scalar value handed to the
    /// value preparer, an ambiguous condition expression.
    #[error("validation failed: {message}")]
    Validation { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a query error carrying the offending statement.
    pub fn query(message: impl Into<String>, statement: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            statement: statement.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Wrap a sqlx error together with the statement that produced it.
    pub(crate) fn from_sqlx(err: sqlx::Error, statement: &str) -> Self {
        match err {
            sqlx::Error::RowNotFound => {
                DbError::not_found(format!("no rows returned by: {statement}"))
            }
            sqlx::Error::Database(db_err) => DbError::query(db_err.message(), statement),
            other => DbError::query(other.to_string(), statement),
        }
    }
}

/// Convert sqlx errors raised outside statement execution (connect paths,
/// pool handling) to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {io_err}"),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {tls_err}"),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::PoolClosed => {
                DbError::connection("connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Database(db_err) => DbError::connection(
                db_err.message().to_string(),
                "Verify the database name and the account's privileges",
            ),
            other => DbError::connection(
                other.to_string(),
                "Check the connection string and server status",
            ),
        }
    }
}

/// Result type alias for schema access operations.
pub type DbResult<T> = Result<T, DbError>;
