//! Error types for the database system
//!
//! This module defines all error types that can occur during facade operations.
//! Driver failures raised while a statement (or a transaction boundary) runs are
//! wrapped into a [`QueryError`] that keeps the statement text and the sanitized
//! arguments next to the original driver error.

use super::sanitize::sanitize_args;
use super::transaction::IsolationLevel;
use super::value::DatabaseValue;
use serde::Serialize;
use std::error::Error as StdError;

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Boxed driver error carried as the cause of a [`QueryError`]
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Error types for database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Driver identifier not recognised
    #[error("unsupported driver: {0}")]
    UnsupportedDriver(String),

    /// DSN could not be built or parsed
    #[error("invalid dsn: {0}")]
    InvalidDsn(String),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// Isolation level the backend cannot express
    #[error("unsupported isolation level: {0}")]
    UnsupportedIsolationLevel(IsolationLevel),

    /// Statement or transaction boundary failed in the driver
    #[error(transparent)]
    Query(#[from] QueryError),

    /// `begin_tx` called on an open transaction
    #[error("no nested transaction")]
    NestedTransaction,

    /// Statement issued on a transaction that was already committed or rolled back
    #[error("transaction already committed or rolled back")]
    TransactionDone,

    /// Query returned no rows where one was required
    #[error("no rows in result set")]
    NoRows,

    /// Scan called before `advance` or after the cursor is exhausted
    #[error("no current row")]
    NoCurrentRow,

    /// Column not found
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// Scan destination has a different arity than the row
    #[error("column count mismatch: expected {expected}, got {actual}")]
    ColumnCount { expected: usize, actual: usize },

    /// Type conversion error
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Backend replied with something the protocol does not allow
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// MySQL error outside of a statement (ping, close)
    #[cfg(feature = "mysql")]
    #[error(transparent)]
    Mysql(#[from] mysql_async::Error),

    /// PostgreSQL error outside of a statement (ping, connect)
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),

    /// PostgreSQL pool checkout error outside of a statement
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresPool(#[from] deadpool_postgres::PoolError),

    /// Redis error
    #[cfg(feature = "redis_support")]
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file is not valid YAML
    #[error("failed to parse YAML settings: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Settings file is not valid JSON
    #[error("failed to parse JSON settings: {0}")]
    Json(#[from] serde_json::Error),
}

impl DatabaseError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Config(msg.into())
    }

    /// Create an invalid DSN error
    pub fn invalid_dsn<S: Into<String>>(msg: S) -> Self {
        DatabaseError::InvalidDsn(msg.into())
    }

    /// Create a new type mismatch error
    pub fn type_mismatch(expected: &str, actual: &str) -> Self {
        DatabaseError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Wrap a driver error raised while running `query`
    pub fn query<E: Into<BoxError>>(query: &str, args: &[DatabaseValue], cause: E) -> Self {
        DatabaseError::Query(QueryError::new(query, args, cause))
    }

    /// Wrap a driver error raised at a transaction boundary
    pub fn lifecycle<E: Into<BoxError>>(cause: E) -> Self {
        DatabaseError::Query(QueryError::lifecycle(cause))
    }

    /// Borrow the wrapped [`QueryError`], if any
    pub fn as_query_error(&self) -> Option<&QueryError> {
        match self {
            DatabaseError::Query(e) => Some(e),
            _ => None,
        }
    }

    /// Whether this is the pass-through "no rows" condition
    pub fn is_no_rows(&self) -> bool {
        matches!(self, DatabaseError::NoRows)
    }
}

/// Driver error enriched with the statement that caused it
///
/// `Display` is the driver's own message, and [`StdError::source`] returns the
/// driver error unchanged, so callers can downcast it. The statement text and
/// sanitized arguments serialize as the `sql` and `args` fields.
#[derive(Debug, Serialize)]
pub struct QueryError {
    #[serde(rename = "sql")]
    query: String,
    args: Vec<DatabaseValue>,
    #[serde(skip)]
    cause: Option<BoxError>,
}

impl QueryError {
    /// Wrap `cause` with the statement text and a sanitized copy of `args`
    pub fn new<E: Into<BoxError>>(query: &str, args: &[DatabaseValue], cause: E) -> Self {
        Self {
            query: query.to_string(),
            args: sanitize_args(args),
            cause: Some(cause.into()),
        }
    }

    /// Wrap `cause` without statement context (begin, commit, rollback)
    pub fn lifecycle<E: Into<BoxError>>(cause: E) -> Self {
        Self {
            query: String::new(),
            args: Vec::new(),
            cause: Some(cause.into()),
        }
    }

    /// An error with no underlying cause
    pub fn empty(query: &str, args: &[DatabaseValue]) -> Self {
        Self {
            query: query.to_string(),
            args: sanitize_args(args),
            cause: None,
        }
    }

    /// Statement text, empty for transaction boundaries
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Sanitized statement arguments
    pub fn args(&self) -> &[DatabaseValue] {
        &self.args
    }

    /// The driver error
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Take the driver error out
    pub fn into_cause(self) -> Option<BoxError> {
        self.cause
    }
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}", cause),
            None => write!(f, "sql db error"),
        }
    }
}

impl StdError for QueryError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sanitize::{SANITIZED_SUFFIX, SANITIZE_STRING_LENGTH};

    #[derive(Debug, thiserror::Error)]
    #[error("duplicate key value")]
    struct DriverFailure;

    #[test]
    fn test_error_creation() {
        let err = DatabaseError::config("max_conn must be at least 1");
        assert!(matches!(err, DatabaseError::Config(_)));

        let err = DatabaseError::type_mismatch("i32", "string");
        assert!(matches!(err, DatabaseError::TypeMismatch { .. }));

        let err = DatabaseError::query("SELECT 1", &[], DriverFailure);
        assert!(err.as_query_error().is_some());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            DatabaseError::NestedTransaction.to_string(),
            "no nested transaction"
        );
        assert_eq!(
            DatabaseError::type_mismatch("i64", "double").to_string(),
            "type mismatch: expected i64, got double"
        );
        assert_eq!(
            DatabaseError::TransactionDone.to_string(),
            "transaction already committed or rolled back"
        );
        assert_eq!(
            DatabaseError::UnsupportedIsolationLevel(IsolationLevel::Snapshot).to_string(),
            "unsupported isolation level: Snapshot"
        );
    }

    #[test]
    fn test_query_error_displays_cause() {
        let err = QueryError::new("INSERT INTO t VALUES (?)", &[1.into()], DriverFailure);
        assert_eq!(err.to_string(), "duplicate key value");

        let err = QueryError::empty("SELECT 1", &[]);
        assert_eq!(err.to_string(), "sql db error");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_query_error_source_is_driver_error() {
        let err = DatabaseError::query("SELECT 1", &[], DriverFailure);
        let source = err.source().expect("driver error");
        assert!(source.downcast_ref::<DriverFailure>().is_some());

        let cause = err
            .as_query_error()
            .and_then(|e| e.cause())
            .expect("driver error");
        assert!(cause.downcast_ref::<DriverFailure>().is_some());
    }

    #[test]
    fn test_query_error_sanitizes_args() {
        let long = "x".repeat(200);
        let err = QueryError::new(
            "UPDATE t SET body = ? WHERE id = ?",
            &[long.as_str().into(), 7.into()],
            DriverFailure,
        );
        let expected = format!("{}{}", "x".repeat(SANITIZE_STRING_LENGTH), SANITIZED_SUFFIX);
        assert_eq!(err.args()[0], DatabaseValue::String(expected));
        assert_eq!(err.args()[1], DatabaseValue::Int(7));
    }

    #[test]
    fn test_query_error_serializes_log_fields() {
        let err = QueryError::new("SELECT * FROM t WHERE id = ?", &[42i64.into()], DriverFailure);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["sql"], "SELECT * FROM t WHERE id = ?");
        assert_eq!(json["args"][0]["Long"], 42);
        assert!(json.get("cause").is_none());
    }

    #[test]
    fn test_lifecycle_error_has_no_query_context() {
        let err = QueryError::lifecycle(DriverFailure);
        assert_eq!(err.query(), "");
        assert!(err.args().is_empty());
        assert_eq!(err.to_string(), "duplicate key value");
    }

    #[test]
    fn test_no_rows_is_not_wrapped() {
        let err = DatabaseError::NoRows;
        assert!(err.is_no_rows());
        assert!(err.as_query_error().is_none());
    }
}
