//! Core database system types and traits
//!
//! This module provides the backend-independent building blocks: the
//! connection and transaction contracts, configuration, values and rows,
//! errors, argument sanitization and query logging.

pub mod config;
pub mod database;
pub mod database_types;
pub mod error;
pub mod logging;
pub mod rows;
pub mod sanitize;
pub mod transaction;
pub mod value;

// Re-export commonly used types
pub use config::{CacheConfig, DbConfig, Settings, DEFAULT_MAX_CONN};
pub use database::{open, open_with_span, transaction, SqlDb, SqlTx};
pub use database_types::Driver;
pub use error::{DatabaseError, QueryError, Result};
pub use logging::{init_tracing, LogFormat, LoggingConfig, QueryLogger};
pub use rows::{ExecResult, FromRow, Rows};
pub use sanitize::{sanitize_args, sanitize_value, SANITIZED_SUFFIX};
pub use transaction::{AccessMode, DeferrableMode, IsolationLevel, TxOptions};
pub use value::{DatabaseRow, DatabaseValue, FromValue};
