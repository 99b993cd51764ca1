//! # gobit-db
//!
//! A driver-agnostic SQL facade: MySQL and PostgreSQL behind one connection and
//! transaction contract, with uniform transaction options, driver errors
//! wrapped together with the failing statement, and debug-gated query logging
//! that never writes oversized arguments.
//!
//! ## Features
//!
//! - **One contract**: [`SqlDb`] for pools, [`SqlTx`] for transactions
//! - **Uniform transaction options**: [`TxOptions`] translated per backend
//! - **Error wrapping**: [`QueryError`] keeps the statement and sanitized
//!   arguments, and its `source()` is the original driver error
//! - **Query logging**: one `tracing` event per statement on an injected span,
//!   only when `debug` is enabled
//! - **Settings**: YAML or JSON settings file with validation
//!
//! ## Supported Databases
//!
//! | Database | Feature | Driver |
//! |----------|---------|--------|
//! | MySQL | `mysql` (default) | `mysql_async` |
//! | PostgreSQL | `postgres` (default) | `tokio-postgres` + `deadpool-postgres` |
//! | Redis (cache) | `redis_support` | `redis` |
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! gobit-db = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! ### Basic Usage
//!
//! ```rust,no_run
//! use gobit_db::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = DbConfig::new(Driver::Postgres)
//!         .host("localhost")
//!         .user("app")
//!         .password("secret")
//!         .schema("shop")
//!         .debug(true);
//!     let db = gobit_db::open(&config).await?;
//!
//!     db.execute("INSERT INTO users (name) VALUES ($1)", &["Alice".into()])
//!         .await?;
//!
//!     let mut rows = db.query("SELECT id, name FROM users", &[]).await?;
//!     while rows.advance() {
//!         let (id, name): (i64, String) = rows.scan()?;
//!         println!("{}: {}", id, name);
//!     }
//!
//!     db.close().await
//! }
//! ```
//!
//! ### Working with Transactions
//!
//! ```rust,no_run
//! use gobit_db::prelude::*;
//!
//! # async fn run(db: &dyn SqlDb) -> Result<()> {
//! let opts = TxOptions::new().isolation(IsolationLevel::RepeatableRead);
//! let mut tx = db.begin_tx(Some(&opts)).await?;
//!
//! match tx.execute("UPDATE accounts SET balance = balance - 10 WHERE id = $1", &[1.into()]).await {
//!     Ok(_) => tx.commit().await?,
//!     Err(e) => {
//!         tx.rollback().await?;
//!         return Err(e);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Project Structure
//!
//! ```text
//! gobit-db/
//! ├── src/
//! │   ├── core/              # Backend-independent types and traits
//! │   │   ├── database.rs    # SqlDb / SqlTx, open, transaction helper
//! │   │   ├── config.rs      # DbConfig, Settings
//! │   │   ├── error.rs       # DatabaseError, QueryError
//! │   │   ├── logging.rs     # QueryLogger, tracing setup
//! │   │   ├── sanitize.rs    # Argument truncation
//! │   │   ├── transaction.rs # TxOptions
//! │   │   ├── rows.rs        # Rows cursor, ExecResult
//! │   │   └── value.rs       # DatabaseValue, DatabaseRow
//! │   ├── backends/          # mysql, postgres, redis
//! │   └── lib.rs
//! ├── demos/                 # Example programs
//! ├── tests/                 # Integration and property tests
//! └── benches/
//! ```

/// Core database system types and traits
pub mod core;

/// Database backend implementations
pub mod backends;

/// Prelude for convenient imports
///
/// ```rust
/// use gobit_db::prelude::*;
///
/// let opts = TxOptions::new().read_only();
/// assert!(opts.is_read_only());
/// ```
pub mod prelude {
    pub use crate::core::{
        DatabaseError, DatabaseRow, DatabaseValue, DbConfig, Driver, ExecResult, FromRow,
        FromValue, IsolationLevel, QueryError, Result, Rows, SqlDb, SqlTx, TxOptions,
    };

    #[cfg(feature = "redis_support")]
    pub use crate::backends::CacheDb;
}

// Re-export at root level for convenience
pub use crate::core::{
    init_tracing, open, open_with_span, transaction, AccessMode, CacheConfig, DatabaseError,
    DatabaseRow, DatabaseValue, DbConfig, DeferrableMode, Driver, ExecResult, FromRow, FromValue,
    IsolationLevel, LoggingConfig, QueryError, Result, Rows, Settings, SqlDb, SqlTx, TxOptions,
};

#[cfg(feature = "mysql")]
pub use backends::MysqlDatabase;

#[cfg(feature = "postgres")]
pub use backends::PostgresDatabase;

#[cfg(feature = "redis_support")]
pub use backends::{CacheDb, RedisClient};
