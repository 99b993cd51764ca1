//! Driver-agnostic connection and transaction contracts
//!
//! [`SqlDb`] is implemented once per backend and handed out as
//! `Box<dyn SqlDb>` by [`open`], which dispatches on the configured driver
//! name. [`SqlTx`] is the same contract scoped to one transaction.

use super::config::DbConfig;
use super::database_types::Driver;
use super::error::{DatabaseError, Result};
use super::logging::QueryLogger;
use super::rows::{ExecResult, Rows};
use super::transaction::TxOptions;
use super::value::{DatabaseRow, DatabaseValue};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use tracing::Span;

/// A connection pool behind one query and transaction contract
///
/// Safe to share between tasks (`Arc<dyn SqlDb>`); each call checks out its
/// own backend connection.
#[async_trait]
pub trait SqlDb: Send + Sync {
    /// Backend behind this pool
    fn driver(&self) -> Driver;

    /// Execute a statement that returns no rows
    ///
    /// Driver failures are wrapped in [`QueryError`](super::error::QueryError)
    /// together with the statement and its sanitized arguments.
    async fn execute(&self, query: &str, args: &[DatabaseValue]) -> Result<ExecResult>;

    /// Execute a statement that returns rows
    async fn query(&self, query: &str, args: &[DatabaseValue]) -> Result<Rows>;

    /// First row of a query, [`DatabaseError::NoRows`] when there is none
    async fn query_one(&self, query: &str, args: &[DatabaseValue]) -> Result<DatabaseRow> {
        first_row(self.query(query, args).await?)
    }

    /// Begin a transaction; `None` uses the backend defaults
    async fn begin_tx(&self, opts: Option<&TxOptions>) -> Result<Box<dyn SqlTx>>;

    /// Check that the backend is reachable; driver errors are not wrapped
    async fn ping(&self) -> Result<()>;

    /// Close the whole pool
    ///
    /// Transactions still open keep their own connection until they finish.
    async fn close(&self) -> Result<()>;
}

/// One in-flight transaction
///
/// `commit` and `rollback` consume the transaction. Dropping it without either
/// rolls it back.
#[async_trait]
pub trait SqlTx: Send {
    /// Backend of the originating pool
    fn driver(&self) -> Driver;

    async fn execute(&mut self, query: &str, args: &[DatabaseValue]) -> Result<ExecResult>;

    async fn query(&mut self, query: &str, args: &[DatabaseValue]) -> Result<Rows>;

    /// First row of a query, [`DatabaseError::NoRows`] when there is none
    async fn query_one(&mut self, query: &str, args: &[DatabaseValue]) -> Result<DatabaseRow> {
        first_row(self.query(query, args).await?)
    }

    /// Nested transactions are not supported
    async fn begin_tx(&mut self, _opts: Option<&TxOptions>) -> Result<Box<dyn SqlTx>> {
        Err(DatabaseError::NestedTransaction)
    }

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;

    /// MySQL: always succeeds. PostgreSQL: pings the transaction's connection.
    async fn ping(&mut self) -> Result<()>;
}

pub(crate) fn first_row(mut rows: Rows) -> Result<DatabaseRow> {
    if !rows.advance() {
        return Err(DatabaseError::NoRows);
    }
    let row = rows.current().cloned().ok_or(DatabaseError::NoRows);
    rows.close();
    row
}

/// Open a connection pool for `config`
///
/// Events are emitted under a fresh `sqldb` span carrying the driver name.
///
/// # Errors
///
/// - [`DatabaseError::UnsupportedDriver`] for unknown driver names, or when the
///   backend feature is not compiled in
/// - [`DatabaseError::Config`] / [`DatabaseError::InvalidDsn`] for bad settings
/// - the driver's connect error (PostgreSQL connects eagerly)
pub async fn open(config: &DbConfig) -> Result<Box<dyn SqlDb>> {
    let driver = config.parse_driver()?;
    let span = tracing::info_span!("sqldb", driver = %driver);
    open_with_span(config, span).await
}

/// Open a connection pool logging under the given span
pub async fn open_with_span(config: &DbConfig, span: Span) -> Result<Box<dyn SqlDb>> {
    config.validate()?;
    let driver = config.parse_driver()?;
    let logger = QueryLogger::new(span, config.debug);

    match driver {
        #[cfg(feature = "mysql")]
        Driver::Mysql => Ok(Box::new(
            crate::backends::mysql::MysqlDatabase::connect(config, logger)?,
        )),
        #[cfg(feature = "postgres")]
        Driver::Postgres => Ok(Box::new(
            crate::backends::postgres::PostgresDatabase::connect(config, logger).await?,
        )),
        #[allow(unreachable_patterns)]
        other => {
            drop(logger);
            Err(DatabaseError::UnsupportedDriver(format!(
                "{} (backend not compiled in)",
                other
            )))
        }
    }
}

/// Run `f` inside a transaction
///
/// Commits when `f` returns `Ok`, rolls back and returns the error of `f`
/// otherwise. A failing rollback is logged, not returned.
///
/// ```rust,no_run
/// use gobit_db::prelude::*;
///
/// # async fn demo(db: &dyn SqlDb) -> Result<()> {
/// let moved = gobit_db::transaction(db, None, |tx| {
///     Box::pin(async move {
///         tx.execute("UPDATE accounts SET balance = balance - 10 WHERE id = ?", &[1.into()])
///             .await?;
///         tx.execute("UPDATE accounts SET balance = balance + 10 WHERE id = ?", &[2.into()])
///             .await?;
///         Ok(10)
///     })
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn transaction<T, F>(db: &dyn SqlDb, opts: Option<&TxOptions>, f: F) -> Result<T>
where
    F: for<'t> FnOnce(
            &'t mut (dyn SqlTx + 'static),
        ) -> Pin<Box<dyn Future<Output = Result<T>> + Send + 't>>
        + Send,
    T: Send,
{
    let mut tx = db.begin_tx(opts).await?;

    match f(&mut *tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback after failed transaction body failed");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Calls = Arc<Mutex<Vec<String>>>;

    struct RecordingDb {
        calls: Calls,
    }

    struct RecordingTx {
        calls: Calls,
    }

    #[async_trait]
    impl SqlDb for RecordingDb {
        fn driver(&self) -> Driver {
            Driver::Postgres
        }

        async fn execute(&self, query: &str, _args: &[DatabaseValue]) -> Result<ExecResult> {
            self.calls.lock().unwrap().push(format!("db.execute {}", query));
            Ok(ExecResult::new(1, 0))
        }

        async fn query(&self, _query: &str, _args: &[DatabaseValue]) -> Result<Rows> {
            Ok(Rows::new(Arc::from(Vec::<String>::new()), Vec::new()))
        }

        async fn begin_tx(&self, _opts: Option<&TxOptions>) -> Result<Box<dyn SqlTx>> {
            self.calls.lock().unwrap().push("begin".to_string());
            Ok(Box::new(RecordingTx {
                calls: Arc::clone(&self.calls),
            }))
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl SqlTx for RecordingTx {
        fn driver(&self) -> Driver {
            Driver::Postgres
        }

        async fn execute(&mut self, query: &str, _args: &[DatabaseValue]) -> Result<ExecResult> {
            if query.starts_with("FAIL") {
                return Err(DatabaseError::config("statement rejected"));
            }
            self.calls.lock().unwrap().push(format!("tx.execute {}", query));
            Ok(ExecResult::new(1, 0))
        }

        async fn query(&mut self, _query: &str, _args: &[DatabaseValue]) -> Result<Rows> {
            let columns: Arc<[String]> = Arc::from(vec!["n".to_string()]);
            Ok(Rows::from_values(columns, vec![vec![DatabaseValue::Long(1)]]))
        }

        async fn commit(self: Box<Self>) -> Result<()> {
            self.calls.lock().unwrap().push("commit".to_string());
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<()> {
            self.calls.lock().unwrap().push("rollback".to_string());
            Ok(())
        }

        async fn ping(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn recording_db() -> (RecordingDb, Calls) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        (
            RecordingDb {
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }

    #[tokio::test]
    async fn test_nested_begin_is_rejected() {
        let (db, _) = recording_db();
        let mut tx = db.begin_tx(None).await.unwrap();
        let opts = TxOptions::new().read_only();
        assert!(matches!(
            tx.begin_tx(None).await,
            Err(DatabaseError::NestedTransaction)
        ));
        assert!(matches!(
            tx.begin_tx(Some(&opts)).await,
            Err(DatabaseError::NestedTransaction)
        ));
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_query_one() {
        let (db, _) = recording_db();
        assert!(matches!(
            db.query_one("SELECT 1 WHERE false", &[]).await,
            Err(DatabaseError::NoRows)
        ));

        let mut tx = db.begin_tx(None).await.unwrap();
        let row = tx.query_one("SELECT 1 AS n", &[]).await.unwrap();
        assert_eq!(row.try_get::<i64>("n").unwrap(), 1);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_transaction_helper_commits() {
        let (db, calls) = recording_db();
        let value = transaction(&db, None, |tx| {
            Box::pin(async move {
                tx.execute("INSERT 1", &[]).await?;
                Ok(7)
            })
        })
        .await
        .unwrap();

        assert_eq!(value, 7);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["begin", "tx.execute INSERT 1", "commit"]
        );
    }

    #[tokio::test]
    async fn test_transaction_helper_rolls_back() {
        let (db, calls) = recording_db();
        let result: Result<()> = transaction(&db, None, |tx| {
            Box::pin(async move {
                tx.execute("INSERT 1", &[]).await?;
                tx.execute("FAIL", &[]).await?;
                Ok(())
            })
        })
        .await;

        assert!(matches!(result, Err(DatabaseError::Config(_))));
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["begin", "tx.execute INSERT 1", "rollback"]
        );
    }

    #[tokio::test]
    async fn test_open_rejects_unknown_driver() {
        for name in ["sqlite", "oracle", "mssql"] {
            let config = DbConfig::with_driver_name(name);
            let err = open(&config).await.err().expect("unsupported driver");
            assert!(matches!(err, DatabaseError::UnsupportedDriver(_)));
        }
    }

    #[tokio::test]
    async fn test_open_validates_config() {
        let config = DbConfig::new(Driver::Mysql).max_conn(0);
        let err = open(&config).await.err().expect("invalid config");
        assert!(matches!(err, DatabaseError::Config(_)));
    }
}
