//! Database backend implementations
//!
//! Each SQL backend implements [`SqlDb`](crate::core::SqlDb) and
//! [`SqlTx`](crate::core::SqlTx) and is compiled in behind its cargo feature.

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "redis_support")]
pub mod redis;

#[cfg(feature = "mysql")]
pub use mysql::{
    mysql_tx_opts, mysql_url_from_dsn, translate_dsn_params, MysqlConnectUrl, MysqlDatabase,
    MysqlTransaction,
};

#[cfg(feature = "postgres")]
pub use postgres::{
    pg_tx_options, CommitRolledBack, PgAccessMode, PgDeferrableMode, PgTxOptions, PostgresDatabase,
    PostgresTransaction,
};

#[cfg(feature = "redis_support")]
pub use redis::{CacheDb, RedisClient};
