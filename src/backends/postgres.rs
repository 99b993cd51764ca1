//! PostgreSQL backend
//!
//! Connections come from a `deadpool_postgres` pool. A transaction checks one
//! connection out for its whole lifetime and drives it with plain
//! `BEGIN` / `COMMIT` / `ROLLBACK` statements.
//!
//! Results arrive in the binary protocol. Columns without a native mapping are
//! returned as text when the type is textual and as raw bytes otherwise;
//! `numeric` values are converted to and from their decimal text.

use crate::core::{
    config::DbConfig,
    database::{SqlDb, SqlTx},
    database_types::Driver,
    error::{BoxError, DatabaseError, Result},
    logging::QueryLogger,
    rows::{ExecResult, Rows},
    transaction::{AccessMode, DeferrableMode, IsolationLevel, TxOptions},
    value::DatabaseValue,
};
use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use deadpool_postgres::{ClientWrapper, Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use std::str::FromStr;
use std::sync::Arc;
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, Kind, ToSql, Type};
use tokio_postgres::{NoTls, Row};
use uuid::Uuid;

/// Access mode clause of a PostgreSQL `BEGIN`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgAccessMode {
    ReadOnly,
    ReadWrite,
}

impl PgAccessMode {
    fn as_sql(&self) -> &'static str {
        match self {
            PgAccessMode::ReadOnly => "READ ONLY",
            PgAccessMode::ReadWrite => "READ WRITE",
        }
    }
}

/// Deferrable clause of a PostgreSQL `BEGIN`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgDeferrableMode {
    Deferrable,
    NotDeferrable,
}

impl PgDeferrableMode {
    fn as_sql(&self) -> &'static str {
        match self {
            PgDeferrableMode::Deferrable => "DEFERRABLE",
            PgDeferrableMode::NotDeferrable => "NOT DEFERRABLE",
        }
    }
}

/// Native PostgreSQL transaction options; unset fields are left to the server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PgTxOptions {
    /// Lowercased level name, e.g. `repeatable read`
    pub iso_level: Option<String>,
    pub access_mode: Option<PgAccessMode>,
    pub deferrable_mode: Option<PgDeferrableMode>,
}

impl PgTxOptions {
    /// The `BEGIN` statement for these options
    pub fn begin_sql(&self) -> String {
        let mut sql = String::from("BEGIN");
        if let Some(level) = &self.iso_level {
            sql.push_str(" ISOLATION LEVEL ");
            sql.push_str(level);
        }
        if let Some(mode) = self.access_mode {
            sql.push(' ');
            sql.push_str(mode.as_sql());
        }
        if let Some(mode) = self.deferrable_mode {
            sql.push(' ');
            sql.push_str(mode.as_sql());
        }
        sql
    }
}

/// Translate uniform options into PostgreSQL options
///
/// Levels PostgreSQL does not know (`Write Committed`, `Snapshot`,
/// `Linearizable`) are passed through and rejected by the server at `BEGIN`.
pub fn pg_tx_options(opts: Option<&TxOptions>) -> PgTxOptions {
    let Some(opts) = opts else {
        return PgTxOptions::default();
    };

    let iso_level = match opts.isolation {
        IsolationLevel::Default => None,
        level => Some(level.name().to_lowercase()),
    };
    let access_mode = match opts.access_mode {
        AccessMode::ReadOnly => PgAccessMode::ReadOnly,
        AccessMode::ReadWrite => PgAccessMode::ReadWrite,
    };
    let deferrable_mode = match opts.deferrable_mode {
        DeferrableMode::Deferrable => PgDeferrableMode::Deferrable,
        DeferrableMode::NotDeferrable => PgDeferrableMode::NotDeferrable,
    };

    PgTxOptions {
        iso_level,
        access_mode: Some(access_mode),
        deferrable_mode: Some(deferrable_mode),
    }
}

/// Statement parameter bound from a [`DatabaseValue`]
///
/// Integers and floats are widened or narrowed to the parameter type the
/// server inferred, including `numeric`. Strings are parsed for `uuid`,
/// `numeric` and `json`/`jsonb` parameters; everything else must match.
#[derive(Debug)]
struct PgParam<'a>(&'a DatabaseValue);

impl ToSql for PgParam<'_> {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, BoxError> {
        match self.0 {
            DatabaseValue::Null => Ok(IsNull::Yes),
            DatabaseValue::Bool(v) => v.to_sql_checked(ty, out),
            DatabaseValue::Int(v) => encode_int(i64::from(*v), ty, out),
            DatabaseValue::Long(v) => encode_int(*v, ty, out),
            DatabaseValue::Float(v) => encode_float(f64::from(*v), ty, out),
            DatabaseValue::Double(v) => encode_float(*v, ty, out),
            DatabaseValue::String(v) => encode_text(v, ty, out),
            DatabaseValue::Bytes(v) if *ty == Type::UUID => {
                Uuid::from_slice(v)?.to_sql_checked(ty, out)
            }
            DatabaseValue::Bytes(v) => v.as_slice().to_sql_checked(ty, out),
            DatabaseValue::Timestamp(micros) => {
                let ts = DateTime::from_timestamp_micros(*micros).ok_or("timestamp out of range")?;
                if *ty == Type::TIMESTAMP {
                    ts.naive_utc().to_sql_checked(ty, out)
                } else {
                    ts.to_sql_checked(ty, out)
                }
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn encode_int(
    v: i64,
    ty: &Type,
    out: &mut BytesMut,
) -> std::result::Result<IsNull, BoxError> {
    if *ty == Type::NUMERIC {
        encode_numeric(&v.to_string(), out)
    } else if *ty == Type::INT2 {
        i16::try_from(v)?.to_sql_checked(ty, out)
    } else if *ty == Type::INT4 {
        i32::try_from(v)?.to_sql_checked(ty, out)
    } else {
        v.to_sql_checked(ty, out)
    }
}

fn encode_float(
    v: f64,
    ty: &Type,
    out: &mut BytesMut,
) -> std::result::Result<IsNull, BoxError> {
    if *ty == Type::NUMERIC {
        encode_numeric(&v.to_string(), out)
    } else if *ty == Type::FLOAT4 {
        (v as f32).to_sql_checked(ty, out)
    } else {
        v.to_sql_checked(ty, out)
    }
}

fn encode_text(
    v: &str,
    ty: &Type,
    out: &mut BytesMut,
) -> std::result::Result<IsNull, BoxError> {
    if *ty == Type::UUID {
        Uuid::parse_str(v)?.to_sql_checked(ty, out)
    } else if *ty == Type::NUMERIC {
        encode_numeric(v, out)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        serde_json::from_str::<serde_json::Value>(v)?.to_sql_checked(ty, out)
    } else {
        v.to_sql_checked(ty, out)
    }
}

// Binary `numeric`: ndigits, weight, sign, dscale, then base-10000 digits.
const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;
const NBASE_DIGITS: usize = 4;

fn put_numeric_header(out: &mut BytesMut, ndigits: i16, weight: i16, sign: u16, dscale: u16) {
    out.put_i16(ndigits);
    out.put_i16(weight);
    out.put_u16(sign);
    out.put_u16(dscale);
}

/// Encode a plain decimal literal such as `-12.50`, `NaN` or `Infinity`
fn encode_numeric(literal: &str, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
    let literal = literal.trim();
    let special = match literal.to_ascii_lowercase().as_str() {
        "nan" => Some(NUMERIC_NAN),
        "inf" | "+inf" | "infinity" | "+infinity" => Some(NUMERIC_PINF),
        "-inf" | "-infinity" => Some(NUMERIC_NINF),
        _ => None,
    };
    if let Some(sign) = special {
        put_numeric_header(out, 0, 0, sign, 0);
        return Ok(IsNull::No);
    }

    let (negative, body) = match literal.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, literal.strip_prefix('+').unwrap_or(literal)),
    };
    let (int, frac) = body.split_once('.').unwrap_or((body, ""));
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int.is_empty() && frac.is_empty()) || !is_digits(int) || !is_digits(frac) {
        return Err(format!("invalid numeric literal '{}'", literal).into());
    }

    let int = int.trim_start_matches('0');
    let int_pad = (NBASE_DIGITS - int.len() % NBASE_DIGITS) % NBASE_DIGITS;
    let frac_pad = (NBASE_DIGITS - frac.len() % NBASE_DIGITS) % NBASE_DIGITS;
    let padded = format!("{}{}{}{}", "0".repeat(int_pad), int, frac, "0".repeat(frac_pad));
    let mut digits: Vec<u16> = padded
        .as_bytes()
        .chunks(NBASE_DIGITS)
        .map(|group| group.iter().fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0')))
        .collect();

    let mut weight = ((int_pad + int.len()) / NBASE_DIGITS) as i64 - 1;
    let leading = digits.iter().take_while(|d| **d == 0).count();
    digits.drain(..leading);
    weight -= leading as i64;
    while digits.last() == Some(&0) {
        digits.pop();
    }
    if digits.is_empty() {
        weight = 0;
    }
    let sign = if negative && !digits.is_empty() {
        NUMERIC_NEG
    } else {
        NUMERIC_POS
    };

    put_numeric_header(
        out,
        i16::try_from(digits.len())?,
        i16::try_from(weight)?,
        sign,
        u16::try_from(frac.len())?,
    );
    for digit in digits {
        out.put_u16(digit);
    }
    Ok(IsNull::No)
}

/// `numeric` column rendered as decimal text
struct PgNumeric(String);

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        let word = |idx: usize| -> std::result::Result<u16, BoxError> {
            raw.get(idx..idx + 2)
                .map(|b| u16::from_be_bytes([b[0], b[1]]))
                .ok_or_else(|| "truncated numeric value".into())
        };
        let ndigits = usize::from(word(0)?);
        let weight = i64::from(word(2)? as i16);
        let sign = word(4)?;
        let dscale = usize::from(word(6)?);

        match sign {
            NUMERIC_NAN => return Ok(PgNumeric("NaN".to_string())),
            NUMERIC_PINF => return Ok(PgNumeric("Infinity".to_string())),
            NUMERIC_NINF => return Ok(PgNumeric("-Infinity".to_string())),
            NUMERIC_POS | NUMERIC_NEG => {}
            other => return Err(format!("invalid numeric sign {:#06x}", other).into()),
        }

        let digits = (0..ndigits)
            .map(|i| word(8 + 2 * i))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let digit = |idx: i64| -> u16 {
            usize::try_from(idx)
                .ok()
                .and_then(|idx| digits.get(idx).copied())
                .unwrap_or(0)
        };

        let mut text = String::new();
        if sign == NUMERIC_NEG {
            text.push('-');
        }
        if weight < 0 {
            text.push('0');
        } else {
            text.push_str(&digit(0).to_string());
            for idx in 1..=weight {
                text.push_str(&format!("{:04}", digit(idx)));
            }
        }
        if dscale > 0 {
            let mut frac = String::with_capacity(dscale + NBASE_DIGITS);
            let mut idx = weight + 1;
            while frac.len() < dscale {
                frac.push_str(&format!("{:04}", digit(idx)));
                idx += 1;
            }
            frac.truncate(dscale);
            text.push('.');
            text.push_str(&frac);
        }
        Ok(PgNumeric(text))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Any column as its binary wire representation
struct PgRaw(Vec<u8>);

impl<'a> FromSql<'a> for PgRaw {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        Ok(PgRaw(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn or_null<T>(value: Option<T>, f: impl FnOnce(T) -> DatabaseValue) -> DatabaseValue {
    value.map(f).unwrap_or(DatabaseValue::Null)
}

/// Decode one column; types without a mapping become text or raw bytes
fn decode_value(
    row: &Row,
    idx: usize,
) -> std::result::Result<DatabaseValue, tokio_postgres::Error> {
    let ty = row.columns()[idx].type_();
    let value = match ty.name() {
        "bool" => or_null(row.try_get::<_, Option<bool>>(idx)?, DatabaseValue::Bool),
        "int2" => or_null(row.try_get::<_, Option<i16>>(idx)?, |v| {
            DatabaseValue::Int(i32::from(v))
        }),
        "int4" => or_null(row.try_get::<_, Option<i32>>(idx)?, DatabaseValue::Int),
        "int8" => or_null(row.try_get::<_, Option<i64>>(idx)?, DatabaseValue::Long),
        "oid" => or_null(row.try_get::<_, Option<u32>>(idx)?, |v| {
            DatabaseValue::Long(i64::from(v))
        }),
        "float4" => or_null(row.try_get::<_, Option<f32>>(idx)?, DatabaseValue::Float),
        "float8" => or_null(row.try_get::<_, Option<f64>>(idx)?, DatabaseValue::Double),
        "bytea" => or_null(row.try_get::<_, Option<Vec<u8>>>(idx)?, DatabaseValue::Bytes),
        "timestamptz" => or_null(row.try_get::<_, Option<DateTime<Utc>>>(idx)?, |v| {
            DatabaseValue::Timestamp(v.timestamp_micros())
        }),
        "timestamp" => or_null(row.try_get::<_, Option<NaiveDateTime>>(idx)?, |v| {
            DatabaseValue::Timestamp(v.and_utc().timestamp_micros())
        }),
        "date" => or_null(row.try_get::<_, Option<NaiveDate>>(idx)?, |v| {
            DatabaseValue::Timestamp(v.and_time(NaiveTime::MIN).and_utc().timestamp_micros())
        }),
        "time" => or_null(row.try_get::<_, Option<NaiveTime>>(idx)?, |v| {
            DatabaseValue::String(v.format("%H:%M:%S%.f").to_string())
        }),
        "json" | "jsonb" => or_null(row.try_get::<_, Option<serde_json::Value>>(idx)?, |v| {
            DatabaseValue::String(v.to_string())
        }),
        "numeric" => or_null(row.try_get::<_, Option<PgNumeric>>(idx)?, |v| {
            DatabaseValue::String(v.0)
        }),
        "uuid" => or_null(row.try_get::<_, Option<Uuid>>(idx)?, |v| {
            DatabaseValue::String(v.to_string())
        }),
        _ if <String as FromSql>::accepts(ty) => {
            or_null(row.try_get::<_, Option<String>>(idx)?, DatabaseValue::String)
        }
        _ => {
            let is_enum = matches!(ty.kind(), Kind::Enum(_));
            or_null(row.try_get::<_, Option<PgRaw>>(idx)?, |v| {
                if is_enum {
                    match String::from_utf8(v.0) {
                        Ok(label) => DatabaseValue::String(label),
                        Err(e) => DatabaseValue::Bytes(e.into_bytes()),
                    }
                } else {
                    DatabaseValue::Bytes(v.0)
                }
            })
        }
    };
    Ok(value)
}

fn decode_row(row: &Row) -> std::result::Result<Vec<DatabaseValue>, tokio_postgres::Error> {
    (0..row.len()).map(|idx| decode_value(row, idx)).collect()
}

async fn execute_on(
    client: &ClientWrapper,
    query: &str,
    args: &[DatabaseValue],
) -> Result<ExecResult> {
    let params: Vec<PgParam<'_>> = args.iter().map(PgParam).collect();
    let refs: Vec<&(dyn ToSql + Sync)> = params
        .iter()
        .map(|p| p as &(dyn ToSql + Sync))
        .collect();

    let affected = client
        .execute(query, &refs)
        .await
        .map_err(|e| DatabaseError::query(query, args, e))?;

    Ok(ExecResult::new(affected, 0))
}

async fn query_on(client: &ClientWrapper, query: &str, args: &[DatabaseValue]) -> Result<Rows> {
    let params: Vec<PgParam<'_>> = args.iter().map(PgParam).collect();
    let refs: Vec<&(dyn ToSql + Sync)> = params
        .iter()
        .map(|p| p as &(dyn ToSql + Sync))
        .collect();

    let wrap = |e: tokio_postgres::Error| DatabaseError::query(query, args, e);

    let statement = client.prepare(query).await.map_err(wrap)?;
    let rows = client.query(&statement, &refs).await.map_err(wrap)?;

    let columns: Arc<[String]> = statement
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect::<Vec<_>>()
        .into();
    let values = rows
        .iter()
        .map(decode_row)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(wrap)?;

    Ok(Rows::from_values(columns, values))
}

/// PostgreSQL connection pool
pub struct PostgresDatabase {
    pool: Pool,
    logger: QueryLogger,
}

impl PostgresDatabase {
    /// Build the pool and check out one connection to verify it
    ///
    /// # Errors
    /// [`DatabaseError::InvalidDsn`] when the DSN does not parse, the pool error
    /// when the server cannot be reached.
    pub async fn connect(config: &DbConfig, logger: QueryLogger) -> Result<Self> {
        let dsn = config.build_dsn()?;
        let pg_config = tokio_postgres::Config::from_str(&dsn)
            .map_err(|e| DatabaseError::invalid_dsn(e.to_string()))?;

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(config.max_conn as usize)
            .build()
            .map_err(|e| DatabaseError::config(e.to_string()))?;

        let conn = pool.get().await?;
        drop(conn);

        tracing::debug!(parent: logger.span(), max_conn = config.max_conn, "postgres pool ready");

        Ok(Self { pool, logger })
    }
}

#[async_trait]
impl SqlDb for PostgresDatabase {
    fn driver(&self) -> Driver {
        Driver::Postgres
    }

    async fn execute(&self, query: &str, args: &[DatabaseValue]) -> Result<ExecResult> {
        self.logger
            .timed("Exec", query, args, async {
                let conn = self
                    .pool
                    .get()
                    .await
                    .map_err(|e| DatabaseError::query(query, args, e))?;
                execute_on(&conn, query, args).await
            })
            .await
    }

    async fn query(&self, query: &str, args: &[DatabaseValue]) -> Result<Rows> {
        self.logger
            .timed("Query", query, args, async {
                let conn = self
                    .pool
                    .get()
                    .await
                    .map_err(|e| DatabaseError::query(query, args, e))?;
                query_on(&conn, query, args).await
            })
            .await
    }

    async fn begin_tx(&self, opts: Option<&TxOptions>) -> Result<Box<dyn SqlTx>> {
        let begin = pg_tx_options(opts).begin_sql();

        let conn = self
            .logger
            .timed("BeginTx", "", &[], async {
                let conn = self.pool.get().await.map_err(DatabaseError::lifecycle)?;
                conn.batch_execute(&begin)
                    .await
                    .map_err(DatabaseError::lifecycle)?;
                Ok::<_, DatabaseError>(conn)
            })
            .await?;

        Ok(Box::new(PostgresTransaction {
            conn: Some(conn),
            logger: self.logger.clone(),
            failed: false,
        }))
    }

    async fn ping(&self) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.batch_execute("SELECT 1").await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close();
        Ok(())
    }
}

/// `COMMIT` of a transaction the server had already aborted
#[derive(Debug, thiserror::Error)]
#[error("commit unexpectedly resulted in rollback")]
pub struct CommitRolledBack;

/// Whether the server rejected the statement, which aborts the transaction block
fn aborts_transaction(err: &DatabaseError) -> bool {
    err.as_query_error()
        .and_then(|e| e.cause())
        .and_then(|cause| cause.downcast_ref::<tokio_postgres::Error>())
        .is_some_and(|e| e.as_db_error().is_some())
}

/// Transaction bound to one pooled connection
///
/// Once a statement has been rejected by the server, `commit` rolls back and
/// fails with a wrapped [`CommitRolledBack`]. Dropped without `commit` or
/// `rollback`, the connection is detached from the pool and closed, which
/// makes the server roll the transaction back.
pub struct PostgresTransaction {
    conn: Option<Object>,
    logger: QueryLogger,
    failed: bool,
}

impl PostgresTransaction {
    fn client(&self) -> Result<&ClientWrapper> {
        self.conn.as_deref().ok_or(DatabaseError::TransactionDone)
    }

    fn track<T>(&mut self, result: &Result<T>) {
        if let Err(err) = result {
            if aborts_transaction(err) {
                self.failed = true;
            }
        }
    }

    async fn finish(&mut self, statement: &'static str, method: &'static str) -> Result<()> {
        let conn = self.conn.take().ok_or(DatabaseError::TransactionDone)?;

        let result = self
            .logger
            .timed(method, "", &[], conn.batch_execute(statement))
            .await;
        if let Err(e) = result {
            // may still be inside the transaction block
            drop(Object::take(conn));
            return Err(DatabaseError::lifecycle(e));
        }
        Ok(())
    }
}

#[async_trait]
impl SqlTx for PostgresTransaction {
    fn driver(&self) -> Driver {
        Driver::Postgres
    }

    async fn execute(&mut self, query: &str, args: &[DatabaseValue]) -> Result<ExecResult> {
        let client = self.client()?;
        let result = self
            .logger
            .timed("Exec", query, args, execute_on(client, query, args))
            .await;
        self.track(&result);
        result
    }

    async fn query(&mut self, query: &str, args: &[DatabaseValue]) -> Result<Rows> {
        let client = self.client()?;
        let result = self
            .logger
            .timed("Query", query, args, query_on(client, query, args))
            .await;
        self.track(&result);
        result
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut tx = self;
        if tx.failed {
            tx.finish("ROLLBACK", "Commit").await?;
            return Err(DatabaseError::lifecycle(CommitRolledBack));
        }
        tx.finish("COMMIT", "Commit").await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut tx = self;
        tx.finish("ROLLBACK", "Rollback").await
    }

    async fn ping(&mut self) -> Result<()> {
        self.client()?.batch_execute("SELECT 1").await?;
        Ok(())
    }
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!(
                parent: self.logger.span(),
                "postgres transaction dropped without commit or rollback, closing its connection"
            );
            drop(Object::take(conn));
        }
    }
}
