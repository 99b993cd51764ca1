//! Query logging and tracing setup
//!
//! Every connection and transaction carries a [`QueryLogger`]: the span it was
//! given at construction plus the `debug` switch from its configuration. Nothing
//! here looks up a logger from global state; the global subscriber is only
//! installed by [`init_tracing`] when the application asks for it.

use super::error::{DatabaseError, Result};
use super::sanitize::sanitize_args;
use super::value::DatabaseValue;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::Span;
use tracing_subscriber::EnvFilter;

/// Per-call statement logger bound to an explicit span
#[derive(Debug, Clone)]
pub struct QueryLogger {
    span: Span,
    debug: bool,
}

impl QueryLogger {
    pub fn new(span: Span, debug: bool) -> Self {
        Self { span, debug }
    }

    /// A logger that never emits
    pub fn disabled() -> Self {
        Self::new(Span::none(), false)
    }

    /// The span events are emitted under
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn is_enabled(&self) -> bool {
        self.debug
    }

    /// Emit one event for a finished call
    ///
    /// `query` is empty for `BeginTx`, `Commit` and `Rollback`.
    pub fn log(
        &self,
        method: &'static str,
        query: &str,
        args: &[DatabaseValue],
        elapsed: Duration,
    ) {
        if !self.debug {
            return;
        }
        tracing::debug!(
            parent: &self.span,
            method,
            duration = ?elapsed,
            args = ?sanitize_args(args),
            "{}",
            query
        );
    }

    /// Await `fut` and log it with its wall-clock duration, whatever the outcome
    pub async fn timed<T, F>(
        &self,
        method: &'static str,
        query: &str,
        args: &[DatabaseValue],
        fut: F,
    ) -> T
    where
        F: Future<Output = T>,
    {
        let start = Instant::now();
        let out = fut.await;
        self.log(method, query, args, start.elapsed());
        out
    }
}

/// Output encoding of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Console,
}

/// Logging section of the settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Append log lines to this file instead of stderr
    pub file_path: Option<String>,
    /// Filter directive, e.g. `info` or `gobit_db=debug,warn`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_path: None,
            level: "info".to_string(),
            format: LogFormat::Console,
        }
    }
}

impl LoggingConfig {
    /// Check that `level` is a valid filter directive
    pub fn validate(&self) -> Result<()> {
        EnvFilter::try_new(&self.level)
            .map(|_| ())
            .map_err(|e| {
                DatabaseError::config(format!("invalid logging level '{}': {}", self.level, e))
            })
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over `config.level`. Fails if a subscriber is
/// already installed or the log file cannot be opened.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    config.validate()?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| DatabaseError::config(e.to_string()))?;

    let file = match &config.file_path {
        Some(path) => Some(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?,
        ),
        None => None,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match (config.format, file) {
        (LogFormat::Json, Some(file)) => builder.json().with_writer(Mutex::new(file)).try_init(),
        (LogFormat::Json, None) => builder.json().with_writer(std::io::stderr).try_init(),
        (LogFormat::Console, Some(file)) => builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init(),
        (LogFormat::Console, None) => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| {
        DatabaseError::config(format!("failed to install tracing subscriber: {}", e))
    })
}
