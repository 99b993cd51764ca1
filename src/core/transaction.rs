//! Uniform transaction options
//!
//! Backends translate these into their native option types; see
//! `backends::mysql::mysql_tx_opts` and `backends::postgres::pg_tx_options`.

use serde::{Deserialize, Serialize};

/// Transaction isolation level
///
/// Not every backend supports every level. MySQL rejects the levels it cannot
/// express when the transaction begins; PostgreSQL receives the level name and
/// lets the server decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Backend default, no isolation clause is sent
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    WriteCommitted,
    RepeatableRead,
    Snapshot,
    Serializable,
    Linearizable,
}

impl IsolationLevel {
    /// Human readable name, e.g. `Read Committed`
    pub fn name(&self) -> &'static str {
        match self {
            IsolationLevel::Default => "Default",
            IsolationLevel::ReadUncommitted => "Read Uncommitted",
            IsolationLevel::ReadCommitted => "Read Committed",
            IsolationLevel::WriteCommitted => "Write Committed",
            IsolationLevel::RepeatableRead => "Repeatable Read",
            IsolationLevel::Snapshot => "Snapshot",
            IsolationLevel::Serializable => "Serializable",
            IsolationLevel::Linearizable => "Linearizable",
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Transaction access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    ReadOnly,
    #[default]
    ReadWrite,
}

/// Transaction deferrable mode, only meaningful on PostgreSQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferrableMode {
    Deferrable,
    #[default]
    NotDeferrable,
}

/// Options accepted by `SqlDb::begin_tx` on every backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TxOptions {
    pub isolation: IsolationLevel,
    pub access_mode: AccessMode,
    pub deferrable_mode: DeferrableMode,
}

impl TxOptions {
    /// Create options with backend defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the isolation level
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = level;
        self
    }

    /// Mark the transaction read-only
    pub fn read_only(mut self) -> Self {
        self.access_mode = AccessMode::ReadOnly;
        self
    }

    /// Mark the transaction deferrable
    pub fn deferrable(mut self) -> Self {
        self.deferrable_mode = DeferrableMode::Deferrable;
        self
    }

    /// Whether the access mode is read-only
    pub fn is_read_only(&self) -> bool {
        self.access_mode == AccessMode::ReadOnly
    }
}
