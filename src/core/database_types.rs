//! Driver definitions
//!
//! This module defines the SQL backends the facade can dispatch to.

use super::error::DatabaseError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported SQL drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// MySQL/MariaDB through `mysql_async`
    Mysql,
    /// PostgreSQL through `tokio-postgres` and `deadpool-postgres`
    Postgres,
}

impl Driver {
    /// Convert the driver to its canonical name
    pub fn to_str(&self) -> &'static str {
        match self {
            Driver::Mysql => "mysql",
            Driver::Postgres => "postgres",
        }
    }

    /// Default TCP port of the backend
    pub fn default_port(&self) -> u16 {
        match self {
            Driver::Mysql => 3306,
            Driver::Postgres => 5432,
        }
    }

    /// Whether this build was compiled with the backend enabled
    pub fn is_enabled(&self) -> bool {
        match self {
            Driver::Mysql => cfg!(feature = "mysql"),
            Driver::Postgres => cfg!(feature = "postgres"),
        }
    }
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for Driver {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mysql" => Ok(Driver::Mysql),
            "postgres" | "postgresql" | "pgx" => Ok(Driver::Postgres),
            _ => Err(DatabaseError::UnsupportedDriver(s.to_string())),
        }
    }
}
