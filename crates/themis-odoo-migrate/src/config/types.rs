//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Themis source database configuration.
    pub source: SourceConfig,

    /// Odoo destination configuration.
    pub destination: DestinationConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Themis (Firebird) source configuration, reached over ODBC.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to the Firebird database file.
    pub database: String,

    /// ODBC driver name.
    #[serde(default = "default_firebird_driver")]
    pub driver: String,

    /// Connection character set (default: "ISO8859_1").
    #[serde(default = "default_charset")]
    pub charset: String,

    /// Username (default: "SYSDBA").
    #[serde(default = "default_sysdba")]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Raw ODBC connection string, replaces the generated one when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("database", &self.database)
            .field("driver", &self.driver)
            .field("charset", &self.charset)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field(
                "connection_string",
                &self.connection_string.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Odoo destination configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Base URL of the Odoo instance, e.g. `https://odoo.example.com`.
    pub url: String,

    /// Odoo database name.
    pub database: String,

    /// Login of the migrating user.
    pub user: String,

    /// Password or API key of the migrating user.
    pub secret: String,

    /// Per-request timeout in seconds (default: 3600). Bulk creates on large
    /// tables run for a long time on the server side.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl fmt::Debug for DestinationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationConfig")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("secret", &"[REDACTED]")
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Root directory holding one sub-directory of documents per Themis case.
    #[serde(default)]
    pub document_root: PathBuf,

    /// Ceiling on the summed document payload size of one submission, in bytes.
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: usize,

    /// Steps to leave out, by name (e.g. `users`, `documents`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_steps: Vec<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            document_root: PathBuf::new(),
            max_batch_bytes: default_max_batch_bytes(),
            skip_steps: Vec::new(),
        }
    }
}

impl SourceConfig {
    /// Source configuration for a database file with every other field at its
    /// default.
    pub fn for_database(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            driver: default_firebird_driver(),
            charset: default_charset(),
            user: default_sysdba(),
            password: String::new(),
            connection_string: None,
        }
    }
}

impl DestinationConfig {
    pub fn new(
        url: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            user: user.into(),
            secret: secret.into(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Config {
    /// Configuration with default migration settings.
    pub fn new(source: SourceConfig, destination: DestinationConfig) -> Self {
        Self {
            source,
            destination,
            migration: MigrationConfig::default(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    3600
}

fn default_firebird_driver() -> String {
    "Firebird/InterBase(r) driver".to_string()
}

fn default_charset() -> String {
    "ISO8859_1".to_string()
}

fn default_sysdba() -> String {
    "SYSDBA".to_string()
}

fn default_max_batch_bytes() -> usize {
    30_000_000
}
