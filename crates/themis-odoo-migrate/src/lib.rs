//! # themis-odoo-migrate
//!
//! Migration of a Themis law-firm database (Firebird) into Odoo.
//!
//! The library reads Themis tables over ODBC and recreates their records in
//! Odoo through JSON-RPC, in dependency order:
//!
//! - **Users**, **companies** and **contacts** (with their bank accounts)
//! - **Cases** with their categories and RTF notes
//! - **Parties** linking cases to partners
//! - **Timesheets** and **costs**, priced through tariff fallback chains
//! - **Documents**, read from disk and uploaded in size-bounded batches
//!
//! Source ids are translated to destination ids through the mappings each
//! step publishes. Runs can be resumed from an HMAC-signed JSON state file.
//!
//! ## Example
//!
//! ```rust,no_run
//! use themis_odoo_migrate::{Config, Orchestrator};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), themis_odoo_migrate::MigrateError> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run().await?;
//!     println!("Created {} records", result.records_created);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod source;
pub mod state;
pub mod target;
pub mod transfer;
pub mod transform;

// Re-exports for convenient access
pub use config::{Config, DestinationConfig, MigrationConfig, SourceConfig};
pub use crate::core::{Entity, IdMapping, MigrationContext, Record, Ref, Row, SqlValue};
pub use error::{MigrateError, Result};
pub use orchestrator::{HealthCheckResult, MigrationResult, Orchestrator, StepSummary};
pub use source::{FirebirdSource, MemorySource, SourceReader};
pub use state::{MigrationState, Step, StepStatus};
pub use target::{Destination, OdooClient};
pub use transfer::{BatchReport, BatchSink, BatchSubmitter, DocumentStore, FsDocumentStore, SizedRecord};
