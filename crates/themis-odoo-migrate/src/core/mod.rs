//! Core types shared by every migration step.
//!
//! - [`schema`]: Themis tables and their fixed column renaming
//! - [`value`]: source values and attribute rows
//! - [`mapping`]: source id to destination id translation
//! - [`context`]: the mappings and side tables accumulated during a run
//! - [`price`]: unit price fallback chains

pub mod context;
pub mod mapping;
pub mod price;
pub mod schema;
pub mod value;

// Re-export commonly used types for convenience
pub use context::MigrationContext;
pub use mapping::{IdMapping, Ref};
pub use schema::{Entity, FieldMapping};
pub use value::{Record, Row, SqlValue, DATETIME_FORMAT, DATE_FORMAT};
