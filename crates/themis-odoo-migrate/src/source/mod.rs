//! Themis source database access.
//!
//! The migration only needs two things from the source: the rows of one
//! table restricted to a fixed column list, and (for diagnostics) the
//! catalog of tables and columns. [`SourceReader`] is that facade;
//! [`FirebirdSource`] implements it over ODBC and [`MemorySource`] serves
//! fixtures.

mod memory;
mod odbc;

pub use memory::MemorySource;
pub use odbc::FirebirdSource;

use crate::core::{Entity, Row, SqlValue};
use crate::error::Result;
use async_trait::async_trait;
use tracing::debug;

/// Trait for source database operations.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Fetch every row of `table`, values in `columns` order.
    async fn fetch_rows(&self, table: &str, columns: &[&str]) -> Result<Vec<Vec<SqlValue>>>;

    /// User table names, sorted.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Column names of a table, in declaration order.
    async fn list_columns(&self, table: &str) -> Result<Vec<String>>;
}

/// Read every row of an entity's table, renaming columns to attribute names.
///
/// Values are passed through untouched.
pub async fn extract<S: SourceReader + ?Sized>(source: &S, entity: Entity) -> Result<Vec<Row>> {
    let fields = entity.fields();
    let columns = entity.columns();
    let raw = source.fetch_rows(entity.table(), &columns).await?;

    let rows: Vec<Row> = raw
        .into_iter()
        .map(|values| {
            fields
                .iter()
                .zip(values)
                .map(|((_, attr), value)| (attr.to_string(), value))
                .collect()
        })
        .collect();

    debug!("Extracted {} rows from {}", rows.len(), entity.table());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extract_renames_columns() {
        let source = MemorySource::new().with_table(
            "DOSSIERCATEGORIE",
            &["ID", "NEDERLANDS"],
            vec![
                vec![SqlValue::I64(1), SqlValue::from("Familierecht")],
                vec![SqlValue::I64(2), SqlValue::Null],
            ],
        );

        let rows = extract(&source, Entity::CaseCategories).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&SqlValue::I64(1)));
        assert_eq!(rows[0].get("name"), Some(&SqlValue::from("Familierecht")));
        assert_eq!(rows[1].get("name"), Some(&SqlValue::Null));
        assert!(!rows[0].contains("NEDERLANDS"));
    }

    #[tokio::test]
    async fn test_extract_missing_table_fails() {
        let source = MemorySource::new();
        assert!(extract(&source, Entity::Cases).await.is_err());
    }
}
