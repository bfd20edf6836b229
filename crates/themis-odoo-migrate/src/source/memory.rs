//! In-memory source, used for fixtures and dry runs.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::SourceReader;
use crate::core::SqlValue;
use crate::error::{MigrateError, Result};

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
}

/// A source holding whole tables in memory.
///
/// Requested columns the table does not have read as NULL, like a nullable
/// column that was never filled in.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: BTreeMap<String, MemoryTable>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a table.
    pub fn with_table(mut self, name: &str, columns: &[&str], rows: Vec<Vec<SqlValue>>) -> Self {
        self.insert_table(name, columns, rows);
        self
    }

    pub fn insert_table(&mut self, name: &str, columns: &[&str], rows: Vec<Vec<SqlValue>>) {
        self.tables.insert(
            name.to_uppercase(),
            MemoryTable {
                columns: columns.iter().map(|c| c.to_uppercase()).collect(),
                rows,
            },
        );
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn fetch_rows(&self, table: &str, columns: &[&str]) -> Result<Vec<Vec<SqlValue>>> {
        let data = self
            .tables
            .get(&table.to_uppercase())
            .ok_or_else(|| MigrateError::Source(format!("Table {} not found", table)))?;

        let positions: Vec<Option<usize>> = columns
            .iter()
            .map(|col| {
                let col = col.to_uppercase();
                data.columns.iter().position(|c| *c == col)
            })
            .collect();

        Ok(data
            .rows
            .iter()
            .map(|row| {
                positions
                    .iter()
                    .map(|pos| {
                        pos.and_then(|i| row.get(i).cloned())
                            .unwrap_or(SqlValue::Null)
                    })
                    .collect()
            })
            .collect())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<String>> {
        self.tables
            .get(&table.to_uppercase())
            .map(|t| t.columns.clone())
            .ok_or_else(|| MigrateError::Source(format!("Table {} not found", table)))
    }
}
