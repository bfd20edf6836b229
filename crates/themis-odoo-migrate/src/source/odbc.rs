//! Firebird source over ODBC.
//!
//! **Requirements:** the Firebird ODBC driver must be installed and its name
//! must match `source.driver` (default `Firebird/InterBase(r) driver`).
//!
//! Values are fetched as text and converted using the column types from the
//! Firebird system tables. Binary blobs arrive hex encoded; character data
//! arrives in the connection charset and is decoded with `encoding_rs`.
//! A value larger than the fetch buffer fails the read; tables with blob
//! columns are fetched a few rows at a time with large buffers.

use crate::config::SourceConfig;
use crate::core::SqlValue;
use crate::error::{MigrateError, Result};
use crate::source::SourceReader;
use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use odbc_api::{buffers::TextRowSet, ConnectionOptions, Cursor, Environment, ResultSetMetadata};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Rows fetched per round trip.
const FETCH_BATCH_ROWS: usize = 500;

/// Upper bound for one text value of a table without blobs.
const MAX_TEXT_BYTES: usize = 256 * 1024;

/// Rows fetched per round trip when the table has blob columns.
const BLOB_FETCH_BATCH_ROWS: usize = 4;

/// Upper bound for one value of a table with blob columns. Hex doubles binary
/// blobs, so binary content is limited to half of this.
const MAX_BLOB_TEXT_BYTES: usize = 64 * 1024 * 1024;

/// Firebird column kind, derived from `RDB$FIELDS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Integer,
    Decimal,
    Float,
    Date,
    Timestamp,
    Text,
    /// Text blob (`BLOB SUB_TYPE 1`).
    LongText,
    Binary,
}

impl FieldKind {
    /// Map `RDB$FIELD_TYPE`, `RDB$FIELD_SUB_TYPE` and `RDB$FIELD_SCALE`.
    fn from_firebird(field_type: i64, sub_type: i64, scale: i64) -> Self {
        match field_type {
            7 | 8 | 16 if scale < 0 => FieldKind::Decimal,
            7 | 8 | 16 => FieldKind::Integer,
            10 | 11 | 27 => FieldKind::Float,
            12 => FieldKind::Date,
            35 => FieldKind::Timestamp,
            261 if sub_type == 1 => FieldKind::LongText,
            261 => FieldKind::Binary,
            _ => FieldKind::Text,
        }
    }

    fn is_blob(self) -> bool {
        matches!(self, FieldKind::LongText | FieldKind::Binary)
    }
}

/// Row batch size and per-value buffer size for a select over these columns.
fn fetch_limits(kinds: &[FieldKind]) -> (usize, usize) {
    if kinds.iter().any(|k| k.is_blob()) {
        (BLOB_FETCH_BATCH_ROWS, MAX_BLOB_TEXT_BYTES)
    } else {
        (FETCH_BATCH_ROWS, MAX_TEXT_BYTES)
    }
}

/// Escape a SQL string literal value.
/// Doubles single quotes: `O'Brien` -> `O''Brien`
fn escape_sql_string(s: &str) -> String {
    s.replace('\'', "''")
}

/// Quote a Firebird identifier.
/// Doubles double quotes: `A"B` -> `"A""B"`
fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Themis database reached through the Firebird ODBC driver.
pub struct FirebirdSource {
    env: Arc<Environment>,
    connection_string: String,
    encoding: &'static Encoding,
    /// Mutex to serialize ODBC operations (ODBC is not thread-safe)
    conn_mutex: Mutex<()>,
}

impl FirebirdSource {
    /// Connect to the Themis database.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Source`] if the ODBC environment cannot be
    /// created, the driver is missing or the database cannot be opened.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let env = Environment::new().map_err(|e| {
            MigrateError::Source(format!(
                "Failed to create ODBC environment: {}. \
                 Make sure the Firebird ODBC driver is installed.",
                e
            ))
        })?;

        let connection_string = config.connection_string();
        debug!(
            "ODBC connection (credentials hidden): Driver={{{}}};Dbname={};Charset={};...",
            config.driver, config.database, config.charset
        );

        // Test connection - use a scope so conn is dropped before we move env
        {
            let conn = env
                .connect_with_connection_string(&connection_string, ConnectionOptions::default())
                .map_err(|e| {
                    MigrateError::Source(format!(
                        "Failed to open Themis database {}: {}",
                        config.database, e
                    ))
                })?;
            conn.execute("SELECT 1 FROM RDB$DATABASE", ())
                .map_err(|e| MigrateError::Source(format!("Connection check failed: {}", e)))?;
        }

        info!("Connected to Themis database via ODBC: {}", config.database);

        Ok(Self {
            env: Arc::new(env),
            connection_string,
            encoding: encoding_for_charset(&config.charset),
            conn_mutex: Mutex::new(()),
        })
    }

    fn get_connection(&self) -> Result<odbc_api::Connection<'_>> {
        self.env
            .connect_with_connection_string(&self.connection_string, ConnectionOptions::default())
            .map_err(|e| MigrateError::Source(format!("ODBC connection failed: {}", e)))
    }

    /// Execute a query and return the raw text cells.
    ///
    /// A value longer than `max_text_bytes` fails the query instead of being
    /// cut short.
    fn execute_query(
        &self,
        sql: &str,
        batch_rows: usize,
        max_text_bytes: usize,
    ) -> Result<Vec<Vec<Option<Vec<u8>>>>> {
        let conn = self.get_connection()?;
        let mut rows = Vec::new();

        if let Some(mut cursor) = conn
            .execute(sql, ())
            .map_err(|e| MigrateError::Source(format!("ODBC query failed: {} - SQL: {}", e, sql)))?
        {
            let num_cols = cursor
                .num_result_cols()
                .map_err(|e| MigrateError::Source(format!("Failed to get column count: {}", e)))?
                as usize;

            let mut buffers =
                TextRowSet::for_cursor(batch_rows, &mut cursor, Some(max_text_bytes))
                    .map_err(|e| {
                        MigrateError::Source(format!("Failed to create row buffer: {}", e))
                    })?;

            let mut row_cursor = cursor
                .bind_buffer(&mut buffers)
                .map_err(|e| MigrateError::Source(format!("Failed to bind buffer: {}", e)))?;

            while let Some(batch) = row_cursor
                .fetch_with_truncation_check(true)
                .map_err(|e| fetch_error(e, max_text_bytes, sql))?
            {
                for row_idx in 0..batch.num_rows() {
                    let row = (0..num_cols)
                        .map(|col_idx| batch.at(col_idx, row_idx).map(|b| b.to_vec()))
                        .collect();
                    rows.push(row);
                }
            }
        }

        Ok(rows)
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let (text, _, had_errors) = self.encoding.decode(bytes);
        if had_errors {
            debug!("Undecodable bytes replaced in {} text", self.encoding.name());
        }
        text.trim_end().to_string()
    }

    /// Column kinds of a table, keyed by upper-case column name.
    fn load_field_kinds_sync(&self, table: &str) -> Result<Vec<(String, FieldKind)>> {
        let sql = format!(
            "SELECT TRIM(rf.RDB$FIELD_NAME), f.RDB$FIELD_TYPE, \
                    COALESCE(f.RDB$FIELD_SUB_TYPE, 0), COALESCE(f.RDB$FIELD_SCALE, 0) \
             FROM RDB$RELATION_FIELDS rf \
             JOIN RDB$FIELDS f ON f.RDB$FIELD_NAME = rf.RDB$FIELD_SOURCE \
             WHERE rf.RDB$RELATION_NAME = '{}' \
             ORDER BY rf.RDB$FIELD_POSITION",
            escape_sql_string(&table.to_uppercase())
        );

        let rows = self.execute_query(&sql, FETCH_BATCH_ROWS, MAX_TEXT_BYTES)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let mut cells = row.into_iter().map(|c| {
                    c.map(|b| String::from_utf8_lossy(&b).trim().to_string())
                });
                let name = cells.next().flatten()?;
                let int = |v: Option<Option<String>>| {
                    v.flatten().and_then(|s| s.parse::<i64>().ok()).unwrap_or(0)
                };
                let field_type = int(cells.next());
                let sub_type = int(cells.next());
                let scale = int(cells.next());
                Some((name, FieldKind::from_firebird(field_type, sub_type, scale)))
            })
            .collect())
    }

    fn fetch_rows_sync(&self, table: &str, columns: &[&str]) -> Result<Vec<Vec<SqlValue>>> {
        let kinds = self.load_field_kinds_sync(table)?;
        if kinds.is_empty() {
            return Err(MigrateError::Source(format!("Table {} not found", table)));
        }

        let col_kinds: Vec<FieldKind> = columns
            .iter()
            .map(|col| {
                let col = col.to_uppercase();
                kinds
                    .iter()
                    .find(|(name, _)| *name == col)
                    .map(|(_, kind)| *kind)
                    .ok_or_else(|| {
                        MigrateError::Source(format!("Column {}.{} not found", table, col))
                    })
            })
            .collect::<Result<_>>()?;

        let select_list = columns
            .iter()
            .map(|c| quote_ident(&c.to_uppercase()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {} FROM {}", select_list, quote_ident(&table.to_uppercase()));

        let (batch_rows, max_text_bytes) = fetch_limits(&col_kinds);
        let rows = self.execute_query(&sql, batch_rows, max_text_bytes)?;
        rows.into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&col_kinds)
                    .map(|(cell, kind)| match cell {
                        None => Ok(SqlValue::Null),
                        Some(bytes) => match kind {
                            FieldKind::Binary => decode_binary(&bytes),
                            _ => Ok(convert_text_to_sqlvalue(self.decode(&bytes), *kind)),
                        },
                    })
                    .collect()
            })
            .collect()
    }
}

#[async_trait]
impl SourceReader for FirebirdSource {
    async fn fetch_rows(&self, table: &str, columns: &[&str]) -> Result<Vec<Vec<SqlValue>>> {
        let _lock = self.conn_mutex.lock().await;
        self.fetch_rows_sync(table, columns)
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let _lock = self.conn_mutex.lock().await;
        let rows = self.execute_query(
            "SELECT TRIM(RDB$RELATION_NAME) FROM RDB$RELATIONS \
             WHERE COALESCE(RDB$SYSTEM_FLAG, 0) = 0 AND RDB$VIEW_BLR IS NULL \
             ORDER BY RDB$RELATION_NAME",
            FETCH_BATCH_ROWS,
            MAX_TEXT_BYTES,
        )?;
        Ok(first_column(rows))
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<String>> {
        let _lock = self.conn_mutex.lock().await;
        let sql = format!(
            "SELECT TRIM(RDB$FIELD_NAME) FROM RDB$RELATION_FIELDS \
             WHERE RDB$RELATION_NAME = '{}' ORDER BY RDB$FIELD_POSITION",
            escape_sql_string(&table.to_uppercase())
        );
        let columns = first_column(self.execute_query(&sql, FETCH_BATCH_ROWS, MAX_TEXT_BYTES)?);
        if columns.is_empty() {
            return Err(MigrateError::Source(format!("Table {} not found", table)));
        }
        Ok(columns)
    }
}

fn first_column(rows: Vec<Vec<Option<Vec<u8>>>>) -> Vec<String> {
    rows.into_iter()
        .filter_map(|row| row.into_iter().next().flatten())
        .map(|b| String::from_utf8_lossy(&b).trim().to_string())
        .collect()
}

/// Resolve a Firebird charset name to a decoder, UTF-8 when unknown.
fn encoding_for_charset(charset: &str) -> &'static Encoding {
    let label = charset.trim().replace('_', "-");
    match Encoding::for_label(label.as_bytes()) {
        Some(encoding) => encoding,
        None => {
            warn!("Unknown source charset '{}', decoding as UTF-8", charset);
            UTF_8
        }
    }
}

fn fetch_error(error: odbc_api::Error, max_text_bytes: usize, sql: &str) -> MigrateError {
    match error {
        odbc_api::Error::TooLargeValueForBuffer { indicator, buffer_index } => {
            MigrateError::Source(format!(
                "Value in column {} is larger than the {} byte fetch buffer ({}) - SQL: {}",
                buffer_index + 1,
                max_text_bytes,
                indicator.map_or_else(|| "size unknown".to_string(), |n| format!("{} bytes", n)),
                sql
            ))
        }
        other => MigrateError::Source(format!("Failed to fetch rows: {}", other)),
    }
}

/// ODBC returns binary blobs as hex text.
fn decode_binary(bytes: &[u8]) -> Result<SqlValue> {
    let text = String::from_utf8_lossy(bytes);
    let hex_str = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(&text);
    hex::decode(hex_str.trim())
        .map(SqlValue::Bytes)
        .map_err(|e| MigrateError::Source(format!("Malformed binary blob from driver: {}", e)))
}

/// Convert a decoded text value from ODBC to SqlValue based on the column kind.
fn convert_text_to_sqlvalue(s: String, kind: FieldKind) -> SqlValue {
    match kind {
        FieldKind::Integer => s
            .trim()
            .parse::<i64>()
            .map(SqlValue::I64)
            .unwrap_or(SqlValue::Null),
        FieldKind::Decimal => Decimal::from_str_exact(s.trim())
            .or_else(|_| s.trim().parse::<Decimal>())
            .map(SqlValue::Decimal)
            .unwrap_or(SqlValue::Null),
        FieldKind::Float => s
            .trim()
            .parse::<f64>()
            .map(SqlValue::F64)
            .unwrap_or(SqlValue::Null),
        FieldKind::Date => chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(SqlValue::Date)
            .unwrap_or(SqlValue::Null),
        FieldKind::Timestamp => {
            let s = s.trim();
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                .map(SqlValue::DateTime)
                .unwrap_or(SqlValue::Null)
        }
        FieldKind::Text | FieldKind::LongText | FieldKind::Binary => SqlValue::Text(s),
    }
}
