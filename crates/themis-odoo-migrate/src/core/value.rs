//! Source value types and the attribute rows built from them.
//!
//! A [`Row`] is one source record after column renaming: destination
//! attribute names mapped to raw source values. Transformers take typed
//! fields out of a row and hand the remainder to [`Row::into_record`],
//! which renders it for the destination wire.

use std::collections::BTreeMap;

use base64::{engine::general_purpose, Engine as _};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Wire format for timestamps sent to the destination.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Wire format for calendar dates sent to the destination.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A destination payload: attribute name to JSON value.
pub type Record = serde_json::Map<String, Json>;

/// Raw value read from the source database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    /// SQL NULL.
    Null,

    /// Boolean value.
    Bool(bool),

    /// Any integer column (smallint, integer, bigint).
    I64(i64),

    /// Floating point column.
    F64(f64),

    /// Exact numeric (numeric, decimal).
    Decimal(Decimal),

    /// Character data.
    Text(String),

    /// Binary large object contents.
    Bytes(Vec<u8>),

    /// Date without time component.
    Date(NaiveDate),

    /// Timestamp without zone.
    DateTime(NaiveDateTime),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Interpret the value as an identifier.
    pub fn as_id(&self) -> Option<i64> {
        match self {
            SqlValue::I64(v) => Some(*v),
            SqlValue::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            SqlValue::F64(f) if f.fract() == 0.0 => Some(*f as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interpret the value as an exact amount.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            SqlValue::I64(v) => Some(Decimal::from(*v)),
            SqlValue::Decimal(d) => Some(*d),
            SqlValue::F64(f) => Decimal::try_from(*f).ok(),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interpret the value as text. Binary data is not coerced.
    pub fn as_text(&self) -> Option<String> {
        match self {
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::I64(v) => Some(v.to_string()),
            SqlValue::F64(v) => Some(v.to_string()),
            SqlValue::Decimal(v) => Some(v.to_string()),
            _ => None,
        }
    }

    /// Interpret the value as a calendar date.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            SqlValue::Date(d) => Some(*d),
            SqlValue::DateTime(dt) => Some(dt.date()),
            SqlValue::Text(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok(),
            _ => None,
        }
    }

    /// Interpret the value as a timestamp.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            SqlValue::DateTime(dt) => Some(*dt),
            SqlValue::Date(d) => Some(d.and_time(NaiveTime::MIN)),
            SqlValue::Text(s) => {
                let s = s.trim();
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, DATETIME_FORMAT))
                    .ok()
            }
            _ => None,
        }
    }

    /// Render for the destination wire.
    pub fn to_json(&self) -> Json {
        match self {
            SqlValue::Null => Json::Null,
            SqlValue::Bool(b) => Json::Bool(*b),
            SqlValue::I64(v) => Json::from(*v),
            SqlValue::F64(v) => Json::from(*v),
            SqlValue::Decimal(d) => d.to_f64().map(Json::from).unwrap_or(Json::Null),
            SqlValue::Text(s) => Json::String(s.clone()),
            SqlValue::Bytes(b) => Json::String(general_purpose::STANDARD.encode(b)),
            SqlValue::Date(d) => Json::String(d.format(DATE_FORMAT).to_string()),
            SqlValue::DateTime(dt) => Json::String(dt.format(DATETIME_FORMAT).to_string()),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One source record keyed by destination attribute names.
///
/// Missing attributes read as NULL, so transformers can treat optional
/// columns uniformly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: BTreeMap<String, SqlValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and fixtures.
    pub fn with(mut self, key: &str, value: impl Into<SqlValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<SqlValue>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&SqlValue> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Remove an attribute, NULL when absent.
    pub fn take(&mut self, key: &str) -> SqlValue {
        self.fields.remove(key).unwrap_or(SqlValue::Null)
    }

    pub fn take_id(&mut self, key: &str) -> Option<i64> {
        self.take(key).as_id()
    }

    pub fn take_decimal(&mut self, key: &str) -> Option<Decimal> {
        self.take(key).as_decimal()
    }

    pub fn take_text(&mut self, key: &str) -> Option<String> {
        self.take(key).as_text()
    }

    pub fn take_date(&mut self, key: &str) -> Option<NaiveDate> {
        self.take(key).as_date()
    }

    pub fn take_datetime(&mut self, key: &str) -> Option<NaiveDateTime> {
        self.take(key).as_datetime()
    }

    /// Remove a Themis `T`/`F` flag column as a boolean. Anything other than
    /// `T` (or a true boolean) is false.
    pub fn take_flag(&mut self, key: &str) -> bool {
        match self.take(key) {
            SqlValue::Bool(b) => b,
            SqlValue::Text(s) => s.trim().eq_ignore_ascii_case("t"),
            _ => false,
        }
    }

    /// Render the remaining attributes as a destination record.
    pub fn into_record(self) -> Record {
        self.fields
            .into_iter()
            .map(|(k, v)| (k, v.to_json()))
            .collect()
    }
}

impl FromIterator<(String, SqlValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_take_missing_is_null() {
        let mut row = Row::new().with("name", "ACME");
        assert_eq!(row.take("missing"), SqlValue::Null);
        assert_eq!(row.take_text("name").as_deref(), Some("ACME"));
        assert!(row.is_empty());
    }

    #[test]
    fn test_take_flag() {
        let mut row = Row::new()
            .with("a", "T")
            .with("b", "F")
            .with("c", SqlValue::Null)
            .with("d", SqlValue::Bool(true));
        assert!(row.take_flag("a"));
        assert!(!row.take_flag("b"));
        assert!(!row.take_flag("c"));
        assert!(row.take_flag("d"));
    }

    #[test]
    fn test_decimal_keeps_zero_distinct_from_null() {
        let mut row = Row::new().with("zero", 0i64).with("none", SqlValue::Null);
        assert_eq!(row.take_decimal("zero"), Some(dec("0")));
        assert_eq!(row.take_decimal("none"), None);
    }

    #[test]
    fn test_to_json_formats_dates() {
        let d = NaiveDate::from_ymd_opt(2021, 3, 4).unwrap();
        let dt = d.and_hms_opt(9, 5, 7).unwrap();
        assert_eq!(SqlValue::Date(d).to_json(), Json::from("2021-03-04"));
        assert_eq!(
            SqlValue::DateTime(dt).to_json(),
            Json::from("2021-03-04 09:05:07")
        );
        assert_eq!(SqlValue::Null.to_json(), Json::Null);
    }

    #[test]
    fn test_as_id_from_various_types() {
        assert_eq!(SqlValue::I64(7).as_id(), Some(7));
        assert_eq!(SqlValue::Text(" 12 ".into()).as_id(), Some(12));
        assert_eq!(SqlValue::Decimal(dec("5")).as_id(), Some(5));
        assert_eq!(SqlValue::Null.as_id(), None);
    }

    #[test]
    fn test_into_record() {
        let record = Row::new().with("name", "X").with("zip", SqlValue::Null).into_record();
        assert_eq!(record.get("name"), Some(&Json::from("X")));
        assert_eq!(record.get("zip"), Some(&Json::Null));
    }
}
