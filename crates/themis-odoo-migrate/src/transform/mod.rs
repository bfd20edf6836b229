//! Per-entity value transformers.
//!
//! Each submodule turns the extracted rows of one entity type into
//! destination payloads, substituting foreign keys through the
//! [`MigrationContext`](crate::core::MigrationContext) and returning the
//! side tables later steps need. Transformers are pure: no I/O, no errors.
//! Data-quality problems are logged and the offending value is dropped or
//! kept as is.

pub mod billing;
pub mod cases;
pub mod descriptions;
pub mod documents;
pub mod parties;
pub mod partners;
pub mod rtf;
pub mod users;

use std::collections::HashMap;

use chrono::NaiveDateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value as Json;
use tracing::info;

use crate::core::{Ref, DATETIME_FORMAT};

/// Source ids taken out of the rows, in row order, next to the payloads
/// built from them.
#[derive(Debug, Clone, Default)]
pub struct Prepared {
    pub source_ids: Vec<Option<i64>>,
    pub records: Vec<crate::core::Record>,
}

impl Prepared {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Themis language codes and their Odoo locale.
const LANGUAGES: &[(&str, &str)] = &[
    ("N", "nl_BE"),
    ("NL", "nl_BE"),
    ("F", "fr_BE"),
    ("FR", "fr_BE"),
    ("E", "en_GB"),
    ("EN", "en_GB"),
    ("D", "de_DE"),
    ("DE", "de_DE"),
];

/// Translate a Themis language code to an Odoo locale.
///
/// Unknown codes are logged and passed through unchanged.
pub fn translate_language(code: Option<String>) -> Option<String> {
    let code = code?;
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return None;
    }
    match LANGUAGES
        .iter()
        .find(|(themis, _)| themis.eq_ignore_ascii_case(trimmed))
    {
        Some((_, locale)) => Some((*locale).to_string()),
        None => {
            info!("Language not found: {}", code);
            Some(code)
        }
    }
}

/// Resolve an ISO country code against the destination country table.
pub fn resolve_country(countries: &HashMap<String, i64>, code: Option<&str>) -> Ref {
    match code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => match countries.get(code) {
            Some(id) => Ref::some(*id),
            None => {
                info!("Country not found: {}", code);
                Ref::NONE
            }
        },
        None => Ref::NONE,
    }
}

/// Prefix a numeric VAT number with the country code.
pub fn normalize_vat(vat: Option<String>, country_code: Option<&str>) -> Option<String> {
    let vat = vat?;
    match country_code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) if vat.starts_with(|c: char| c.is_ascii_digit()) => {
            Some(format!("{}{}", code, vat))
        }
        _ => Some(vat),
    }
}

/// `\n` becomes `<br>\n` so line breaks survive in HTML fields.
pub fn markup_newlines(text: &str) -> String {
    text.replace('\n', "<br>\n")
}

/// Text for a field `create_from_themis` takes as raw content. JSON-RPC has
/// no bytes type, so the text goes out as a plain UTF-8 string and the server
/// stores it without decoding. Absent text is sent as empty content.
pub fn content_text(text: Option<&str>) -> Json {
    Json::String(text.unwrap_or("").to_string())
}

pub fn datetime_json(value: Option<NaiveDateTime>) -> Json {
    match value {
        Some(dt) => Json::String(dt.format(DATETIME_FORMAT).to_string()),
        None => Json::Null,
    }
}

pub fn text_json(value: Option<String>) -> Json {
    value.map(Json::String).unwrap_or(Json::Null)
}

pub fn decimal_json(value: Decimal) -> Json {
    value.to_f64().map(Json::from).unwrap_or(Json::Null)
}
