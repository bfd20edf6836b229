//! Per-run migration context.
//!
//! Holds every identifier mapping and side table produced by the steps that
//! already ran. The orchestrator owns one context per run and hands it to
//! each step; steps only ever add to it.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::mapping::IdMapping;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationContext {
    pub users: IdMapping,
    pub companies: IdMapping,
    pub contacts: IdMapping,
    pub case_categories: IdMapping,
    pub cases: IdMapping,
    pub party_categories: IdMapping,
    pub timesheet_types: IdMapping,
    pub cost_types: IdMapping,
    pub document_categories: IdMapping,

    /// Destination country id by ISO code.
    pub countries: HashMap<String, i64>,

    /// Default hourly tariff per source user.
    pub user_tariffs: HashMap<i64, Option<Decimal>>,
    /// Default hourly tariff per source case.
    pub case_tariffs: HashMap<i64, Option<Decimal>>,
    /// Active flag per source case.
    pub case_active: HashMap<i64, bool>,
    /// Themis address category per source company.
    pub company_categories: HashMap<i64, Option<i64>>,
    /// Themis address category per source contact.
    pub contact_categories: HashMap<i64, Option<i64>>,
    /// List price per source timesheet type.
    pub timesheet_type_prices: HashMap<i64, Option<Decimal>>,
    /// List price per source cost type.
    pub cost_type_prices: HashMap<i64, Option<Decimal>>,
}

impl MigrationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a side table entry, flattening "unknown key" and "stored as
    /// absent" into `None`.
    pub fn side<V: Copy>(table: &HashMap<i64, Option<V>>, key: Option<i64>) -> Option<V> {
        key.and_then(|k| table.get(&k).copied().flatten())
    }
}
