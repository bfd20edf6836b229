//! Timesheet and cost types (`PRESTATIECODE`, `KOSTENCODE`), timesheets
//! (`PRESTATIE`) and costs (`KOST`).

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde_json::Value as Json;

use super::{decimal_json, text_json, Prepared};
use crate::core::price::{cost_unit_price, timesheet_unit_price};
use crate::core::{MigrationContext, Record, Row, DATE_FORMAT};

/// Which product family a billing type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingKind {
    Timesheet,
    Cost,
}

impl BillingKind {
    fn service_policy(self) -> &'static str {
        match self {
            BillingKind::Timesheet => "delivered_timesheet",
            BillingKind::Cost => "ordered_prepaid",
        }
    }
}

/// Prepared billing types plus their list prices.
#[derive(Debug, Clone, Default)]
pub struct TypeBatch {
    pub prepared: Prepared,
    pub prices: HashMap<i64, Option<Decimal>>,
}

/// Build product payloads for timesheet or cost types.
pub fn prepare_types(rows: Vec<Row>, kind: BillingKind) -> TypeBatch {
    let mut batch = TypeBatch::default();
    for mut row in rows {
        let id = row.take_id("id");
        let list_price = row.take_decimal("list_price");
        if let Some(id) = id {
            batch.prices.insert(id, list_price);
        }

        let mut record = row.into_record();
        record.insert(
            "list_price".into(),
            list_price.map(decimal_json).unwrap_or(Json::Null),
        );
        record.insert("detailed_type".into(), Json::from("service"));
        record.insert("service_policy".into(), Json::from(kind.service_policy()));

        batch.prepared.source_ids.push(id);
        batch.prepared.records.push(record);
    }
    batch
}

/// Per-case overrides keyed by `(source case, source user or type)`.
///
/// Rows missing either key are ignored.
pub fn case_overrides(rows: Vec<Row>, other_key: &str) -> HashMap<(i64, i64), Option<Decimal>> {
    rows.into_iter()
        .filter_map(|mut row| {
            let case = row.take_id("case_id")?;
            let other = row.take_id(other_key)?;
            Some(((case, other), row.take_decimal("price_unit")))
        })
        .collect()
}

fn override_price(
    overrides: &HashMap<(i64, i64), Option<Decimal>>,
    case: Option<i64>,
    other: Option<i64>,
) -> Option<Decimal> {
    match (case, other) {
        (Some(case), Some(other)) => overrides.get(&(case, other)).copied().flatten(),
        _ => None,
    }
}

fn date_json(row: &mut Row) -> Json {
    text_json(row.take_date("date").map(|d| d.format(DATE_FORMAT).to_string()))
}

/// Build timesheet payloads.
///
/// `unit_amount` is the duration in hours. The unit price follows the
/// timesheet fallback chain.
pub fn prepare_timesheets(
    rows: Vec<Row>,
    case_user_tariffs: &HashMap<(i64, i64), Option<Decimal>>,
    ctx: &MigrationContext,
) -> Vec<Record> {
    rows.into_iter()
        .map(|mut row| {
            let type_id = row.take_id("type_id");
            let case_id = row.take_id("case_id");
            let user_id = row.take_id("user_id");
            let minutes = row.take_decimal("minutes").unwrap_or(Decimal::ZERO);
            let price_unit = timesheet_unit_price(
                row.take_decimal("price_unit"),
                override_price(case_user_tariffs, case_id, user_id),
                MigrationContext::side(&ctx.user_tariffs, user_id),
                MigrationContext::side(&ctx.case_tariffs, case_id),
                MigrationContext::side(&ctx.timesheet_type_prices, type_id),
            );
            let date = date_json(&mut row);
            let billable = row.take_flag("billable");
            let billed = row.take_flag("billed");

            let mut record = row.into_record();
            record.insert("type_id".into(), ctx.timesheet_types.resolve(type_id).to_json());
            record.insert("case_id".into(), ctx.cases.resolve(case_id).to_json());
            record.insert("user_id".into(), ctx.users.resolve(user_id).to_json());
            record.insert("unit_amount".into(), decimal_json(minutes / Decimal::from(60)));
            record.insert("price_unit".into(), decimal_json(price_unit));
            record.insert("date".into(), date);
            record.insert("billable".into(), Json::Bool(billable));
            record.insert("billed".into(), Json::Bool(billed));
            record
        })
        .collect()
}

/// Build cost payloads.
///
/// `amount` is the quantity and `price` the row total; both are sent as
/// read. The unit price follows the cost fallback chain.
pub fn prepare_costs(
    rows: Vec<Row>,
    case_type_prices: &HashMap<(i64, i64), Option<Decimal>>,
    ctx: &MigrationContext,
) -> Vec<Record> {
    rows.into_iter()
        .map(|mut row| {
            let type_id = row.take_id("type_id");
            let case_id = row.take_id("case_id");
            let quantity = row.get("amount").and_then(|v| v.as_decimal());
            let total = row.get("price").and_then(|v| v.as_decimal());
            let price_unit = cost_unit_price(
                total,
                quantity,
                row.take_decimal("price_unit"),
                override_price(case_type_prices, case_id, type_id),
                MigrationContext::side(&ctx.cost_type_prices, type_id),
            );
            let date = date_json(&mut row);
            let billable = row.take_flag("billable");
            let billed = row.take_flag("billed");

            let mut record = row.into_record();
            record.insert("type_id".into(), ctx.cost_types.resolve(type_id).to_json());
            record.insert("case_id".into(), ctx.cases.resolve(case_id).to_json());
            record.insert("price_unit".into(), decimal_json(price_unit));
            record.insert("date".into(), date);
            record.insert("billable".into(), Json::Bool(billable));
            record.insert("billed".into(), Json::Bool(billed));
            record
        })
        .collect()
}
