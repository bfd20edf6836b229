//! Cases (`DOSSIER`) and the plain lookup tables.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde_json::Value as Json;

use super::{datetime_json, Prepared};
use crate::core::{MigrationContext, Row, SqlValue};

/// Prepared cases plus the side tables documents and billing read.
#[derive(Debug, Clone, Default)]
pub struct CaseBatch {
    pub prepared: Prepared,
    /// Active flag per source case.
    pub active: HashMap<i64, bool>,
    /// Default hourly tariff per source case.
    pub tariffs: HashMap<i64, Option<Decimal>>,
}

/// Lookup tables (`{id, name}`) only lose their id.
pub fn prepare_lookup(rows: Vec<Row>) -> Prepared {
    let mut prepared = Prepared::default();
    for mut row in rows {
        prepared.source_ids.push(row.take_id("id"));
        prepared.records.push(row.into_record());
    }
    prepared
}

/// Build case payloads.
///
/// The invoice partner is the resolved invoice company, else the resolved
/// invoice contact. A case is active only when its archived flag is `F`;
/// a NULL flag archives it.
pub fn prepare_cases(rows: Vec<Row>, ctx: &MigrationContext) -> CaseBatch {
    let mut batch = CaseBatch::default();

    for mut row in rows {
        let id = row.take_id("id");
        let invoice_company = ctx.companies.resolve(row.take_id("invoice_company_id"));
        let invoice_contact = ctx.contacts.resolve(row.take_id("invoice_contact_id"));
        let user = ctx.users.resolve(row.take_id("user_id"));
        let active = is_unarchived(row.take("archived"));
        let category = ctx.case_categories.resolve(row.take_id("category_id"));
        let create_uid = ctx.users.resolve(row.take_id("create_uid"));
        let create_date = row.take_datetime("create_date");
        let write_date = row.take_datetime("write_date");
        let tariff = row.take_decimal("tariff");

        if let Some(id) = id {
            batch.active.insert(id, active);
            batch.tariffs.insert(id, tariff);
        }

        let mut record = row.into_record();
        record.insert("partner_id".into(), invoice_company.or(invoice_contact).to_json());
        record.insert("user_id".into(), user.to_json());
        record.insert("active".into(), Json::Bool(active));
        record.insert("case_category_ids".into(), category.to_replace_command());
        record.insert("create_uid".into(), create_uid.to_json());
        record.insert("create_date".into(), datetime_json(create_date));
        record.insert("write_date".into(), datetime_json(write_date));

        batch.prepared.source_ids.push(id);
        batch.prepared.records.push(record);
    }

    batch
}

fn is_unarchived(flag: SqlValue) -> bool {
    match flag {
        SqlValue::Bool(archived) => !archived,
        SqlValue::Text(s) => s.trim().eq_ignore_ascii_case("f"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> MigrationContext {
        let mut ctx = MigrationContext::new();
        ctx.companies.insert(1, 100);
        ctx.contacts.insert(2, 200);
        ctx.users.insert(3, 300);
        ctx.case_categories.insert(5, 500);
        ctx
    }

    #[test]
    fn test_invoice_company_beats_contact() {
        let rows = vec![
            Row::new()
                .with("id", 10i64)
                .with("invoice_company_id", 1i64)
                .with("invoice_contact_id", 2i64),
            Row::new()
                .with("id", 11i64)
                .with("invoice_company_id", 42i64)
                .with("invoice_contact_id", 2i64),
            Row::new().with("id", 12i64),
        ];
        let batch = prepare_cases(rows, &ctx());
        assert_eq!(batch.prepared.records[0]["partner_id"], json!(100));
        assert_eq!(batch.prepared.records[1]["partner_id"], json!(200));
        assert_eq!(batch.prepared.records[2]["partner_id"], json!(false));
    }

    #[test]
    fn test_archived_and_category() {
        let rows = vec![
            Row::new()
                .with("id", 10i64)
                .with("archived", "T")
                .with("category_id", 5i64)
                .with("tariff", SqlValue::Null),
            Row::new()
                .with("id", 11i64)
                .with("archived", "F")
                .with("category_id", 6i64)
                .with("tariff", 90i64),
            Row::new()
                .with("id", 13i64)
                .with("archived", SqlValue::Null),
        ];
        let batch = prepare_cases(rows, &ctx());
        assert_eq!(batch.active.get(&10), Some(&false));
        assert_eq!(batch.active.get(&11), Some(&true));
        assert_eq!(batch.active.get(&13), Some(&false));
        assert_eq!(batch.prepared.records[2]["active"], json!(false));
        assert_eq!(batch.prepared.records[0]["active"], json!(false));
        assert_eq!(
            batch.prepared.records[0]["case_category_ids"],
            json!([[6, 0, [500]]])
        );
        assert_eq!(batch.prepared.records[1]["case_category_ids"], json!(false));
        assert_eq!(batch.tariffs.get(&10), Some(&None));
        assert_eq!(batch.tariffs.get(&11), Some(&Some(Decimal::from(90))));
        assert!(!batch.prepared.records[0].contains_key("archived"));
        assert!(!batch.prepared.records[0].contains_key("tariff"));
    }

    #[test]
    fn test_lookup_drops_id() {
        let prepared = prepare_lookup(vec![Row::new().with("id", 1i64).with("name", "Civiel")]);
        assert_eq!(prepared.source_ids, vec![Some(1)]);
        assert_eq!(prepared.records[0].len(), 1);
    }
}
