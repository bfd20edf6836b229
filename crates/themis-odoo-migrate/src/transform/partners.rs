//! Companies (`BEDRIJF`) and contacts (`ADRESBOEK`), both Odoo partners.

use std::collections::HashMap;

use serde_json::Value as Json;

use super::{
    datetime_json, content_text, markup_newlines, normalize_vat, resolve_country,
    text_json, translate_language, Prepared,
};
use crate::core::{Entity, IdMapping, MigrationContext, Record, Row, DATE_FORMAT};

/// Fields `create_from_themis` takes as raw content.
const CONTENT_FIELDS: [&str; 4] = ["email", "email2", "email3", "comment"];

/// The two kinds of Themis party record that become an Odoo partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partner {
    Company,
    Contact,
}

/// A bank account to create once its partner exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankAccount {
    pub acc_number: String,
    pub partner_source_id: Option<i64>,
}

/// Prepared partners plus their bank accounts and Themis categories.
#[derive(Debug, Clone, Default)]
pub struct PartnerBatch {
    pub prepared: Prepared,
    pub bank_accounts: Vec<BankAccount>,
    /// Themis address category per source partner.
    pub categories: HashMap<i64, Option<i64>>,
}

impl Partner {
    pub fn entity(self) -> Entity {
        match self {
            Partner::Company => Entity::Companies,
            Partner::Contact => Entity::Contacts,
        }
    }

    /// Build partner payloads.
    pub fn prepare(self, rows: Vec<Row>, ctx: &MigrationContext) -> PartnerBatch {
        let mut batch = PartnerBatch::default();

        for mut row in rows {
            let id = row.take_id("id");

            if let Some(acc_number) = row.take_text("bank_number").filter(|n| !n.trim().is_empty()) {
                batch.bank_accounts.push(BankAccount {
                    acc_number,
                    partner_source_id: id,
                });
            }

            let category = row.take_id("category_id");
            if let Some(id) = id {
                batch.categories.insert(id, category);
            }

            let country_code = row.take_text("country_code");
            let language = translate_language(row.take_text("language"));
            let create_uid = ctx.users.resolve(row.take_id("create_uid"));
            let create_date = row.take_datetime("create_date");
            let write_date = row.take_datetime("write_date");
            let content: Vec<(&str, Option<String>)> = CONTENT_FIELDS
                .iter()
                .map(|key| (*key, row.take_text(key)))
                .collect();

            let mut record = match self {
                Partner::Company => {
                    let vat = normalize_vat(row.take_text("vat"), country_code.as_deref());
                    let mut record = row.into_record();
                    record.insert("vat".into(), text_json(vat));
                    record.insert("is_company".into(), Json::Bool(true));
                    record
                }
                Partner::Contact => contact_record(row, ctx),
            };

            record.insert(
                "country_id".into(),
                resolve_country(&ctx.countries, country_code.as_deref()).to_json(),
            );
            record.insert("language".into(), text_json(language));
            record.insert("create_uid".into(), create_uid.to_json());
            record.insert("create_date".into(), datetime_json(create_date));
            record.insert("write_date".into(), datetime_json(write_date));
            for (key, value) in content {
                let value = match key {
                    "comment" => value.map(|c| markup_newlines(&c)),
                    _ => value,
                };
                record.insert(key.into(), content_text(value.as_deref()));
            }

            batch.prepared.source_ids.push(id);
            batch.prepared.records.push(record);
        }

        batch
    }
}

/// Contact-specific fields: Belgian identity fields and the parent company.
fn contact_record(mut row: Row, ctx: &MigrationContext) -> Record {
    let manual_zip = row.take_text("manualzip");
    let zip = row.take_text("zip").filter(|z| !z.is_empty()).or(manual_zip);
    let street = row.take_text("street");
    let city = row.take_text("city");
    let lastname = row.take_text("lastname");
    let firstname = row.take_text("firstname");
    let gender = row.take_text("gender");
    let date_of_birth = row.take_date("dateofbirth");
    let place_of_birth = row.take_text("placeofbirth");
    let nationality = row.take_text("nationality");
    let national_number = row.take_text("national_number");
    let parent = ctx.companies.resolve(row.take_id("parent_id"));

    let mut record = row.into_record();
    record.insert("zip".into(), text_json(zip.clone()));
    record.insert("street".into(), text_json(street.clone()));
    record.insert("city".into(), text_json(city.clone()));
    record.insert("be_zip".into(), text_json(zip));
    record.insert("be_streetandnumber".into(), text_json(street));
    record.insert("be_municipality".into(), text_json(city));
    record.insert("be_lastname".into(), text_json(lastname));
    record.insert("be_firstname".into(), text_json(firstname));
    record.insert("be_gender".into(), text_json(gender));
    record.insert(
        "be_dateofbirth".into(),
        text_json(date_of_birth.map(|d| d.format(DATE_FORMAT).to_string())),
    );
    record.insert("be_placeofbirth".into(), text_json(place_of_birth));
    record.insert("be_nationality".into(), text_json(nationality));
    record.insert("be_national_number".into(), text_json(national_number));
    record.insert("parent_id".into(), parent.to_json());
    record
}

/// Bank account payloads, partner ids resolved through the new mapping.
pub fn bank_records(accounts: &[BankAccount], partners: &IdMapping) -> Vec<Record> {
    accounts
        .iter()
        .map(|account| {
            let mut record = Record::new();
            record.insert("acc_number".into(), Json::String(account.acc_number.clone()));
            record.insert(
                "partner_id".into(),
                partners.resolve(account.partner_source_id).to_json(),
            );
            record
        })
        .collect()
}

/// Category lookup used by parties: the partner's own Themis category.
pub fn partner_category(categories: &HashMap<i64, Option<i64>>, partner: Option<i64>) -> Option<i64> {
    MigrationContext::side(categories, partner)
}
