//! Parties (`DOSSIERADRESBOEK`): links between a case and a partner.

use crate::core::{MigrationContext, Record, Ref, Row};

use super::partners::partner_category;

/// Build party payloads.
///
/// The partner is the resolved contact, else the resolved company. The
/// category is the explicit party category when the row has one, otherwise
/// the Themis category of whichever partner was chosen.
pub fn prepare_parties(rows: Vec<Row>, ctx: &MigrationContext) -> Vec<Record> {
    rows.into_iter()
        .map(|mut row| {
            let company_id = row.take_id("company_id");
            let contact_id = row.take_id("contact_id");
            let explicit_category = row.take_id("category_id");
            let case = ctx.cases.resolve(row.take_id("case_id"));

            let contact = ctx.contacts.resolve(contact_id);
            let company = ctx.companies.resolve(company_id);
            let (partner, mut category) = if contact.is_set() {
                let themis = partner_category(&ctx.contact_categories, contact_id);
                (contact, ctx.party_categories.resolve(themis))
            } else if company.is_set() {
                let themis = partner_category(&ctx.company_categories, company_id);
                (company, ctx.party_categories.resolve(themis))
            } else {
                (Ref::NONE, Ref::NONE)
            };
            if explicit_category.is_some() {
                category = ctx.party_categories.resolve(explicit_category);
            }

            let mut record = row.into_record();
            record.insert("partner_id".into(), partner.to_json());
            record.insert("case_id".into(), case.to_json());
            record.insert("party_category_ids".into(), category.to_replace_command());
            record
        })
        .collect()
}
