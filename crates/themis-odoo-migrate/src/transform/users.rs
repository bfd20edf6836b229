//! Users (`GEBRUIKER`).

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde_json::Value as Json;

use super::Prepared;
use crate::core::Row;

/// Prepared users plus what the later steps need from them.
#[derive(Debug, Clone, Default)]
pub struct UserBatch {
    pub prepared: Prepared,
    /// Source ids of users whose active flag is not `T`.
    pub inactive: Vec<Option<i64>>,
    /// Default hourly tariff per source user.
    pub tariffs: HashMap<i64, Option<Decimal>>,
}

/// Build user payloads.
///
/// The login is the email address (or `login`); repeated logins get a
/// counter suffix: `a@x`, `a@x1`, `a@x2`.
pub fn prepare_users(rows: Vec<Row>) -> UserBatch {
    let mut batch = UserBatch::default();
    let mut seen_logins: HashMap<String, usize> = HashMap::new();

    for mut row in rows {
        let id = row.take_id("id");
        let active = row.take_flag("active");
        let tariff = row.take_decimal("tariff");

        let base = row
            .get("email")
            .and_then(|v| v.as_text())
            .filter(|email| !email.is_empty())
            .unwrap_or_else(|| "login".to_string());
        let login = match seen_logins.get_mut(&base) {
            Some(count) => {
                let login = format!("{}{}", base, count);
                *count += 1;
                login
            }
            None => {
                seen_logins.insert(base.clone(), 1);
                base
            }
        };

        if !active {
            batch.inactive.push(id);
        }
        if let Some(id) = id {
            batch.tariffs.insert(id, tariff);
        }

        let mut record = row.into_record();
        record.insert("login".into(), Json::String(login));
        batch.prepared.source_ids.push(id);
        batch.prepared.records.push(record);
    }

    batch
}
