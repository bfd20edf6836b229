//! Case descriptions (`DOSSIEROPMERKING`, labelled by `OPMERKINGTYPE`).

use std::collections::HashMap;

use serde_json::{json, Map, Value as Json};

use super::markup_newlines;
use super::rtf::{decode_cp1252, rtf_to_text};
use crate::core::{IdMapping, Row, SqlValue};

/// Description type labels by source type id.
pub fn description_labels(rows: Vec<Row>) -> HashMap<i64, String> {
    rows.into_iter()
        .filter_map(|mut row| {
            let id = row.take_id("id")?;
            let name = row.take_text("name")?;
            Some((id, name))
        })
        .collect()
}

/// Build the write map: destination case id (as a string) to
/// `{"description": text}`.
///
/// Each note is decoded, stripped of RTF, prefixed by its type label and
/// appended to the text already gathered for the same destination case, in
/// row order. Notes on unmapped cases and empty notes are skipped.
pub fn prepare_descriptions(
    rows: Vec<Row>,
    labels: &HashMap<i64, String>,
    cases: &IdMapping,
) -> Map<String, Json> {
    let mut texts: Vec<(i64, String)> = Vec::new();
    let mut positions: HashMap<i64, usize> = HashMap::new();

    for mut row in rows {
        let Some(case_id) = cases.resolve(row.take_id("case_id")).id() else {
            continue;
        };
        let raw = match row.take("description") {
            SqlValue::Bytes(bytes) => decode_cp1252(&bytes),
            other => match other.as_text() {
                Some(text) => text,
                None => continue,
            },
        };
        if raw.is_empty() {
            continue;
        }

        let label = row
            .take_id("type_id")
            .and_then(|type_id| labels.get(&type_id))
            .filter(|label| !label.is_empty())
            .map(|label| format!("{}:", label))
            .unwrap_or_default();
        let text = format!(
            "{}<br>\n{}<br>\n",
            label,
            markup_newlines(&rtf_to_text(&raw))
        );

        match positions.get(&case_id) {
            Some(&pos) => texts[pos].1.push_str(&text),
            None => {
                positions.insert(case_id, texts.len());
                texts.push((case_id, text));
            }
        }
    }

    texts
        .into_iter()
        .map(|(case_id, text)| (case_id.to_string(), json!({ "description": text })))
        .collect()
}
