//! Documents (`DOSSIERDOCUMENT`).

use serde_json::Value as Json;
use tracing::debug;

use super::{datetime_json, text_json};
use crate::core::{MigrationContext, Record, Row};

/// A document whose metadata is ready and whose file has not been read yet.
#[derive(Debug, Clone)]
pub struct DocumentDraft {
    /// Themis case id, which names the directory holding the file.
    pub source_case_id: i64,
    /// Destination case id.
    pub case_id: i64,
    pub filename: String,
    pub record: Record,
}

impl DocumentDraft {
    /// Log label identifying the document and its destination case.
    pub fn label(&self) -> String {
        format!("{} (Odoo case id {})", self.filename, self.case_id)
    }
}

/// Build document drafts.
///
/// Documents whose case did not resolve, or that name no file, are dropped
/// here so their files are never read. Returns the drafts and the number
/// dropped.
pub fn prepare_documents(rows: Vec<Row>, ctx: &MigrationContext) -> (Vec<DocumentDraft>, usize) {
    let mut drafts = Vec::with_capacity(rows.len());
    let mut dropped = 0;

    for mut row in rows {
        let source_case = row.take_id("case_id");
        let resolved = ctx.cases.resolve(source_case);
        let (Some(source_case_id), Some(case_id)) = (source_case, resolved.id()) else {
            dropped += 1;
            continue;
        };
        let Some(filename) = row.take_text("filename").filter(|f| !f.trim().is_empty()) else {
            debug!("Document without file name on case {}", source_case_id);
            dropped += 1;
            continue;
        };

        let category = ctx.document_categories.resolve(row.take_id("category_id"));
        let create_uid = ctx.users.resolve(row.take_id("create_uid"));
        let create_date = row.take_datetime("create_date");
        let write_date = row.take_datetime("write_date");
        let active = ctx.case_active.get(&source_case_id).copied().unwrap_or(true);

        let mut record = row.into_record();
        record.insert("filename".into(), text_json(Some(filename.clone())));
        record.insert("case_id".into(), Json::from(case_id));
        record.insert("active".into(), Json::Bool(active));
        record.insert("document_category_ids".into(), category.to_replace_command());
        record.insert("create_uid".into(), create_uid.to_json());
        record.insert("create_date".into(), datetime_json(create_date));
        record.insert("write_date".into(), datetime_json(write_date));

        drafts.push(DocumentDraft {
            source_case_id,
            case_id,
            filename,
            record,
        });
    }

    (drafts, dropped)
}
