//! End-to-end runs over an in-memory Themis database and a recording Odoo.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use rust_decimal::Decimal;
use serde_json::{json, Value as Json};
use tempfile::TempDir;
use themis_odoo_migrate::{
    Config, Destination, DocumentStore, Entity, FsDocumentStore, MemorySource, MigrateError,
    MigrationState, Orchestrator, Result, SqlValue, Step, StepStatus,
};

#[derive(Debug, Clone)]
struct Call {
    model: String,
    method: String,
    args: Vec<Json>,
}

/// Answers like Odoo and remembers every call.
#[derive(Default)]
struct RecordingDestination {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicI64,
    /// Model whose creates fail.
    failing_model: Option<String>,
    /// Model that returns one id too few.
    short_model: Option<String>,
    /// Document file name the destination refuses.
    rejected_file: Option<String>,
}

impl RecordingDestination {
    fn ids(&self, count: usize) -> Vec<i64> {
        (0..count)
            .map(|_| 1000 + self.next_id.fetch_add(1, Ordering::SeqCst))
            .collect()
    }

    fn calls_to(&self, model: &str, method: &str) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.model == model && c.method == method)
            .cloned()
            .collect()
    }

    fn called_models(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.model.clone())
            .collect()
    }
}

fn records(value: &Json) -> Vec<Json> {
    value.as_array().cloned().unwrap_or_default()
}

#[async_trait]
impl Destination for RecordingDestination {
    async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Json>,
        _kwargs: Option<Json>,
    ) -> Result<Json> {
        self.calls.lock().unwrap().push(Call {
            model: model.to_string(),
            method: method.to_string(),
            args: args.clone(),
        });

        if self.failing_model.as_deref() == Some(model) {
            return Err(MigrateError::destination(model, "server error"));
        }

        match (model, method) {
            ("res.country", "search_read") => Ok(json!([
                {"code": "BE", "id": 12},
                {"code": "NL", "id": 13},
            ])),
            (_, "write") | (_, "write_from_themis") => Ok(json!(true)),
            (_, "create_timesheets_costs_from_themis") => {
                let timesheets = records(&args[0]).len();
                let costs = records(&args[1]).len();
                Ok(json!([self.ids(timesheets), self.ids(costs)]))
            }
            ("cases.document", _) => {
                let batch = records(&args[0]);
                let rejected = batch
                    .iter()
                    .any(|r| r["filename"].as_str() == self.rejected_file.as_deref());
                if rejected {
                    return Err(MigrateError::destination(model, "document refused"));
                }
                Ok(json!(self.ids(batch.len())))
            }
            _ => {
                let mut count = records(&args[0]).len();
                if self.short_model.as_deref() == Some(model) {
                    count = count.saturating_sub(1);
                }
                Ok(json!(self.ids(count)))
            }
        }
    }
}

/// Fails the test if a document of case 99 is ever read.
struct GuardedStore {
    files: HashMap<(i64, String), Vec<u8>>,
    reads: Mutex<Vec<(i64, String)>>,
}

impl DocumentStore for GuardedStore {
    fn read(&self, source_case_id: i64, filename: &str) -> io::Result<Vec<u8>> {
        assert_ne!(source_case_id, 99, "document of an unmigrated case was read");
        self.reads
            .lock()
            .unwrap()
            .push((source_case_id, filename.to_string()));
        self.files
            .get(&(source_case_id, filename.to_string()))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }
}

/// Add a table with one row per attribute list; attributes not given are NULL.
fn table(source: &mut MemorySource, entity: Entity, rows: Vec<Vec<(&str, SqlValue)>>) {
    let fields = entity.fields();
    let rows = rows
        .into_iter()
        .map(|row| {
            fields
                .iter()
                .map(|(_, attr)| {
                    row.iter()
                        .find(|(name, _)| name == attr)
                        .map(|(_, value)| value.clone())
                        .unwrap_or(SqlValue::Null)
                })
                .collect()
        })
        .collect();
    source.insert_table(entity.table(), &entity.columns(), rows);
}

fn v(value: impl Into<SqlValue>) -> SqlValue {
    value.into()
}

fn themis() -> MemorySource {
    let mut source = MemorySource::new();
    for entity in [
        Entity::Users,
        Entity::Companies,
        Entity::Contacts,
        Entity::CaseCategories,
        Entity::Cases,
        Entity::CaseDescriptionTypes,
        Entity::CaseDescriptions,
        Entity::PartyCategories,
        Entity::Parties,
        Entity::TimesheetTypes,
        Entity::CaseTimesheetTariffs,
        Entity::Timesheets,
        Entity::CostTypes,
        Entity::CaseCostTariffs,
        Entity::Costs,
        Entity::DocumentCategories,
        Entity::Documents,
    ] {
        source.insert_table(entity.table(), &entity.columns(), Vec::new());
    }

    table(&mut source, Entity::Users, vec![
        vec![("id", v(1i64)), ("name", v("Anna")), ("email", v("anna@firm.be")), ("active", v("T")), ("tariff", v(100i64))],
        vec![("id", v(2i64)), ("name", v("Bert")), ("email", v("anna@firm.be")), ("active", v("F"))],
    ]);
    table(&mut source, Entity::Companies, vec![vec![
        ("id", v(10i64)),
        ("name", v("Acme")),
        ("vat", v("0123456789")),
        ("country_code", v("BE")),
        ("language", v("N")),
        ("category_id", v(5i64)),
        ("bank_number", v("BE68 5390 0754 7034")),
        ("create_uid", v(1i64)),
    ]]);
    table(&mut source, Entity::Contacts, vec![
        vec![
            ("id", v(20i64)),
            ("parent_id", v(10i64)),
            ("name", v("Jan Peeters")),
            ("country_code", v("ZZ")),
            ("language", v("F")),
            ("category_id", v(6i64)),
        ],
        vec![("id", v(21i64)), ("name", v("Els Janssens"))],
    ]);
    table(&mut source, Entity::CaseCategories, vec![vec![("id", v(3i64)), ("name", v("Familierecht"))]]);
    table(&mut source, Entity::Cases, vec![
        vec![
            ("id", v(7i64)),
            ("name", v("Peeters / Acme")),
            ("category_id", v(3i64)),
            ("archived", v("F")),
            ("user_id", v(1i64)),
            ("invoice_company_id", v(10i64)),
            ("tariff", v(90i64)),
        ],
        vec![
            ("id", v(8i64)),
            ("name", v("Janssens")),
            ("archived", v("T")),
            ("invoice_contact_id", v(20i64)),
        ],
    ]);
    table(&mut source, Entity::CaseDescriptionTypes, vec![vec![("id", v(1i64)), ("name", v("Feiten"))]]);
    table(&mut source, Entity::CaseDescriptions, vec![
        vec![("case_id", v(7i64)), ("type_id", v(1i64)), ("description", v(b"eerste".to_vec()))],
        vec![("case_id", v(7i64)), ("description", v(b"tweede".to_vec()))],
        vec![("case_id", v(99i64)), ("description", v(b"wees".to_vec()))],
    ]);
    table(&mut source, Entity::PartyCategories, vec![
        vec![("id", v(5i64)), ("name", v("Cliënt"))],
        vec![("id", v(6i64)), ("name", v("Tegenpartij"))],
    ]);
    table(&mut source, Entity::Parties, vec![
        vec![("case_id", v(7i64)), ("contact_id", v(20i64))],
        vec![("case_id", v(7i64)), ("company_id", v(10i64))],
    ]);
    table(&mut source, Entity::TimesheetTypes, vec![vec![("id", v(30i64)), ("name", v("Prestatie")), ("list_price", v(60i64))]]);
    table(&mut source, Entity::Timesheets, vec![vec![
        ("case_id", v(7i64)),
        ("user_id", v(1i64)),
        ("type_id", v(30i64)),
        ("name", v("Consultatie")),
        ("minutes", v(30i64)),
        ("billable", v("T")),
    ]]);
    table(&mut source, Entity::CostTypes, vec![vec![
        ("id", v(40i64)),
        ("name", v("Kopie")),
        ("list_price", v(Decimal::new(25, 2))),
    ]]);
    table(&mut source, Entity::Costs, vec![vec![
        ("case_id", v(7i64)),
        ("type_id", v(40i64)),
        ("name", v("Kopies")),
        ("amount", v(10i64)),
        ("price", v(5i64)),
    ]]);
    table(&mut source, Entity::DocumentCategories, vec![vec![("id", v(50i64)), ("name", v("Brieven"))]]);
    table(&mut source, Entity::Documents, vec![
        vec![("case_id", v(7i64)), ("name", v("Brief")), ("filename", v("brief.pdf")), ("category_id", v(50i64))],
        vec![("case_id", v(8i64)), ("name", v("Archief")), ("filename", v("archief.pdf"))],
        vec![("case_id", v(99i64)), ("name", v("Wees")), ("filename", v("wees.pdf"))],
        vec![("case_id", v(7i64)), ("name", v("Kwijt")), ("filename", v("kwijt.pdf"))],
    ]);
    source
}

fn config(document_root: &Path, extra: &str) -> Config {
    let yaml = format!(
        r#"
source:
  database: /data/themis.fdb
destination:
  url: http://localhost:8069
  database: odoo
  user: admin
  secret: admin
migration:
  document_root: {}
{}
"#,
        document_root.display(),
        extra
    );
    Config::from_yaml(&yaml).unwrap()
}

fn document_root() -> TempDir {
    let dir = TempDir::new().unwrap();
    for (case, file, contents) in [(7, "brief.pdf", "brief"), (8, "archief.pdf", "archief")] {
        let case_dir = dir.path().join(case.to_string());
        std::fs::create_dir_all(&case_dir).unwrap();
        std::fs::write(case_dir.join(file), contents).unwrap();
    }
    dir
}

fn orchestrator(
    config: Config,
    destination: Arc<RecordingDestination>,
    documents: Arc<dyn DocumentStore>,
) -> Orchestrator {
    Orchestrator::with_components(config, Arc::new(themis()), destination, documents)
}

fn first_records(call: &Call) -> Vec<Json> {
    records(&call.args[0])
}

#[tokio::test]
async fn test_full_run() {
    let root = document_root();
    let destination = Arc::new(RecordingDestination::default());
    let result = orchestrator(
        config(root.path(), ""),
        destination.clone(),
        Arc::new(FsDocumentStore::new(root.path())),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(result.status, "completed");
    assert!(result.documents_failed.is_empty());
    assert_eq!(result.steps.len(), Step::ALL.len());
    assert!(result.steps.iter().all(|s| s.status == StepStatus::Mapped));

    // Users: deduplicated logins, inactive one deactivated
    let users = destination.calls_to("res.users", "create_from_themis");
    let user_records = first_records(&users[0]);
    assert_eq!(user_records[0]["login"], json!("anna@firm.be"));
    assert_eq!(user_records[1]["login"], json!("anna@firm.be1"));
    let writes = destination.calls_to("res.users", "write");
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].args[0], json!([1001]));
    assert_eq!(writes[0].args[1], json!({"active": false}));

    // Partners: companies first, then contacts
    let partners = destination.calls_to("res.partner", "create_from_themis");
    assert_eq!(partners.len(), 2);
    let company = &first_records(&partners[0])[0];
    assert_eq!(company["country_id"], json!(12));
    assert_eq!(company["vat"], json!("BE0123456789"));
    assert_eq!(company["is_company"], json!(true));
    assert_eq!(company["language"], json!("nl_BE"));
    assert_eq!(company["create_uid"], json!(1000));
    let company_id = 1002;

    let contact = &first_records(&partners[1])[0];
    assert_eq!(contact["country_id"], json!(false));
    assert_eq!(contact["parent_id"], json!(company_id));
    assert_eq!(contact["language"], json!("fr_BE"));

    let banks = destination.calls_to("res.partner.bank", "create");
    assert_eq!(banks.len(), 1);
    assert_eq!(first_records(&banks[0])[0]["partner_id"], json!(company_id));
    assert_eq!(
        first_records(&banks[0])[0]["acc_number"],
        json!("BE68 5390 0754 7034")
    );

    // Cases: invoice partner and archived flag
    let cases = first_records(&destination.calls_to("cases.case", "create_from_themis")[0]);
    assert_eq!(cases[0]["partner_id"], json!(company_id));
    assert_eq!(cases[0]["active"], json!(true));
    assert!(cases[0]["case_category_ids"].is_array());
    assert_eq!(cases[1]["active"], json!(false));
    assert_eq!(cases[1]["partner_id"], json!(1004));

    // Descriptions concatenate in source order, orphan note ignored
    let descriptions = destination.calls_to("cases.case", "write_from_themis");
    let map = descriptions[0].args[0].as_object().unwrap();
    assert_eq!(map.len(), 1);
    let case_key = map.keys().next().unwrap().clone();
    assert_eq!(
        map[&case_key]["description"],
        json!("Feiten:<br>\neerste<br>\n<br>\ntweede<br>\n")
    );

    // Parties: contact category by default
    let parties = first_records(&destination.calls_to("cases.party", "create")[0]);
    assert_eq!(parties.len(), 2);
    assert_eq!(parties[0]["partner_id"], json!(1004));

    // Timesheets and costs in one call
    let billing = destination.calls_to("cases.case", "create_timesheets_costs_from_themis");
    assert_eq!(billing.len(), 1);
    let timesheet = &records(&billing[0].args[0])[0];
    assert_eq!(timesheet["unit_amount"], json!(0.5));
    assert_eq!(timesheet["price_unit"], json!(100.0));
    assert_eq!(timesheet["billable"], json!(true));
    let cost = &records(&billing[0].args[1])[0];
    assert_eq!(cost["price_unit"], json!(0.5));

    // Documents: only resolved cases with an existing file, one batch
    let documents = destination.calls_to("cases.document", "create_from_themis");
    assert_eq!(documents.len(), 1);
    let docs = first_records(&documents[0]);
    assert_eq!(docs.len(), 2);
    let archive = docs
        .iter()
        .find(|d| d["filename"] == json!("archief.pdf"))
        .unwrap();
    assert_eq!(archive["active"], json!(false));
    assert_eq!(archive["datas"], json!(general_purpose::STANDARD.encode("archief")));

    let documents_step = result
        .steps
        .iter()
        .find(|s| s.step == Step::Documents)
        .unwrap();
    assert_eq!(documents_step.records_created, 2);
    assert_eq!(documents_step.records_failed, 1);
}

#[tokio::test]
async fn test_unmigrated_case_documents_never_read() {
    let files: HashMap<(i64, String), Vec<u8>> = [
        ((7, "brief.pdf".to_string()), b"brief".to_vec()),
        ((8, "archief.pdf".to_string()), b"archief".to_vec()),
    ]
    .into_iter()
    .collect();
    let store = Arc::new(GuardedStore {
        files,
        reads: Mutex::new(Vec::new()),
    });
    let destination = Arc::new(RecordingDestination::default());

    let result = orchestrator(
        config(Path::new("/unused"), ""),
        destination,
        store.clone(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(result.status, "completed");
    let reads = store.reads.lock().unwrap();
    assert_eq!(reads.len(), 3);
    assert!(reads.iter().all(|(case, _)| *case != 99));
}

#[tokio::test]
async fn test_rejected_document_reported() {
    let root = document_root();
    let destination = Arc::new(RecordingDestination {
        rejected_file: Some("archief.pdf".into()),
        ..Default::default()
    });

    let result = orchestrator(
        config(root.path(), ""),
        destination.clone(),
        Arc::new(FsDocumentStore::new(root.path())),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(result.status, "completed_with_errors");
    assert_eq!(result.documents_failed.len(), 1);
    assert!(result.documents_failed[0].starts_with("archief.pdf (Odoo case id "));
    // One pair, then each half alone
    assert_eq!(
        destination.calls_to("cases.document", "create_from_themis").len(),
        3
    );
}

#[tokio::test]
async fn test_short_id_list_marks_mapping_failed() {
    let root = document_root();
    let destination = Arc::new(RecordingDestination {
        short_model: Some("cases.case_category".into()),
        ..Default::default()
    });

    let result = orchestrator(
        config(root.path(), ""),
        destination.clone(),
        Arc::new(FsDocumentStore::new(root.path())),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(result.status, "completed_with_errors");
    let categories = result
        .steps
        .iter()
        .find(|s| s.step == Step::CaseCategories)
        .unwrap();
    assert_eq!(categories.status, StepStatus::MappingFailed);

    // Cases still go through, with the neutral category
    let cases = first_records(&destination.calls_to("cases.case", "create_from_themis")[0]);
    assert_eq!(cases[0]["case_category_ids"], json!(false));
}

#[tokio::test]
async fn test_skip_steps() {
    let root = document_root();
    let destination = Arc::new(RecordingDestination::default());

    let result = orchestrator(
        config(root.path(), "  skip_steps: [users, documents]"),
        destination.clone(),
        Arc::new(FsDocumentStore::new(root.path())),
    )
    .run()
    .await
    .unwrap();

    let models = destination.called_models();
    assert!(!models.iter().any(|m| m == "res.users"));
    assert!(!models.iter().any(|m| m == "cases.document"));
    let users = result.steps.iter().find(|s| s.step == Step::Users).unwrap();
    assert_eq!(users.status, StepStatus::Skipped);

    // Without a user mapping, references to users are neutral
    let cases = first_records(&destination.calls_to("cases.case", "create_from_themis")[0]);
    assert_eq!(cases[0]["user_id"], json!(false));
}

#[tokio::test]
async fn test_resume_after_failure() {
    let root = document_root();
    let state_dir = TempDir::new().unwrap();
    let state_file = state_dir.path().join("state.json");

    let failing = Arc::new(RecordingDestination {
        failing_model: Some("cases.case".into()),
        ..Default::default()
    });
    let err = orchestrator(
        config(root.path(), ""),
        failing,
        Arc::new(FsDocumentStore::new(root.path())),
    )
    .with_state_file(state_file.clone())
    .run()
    .await
    .unwrap_err();
    assert!(matches!(err, MigrateError::Destination { .. }));

    let saved = MigrationState::load(&state_file).unwrap();
    assert!(saved.is_step_mapped(Step::Users));
    assert!(!saved.is_step_mapped(Step::Cases));
    assert_eq!(saved.context.users.get(1), Some(1000));

    let destination = Arc::new(RecordingDestination::default());
    let result = orchestrator(
        config(root.path(), ""),
        destination.clone(),
        Arc::new(FsDocumentStore::new(root.path())),
    )
    .with_state_file(state_file.clone())
    .resume()
    .unwrap()
    .run()
    .await
    .unwrap();

    assert_eq!(result.run_id, saved.run_id);
    assert_eq!(result.status, "completed");
    let models = destination.called_models();
    assert!(!models.iter().any(|m| m == "res.users" || m == "res.partner"));

    // The restored user mapping still resolves
    let cases = first_records(&destination.calls_to("cases.case", "create_from_themis")[0]);
    assert_eq!(cases[0]["user_id"], json!(1000));
}

#[tokio::test]
async fn test_resume_rejects_changed_config() {
    let root = document_root();
    let state_dir = TempDir::new().unwrap();
    let state_file = state_dir.path().join("state.json");

    orchestrator(
        config(root.path(), ""),
        Arc::new(RecordingDestination::default()),
        Arc::new(FsDocumentStore::new(root.path())),
    )
    .with_state_file(state_file.clone())
    .run()
    .await
    .unwrap();

    let err = orchestrator(
        config(root.path(), "  max_batch_bytes: 1000"),
        Arc::new(RecordingDestination::default()),
        Arc::new(FsDocumentStore::new(root.path())),
    )
    .with_state_file(state_file)
    .resume()
    .err()
    .unwrap();
    assert!(matches!(err, MigrateError::ConfigChanged));
}
