//! Migration orchestrator - main workflow coordinator.
//!
//! Runs the steps in dependency order. Each step extracts its source rows,
//! transforms them with the mappings earlier steps published, submits them
//! and publishes its own mapping for the steps after it. Progress and the
//! accumulated [`MigrationContext`] go to the state file after every step.

use crate::config::Config;
use crate::core::{Entity, IdMapping, MigrationContext, Row};
use crate::error::{MigrateError, Result};
use crate::source::{self, FirebirdSource, SourceReader};
use crate::state::{MigrationState, Step, StepState, StepStatus};
use crate::target::{parse_ids, Destination, OdooClient};
use crate::transfer::{BatchSubmitter, DocumentStore, FsDocumentStore, ModelSink, SizedRecord};
use crate::transform::billing::{self, BillingKind};
use crate::transform::cases::{prepare_cases, prepare_lookup};
use crate::transform::descriptions::{description_labels, prepare_descriptions};
use crate::transform::documents::prepare_documents;
use crate::transform::parties::prepare_parties;
use crate::transform::partners::{bank_records, Partner};
use crate::transform::users::prepare_users;
use crate::transform::Prepared;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

const TIMESHEETS_COSTS_METHOD: &str = "create_timesheets_costs_from_themis";

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    state_file: Option<PathBuf>,
    state: Option<MigrationState>,
    source: Arc<dyn SourceReader>,
    destination: Arc<dyn Destination>,
    documents: Arc<dyn DocumentStore>,
}

/// Per-step line of a run result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSummary {
    pub step: Step,
    pub status: StepStatus,
    pub rows_extracted: usize,
    pub records_created: usize,
    pub records_failed: usize,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// `completed`, or `completed_with_errors` when a mapping could not be
    /// built or a document was rejected.
    pub status: String,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Every step, in execution order.
    pub steps: Vec<StepSummary>,

    /// Destination records created or written, over all steps.
    pub records_created: usize,

    /// Labels of the documents the destination rejected.
    pub documents_failed: Vec<String>,
}

/// Connectivity of both ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub destination_connected: bool,
    pub destination_latency_ms: u64,
    pub destination_error: Option<String>,
    pub healthy: bool,
}

impl Orchestrator {
    /// Connect to the Themis database and log in to Odoo.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let source = FirebirdSource::connect(&config.source).await?;
        let destination = OdooClient::connect(&config.destination).await?;
        let documents = FsDocumentStore::new(config.migration.document_root.clone());

        Ok(Self::with_components(
            config,
            Arc::new(source),
            Arc::new(destination),
            Arc::new(documents),
        ))
    }

    /// Build an orchestrator over already connected components.
    pub fn with_components(
        config: Config,
        source: Arc<dyn SourceReader>,
        destination: Arc<dyn Destination>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            config,
            state_file: None,
            state: None,
            source,
            destination,
            documents,
        }
    }

    /// Set the state file path for resume capability.
    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        self.state_file = Some(path);
        self
    }

    /// Load existing state for resume.
    pub fn resume(mut self) -> Result<Self> {
        if let Some(ref path) = self.state_file {
            if path.exists() {
                let state = MigrationState::load(path)?;
                state.validate_config(&self.config.hash())?;
                info!("Resuming from state file: {:?}", path);
                self.state = Some(state);
            }
        }
        Ok(self)
    }

    /// Check that both ends answer, without failing on the first one down.
    pub async fn health_check(config: &Config) -> HealthCheckResult {
        let start = Instant::now();
        let source = match FirebirdSource::connect(&config.source).await {
            Ok(source) => source.list_tables().await.map(|tables| {
                debug!("Source has {} tables", tables.len());
            }),
            Err(e) => Err(e),
        };
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let destination = OdooClient::connect(&config.destination).await.map(|_| ());
        let destination_latency_ms = start.elapsed().as_millis() as u64;

        HealthCheckResult {
            source_connected: source.is_ok(),
            source_latency_ms,
            source_error: source.as_ref().err().map(|e| e.to_string()),
            destination_connected: destination.is_ok(),
            destination_latency_ms,
            destination_error: destination.as_ref().err().map(|e| e.to_string()),
            healthy: source.is_ok() && destination.is_ok(),
        }
    }

    /// Run the migration.
    ///
    /// Steps finished in an earlier run (per the resume state) and steps
    /// listed in `skip_steps` are not run. A step failing with an error stops
    /// the run; the state file then holds everything finished so far.
    pub async fn run(mut self) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let skip: BTreeSet<Step> = self
            .config
            .migration
            .skip_steps
            .iter()
            .map(|name| name.parse())
            .collect::<Result<_>>()?;

        let mut state = self.state.take().unwrap_or_else(|| {
            MigrationState::new(uuid::Uuid::new_v4().to_string(), self.config.hash())
        });
        info!("Starting migration run: {}", state.run_id);

        let mut documents_failed = Vec::new();

        for step in Step::ALL {
            if state.step_status(step).is_finished() {
                info!("{}: finished in an earlier run, skipping", step);
                continue;
            }
            if skip.contains(&step) {
                info!("{}: skipped by configuration", step);
                state.step_mut(step).advance(StepStatus::Skipped);
                self.save_state(&mut state)?;
                continue;
            }

            info!("{}: starting", step);
            let outcome = {
                let MigrationState { steps, context, .. } = &mut state;
                let progress = steps.entry(step).or_default();
                *progress = StepState::default();
                self.run_step(step, context, progress, &mut documents_failed)
                    .await
            };

            match outcome {
                Ok(true) => state.step_mut(step).advance(StepStatus::Mapped),
                Ok(false) => {
                    warn!("{}: created records could not be mapped", step);
                    state.step_mut(step).advance(StepStatus::MappingFailed);
                }
                Err(e) => {
                    error!("{}: {}", step, e);
                    state.mark_failed();
                    if let Err(save_err) = self.save_state(&mut state) {
                        warn!("Could not save state: {}", save_err);
                    }
                    return Err(e);
                }
            }
            self.save_state(&mut state)?;
        }

        state.mark_completed();
        self.save_state(&mut state)?;

        let result = summarize(&state, started_at, documents_failed);
        info!(
            "Migration {}: {} records in {:.1}s",
            result.status, result.records_created, result.duration_seconds
        );
        Ok(result)
    }

    async fn run_step(
        &self,
        step: Step,
        ctx: &mut MigrationContext,
        progress: &mut StepState,
        documents_failed: &mut Vec<String>,
    ) -> Result<bool> {
        match step {
            Step::Users => self.migrate_users(ctx, progress).await,
            Step::Countries => self.fetch_countries(ctx, progress).await,
            Step::Companies => self.migrate_partners(Partner::Company, ctx, progress).await,
            Step::Contacts => self.migrate_partners(Partner::Contact, ctx, progress).await,
            Step::CaseCategories => {
                let (mapping, ok) = self
                    .migrate_lookup(Entity::CaseCategories, "cases.case_category", progress)
                    .await?;
                ctx.case_categories = mapping;
                Ok(ok)
            }
            Step::Cases => self.migrate_cases(ctx, progress).await,
            Step::CaseDescriptions => self.migrate_descriptions(ctx, progress).await,
            Step::PartyCategories => {
                let (mapping, ok) = self
                    .migrate_lookup(Entity::PartyCategories, "cases.party_category", progress)
                    .await?;
                ctx.party_categories = mapping;
                Ok(ok)
            }
            Step::Parties => self.migrate_parties(ctx, progress).await,
            Step::BillingTypes => self.migrate_billing_types(ctx, progress).await,
            Step::TimesheetsCosts => self.migrate_timesheets_costs(ctx, progress).await,
            Step::DocumentCategories => {
                let (mapping, ok) = self
                    .migrate_lookup(Entity::DocumentCategories, "cases.document_category", progress)
                    .await?;
                ctx.document_categories = mapping;
                Ok(ok)
            }
            Step::Documents => {
                let failed = self.migrate_documents(ctx, progress).await?;
                documents_failed.extend(failed);
                Ok(true)
            }
        }
    }

    async fn extract(&self, entity: Entity, progress: &mut StepState) -> Result<Vec<Row>> {
        let rows = source::extract(self.source.as_ref(), entity).await?;
        info!("Fetched {} {} from {}", rows.len(), entity.label(), entity.table());
        progress.rows_extracted += rows.len();
        progress.advance(StepStatus::Extracted);
        Ok(rows)
    }

    /// Create prepared records and zip the new ids back onto their sources.
    async fn create_mapped(
        &self,
        label: &str,
        model: &str,
        method: &str,
        prepared: Prepared,
        progress: &mut StepState,
    ) -> Result<(IdMapping, bool)> {
        progress.advance(StepStatus::Transformed);
        let Prepared {
            source_ids,
            records,
        } = prepared;

        let created = if records.is_empty() {
            Vec::new()
        } else {
            self.destination.create_with(model, method, records).await?
        };
        progress.records_created += created.len();
        progress.advance(StepStatus::Submitted);

        Ok(IdMapping::from_created(label, &source_ids, &created))
    }

    async fn migrate_users(&self, ctx: &mut MigrationContext, progress: &mut StepState) -> Result<bool> {
        let rows = self.extract(Entity::Users, progress).await?;
        let batch = prepare_users(rows);
        let (mapping, ok) = self
            .create_mapped("users", "res.users", "create_from_themis", batch.prepared, progress)
            .await?;

        let inactive: Vec<i64> = batch
            .inactive
            .iter()
            .filter_map(|id| mapping.resolve(*id).id())
            .collect();
        if !inactive.is_empty() {
            let mut patch = Map::new();
            patch.insert("active".into(), Json::Bool(false));
            self.destination.write("res.users", &inactive, patch).await?;
            info!("Deactivated {} users.", inactive.len());
        }

        ctx.users = mapping;
        ctx.user_tariffs = batch.tariffs;
        Ok(ok)
    }

    async fn fetch_countries(&self, ctx: &mut MigrationContext, progress: &mut StepState) -> Result<bool> {
        let records = self
            .destination
            .search_read("res.country", json!([]), &["code", "id"])
            .await?;

        ctx.countries = records
            .iter()
            .filter_map(|record| {
                let code = record.get("code")?.as_str()?;
                let id = record.get("id")?.as_i64()?;
                Some((code.to_string(), id))
            })
            .collect();
        info!("Fetched {} country codes.", ctx.countries.len());

        progress.rows_extracted = records.len();
        progress.advance(StepStatus::Extracted);
        Ok(true)
    }

    async fn migrate_partners(
        &self,
        partner: Partner,
        ctx: &mut MigrationContext,
        progress: &mut StepState,
    ) -> Result<bool> {
        let entity = partner.entity();
        let rows = self.extract(entity, progress).await?;
        let batch = partner.prepare(rows, ctx);
        let (mapping, ok) = self
            .create_mapped(entity.label(), "res.partner", "create_from_themis", batch.prepared, progress)
            .await?;

        let (linked, orphaned): (Vec<_>, Vec<_>) = batch
            .bank_accounts
            .into_iter()
            .partition(|account| mapping.resolve(account.partner_source_id).is_set());
        if !orphaned.is_empty() {
            warn!(
                "{} bank accounts of {} have no partner and are not migrated",
                orphaned.len(),
                entity.label()
            );
        }
        let banks = bank_records(&linked, &mapping);
        if !banks.is_empty() {
            let ids = self.destination.create("res.partner.bank", banks).await?;
            info!("Created {} bank accounts.", ids.len());
            progress.records_created += ids.len();
        }

        match partner {
            Partner::Company => {
                ctx.companies = mapping;
                ctx.company_categories = batch.categories;
            }
            Partner::Contact => {
                ctx.contacts = mapping;
                ctx.contact_categories = batch.categories;
            }
        }
        Ok(ok)
    }

    /// Lookup tables: names only, created with plain `create`.
    async fn migrate_lookup(
        &self,
        entity: Entity,
        model: &str,
        progress: &mut StepState,
    ) -> Result<(IdMapping, bool)> {
        let rows = self.extract(entity, progress).await?;
        let prepared = prepare_lookup(rows);
        self.create_mapped(entity.label(), model, "create", prepared, progress)
            .await
    }

    async fn migrate_cases(&self, ctx: &mut MigrationContext, progress: &mut StepState) -> Result<bool> {
        let rows = self.extract(Entity::Cases, progress).await?;
        let batch = prepare_cases(rows, ctx);
        let (mapping, ok) = self
            .create_mapped("cases", "cases.case", "create_from_themis", batch.prepared, progress)
            .await?;

        ctx.cases = mapping;
        ctx.case_active = batch.active;
        ctx.case_tariffs = batch.tariffs;
        Ok(ok)
    }

    async fn migrate_descriptions(
        &self,
        ctx: &mut MigrationContext,
        progress: &mut StepState,
    ) -> Result<bool> {
        let labels = description_labels(self.extract(Entity::CaseDescriptionTypes, progress).await?);
        let rows = self.extract(Entity::CaseDescriptions, progress).await?;
        let descriptions = prepare_descriptions(rows, &labels, &ctx.cases);
        progress.advance(StepStatus::Transformed);

        if !descriptions.is_empty() {
            let count = descriptions.len();
            self.destination
                .execute_kw(
                    "cases.case",
                    "write_from_themis",
                    vec![Json::Object(descriptions)],
                    None,
                )
                .await?;
            info!("Wrote descriptions of {} cases.", count);
            progress.records_created += count;
        }
        progress.advance(StepStatus::Submitted);
        Ok(true)
    }

    async fn migrate_parties(&self, ctx: &mut MigrationContext, progress: &mut StepState) -> Result<bool> {
        let rows = self.extract(Entity::Parties, progress).await?;
        let records = prepare_parties(rows, ctx);
        progress.advance(StepStatus::Transformed);

        let expected = records.len();
        let created = if records.is_empty() {
            Vec::new()
        } else {
            self.destination.create("cases.party", records).await?
        };
        progress.records_created += created.len();
        progress.advance(StepStatus::Submitted);
        Ok(verify_count("parties", expected, created.len()))
    }

    async fn migrate_billing_types(
        &self,
        ctx: &mut MigrationContext,
        progress: &mut StepState,
    ) -> Result<bool> {
        let rows = self.extract(Entity::TimesheetTypes, progress).await?;
        let timesheet = billing::prepare_types(rows, BillingKind::Timesheet);
        let rows = self.extract(Entity::CostTypes, progress).await?;
        let cost = billing::prepare_types(rows, BillingKind::Cost);

        let (timesheet_types, timesheet_ok) = self
            .create_mapped("timesheet types", "product.template", "create", timesheet.prepared, progress)
            .await?;
        let (cost_types, cost_ok) = self
            .create_mapped("cost types", "product.template", "create", cost.prepared, progress)
            .await?;

        ctx.timesheet_types = timesheet_types;
        ctx.timesheet_type_prices = timesheet.prices;
        ctx.cost_types = cost_types;
        ctx.cost_type_prices = cost.prices;
        Ok(timesheet_ok && cost_ok)
    }

    async fn migrate_timesheets_costs(
        &self,
        ctx: &mut MigrationContext,
        progress: &mut StepState,
    ) -> Result<bool> {
        let user_tariffs = billing::case_overrides(
            self.extract(Entity::CaseTimesheetTariffs, progress).await?,
            "user_id",
        );
        let timesheets = billing::prepare_timesheets(
            self.extract(Entity::Timesheets, progress).await?,
            &user_tariffs,
            ctx,
        );
        let type_prices = billing::case_overrides(
            self.extract(Entity::CaseCostTariffs, progress).await?,
            "type_id",
        );
        let costs = billing::prepare_costs(
            self.extract(Entity::Costs, progress).await?,
            &type_prices,
            ctx,
        );
        progress.advance(StepStatus::Transformed);

        if timesheets.is_empty() && costs.is_empty() {
            progress.advance(StepStatus::Submitted);
            return Ok(true);
        }

        let (expected_timesheets, expected_costs) = (timesheets.len(), costs.len());
        let as_array = |records: Vec<_>| Json::Array(records.into_iter().map(Json::Object).collect());
        let result = self
            .destination
            .execute_kw(
                "cases.case",
                TIMESHEETS_COSTS_METHOD,
                vec![as_array(timesheets), as_array(costs)],
                None,
            )
            .await?;

        let model = format!("cases.case.{}", TIMESHEETS_COSTS_METHOD);
        let (timesheet_ids, cost_ids) = match result.as_array().map(Vec::as_slice) {
            Some([timesheet_ids, cost_ids]) => {
                (parse_ids(&model, timesheet_ids)?, parse_ids(&model, cost_ids)?)
            }
            _ => {
                return Err(MigrateError::destination(
                    model,
                    format!("expected two id lists, got {}", result),
                ))
            }
        };
        progress.records_created += timesheet_ids.len() + cost_ids.len();
        progress.advance(StepStatus::Submitted);

        let timesheets_ok = verify_count("timesheets", expected_timesheets, timesheet_ids.len());
        let costs_ok = verify_count("costs", expected_costs, cost_ids.len());
        Ok(timesheets_ok && costs_ok)
    }

    /// Returns the labels of the documents the destination rejected.
    async fn migrate_documents(
        &self,
        ctx: &mut MigrationContext,
        progress: &mut StepState,
    ) -> Result<Vec<String>> {
        let rows = self.extract(Entity::Documents, progress).await?;
        let (drafts, dropped) = prepare_documents(rows, ctx);
        if dropped > 0 {
            info!("{} documents have no migrated case or no file and are skipped", dropped);
        }
        progress.advance(StepStatus::Transformed);

        let submitter = BatchSubmitter::new(self.config.migration.max_batch_bytes);
        let sink = ModelSink::new(self.destination.as_ref(), "cases.document", "create_from_themis");
        let store = self.documents.as_ref();

        let report = submitter
            .run(&sink, drafts, |draft| {
                let label = draft.label();
                let contents = match store.read(draft.source_case_id, &draft.filename) {
                    Ok(contents) => contents,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        warn!("File not found: {}/{}", draft.source_case_id, draft.filename);
                        return None;
                    }
                    Err(e) => {
                        warn!(
                            "Could not read {}/{}: {}",
                            draft.source_case_id, draft.filename, e
                        );
                        return None;
                    }
                };

                let datas = general_purpose::STANDARD.encode(contents);
                let mut record = draft.record;
                let payload_size = datas.len();
                record.insert("datas".into(), Json::String(datas));
                Some(SizedRecord {
                    record,
                    payload_size,
                    label,
                })
            })
            .await;

        info!(
            "Documents: {} created in {} submissions, {} rejected, {} without file",
            report.created,
            report.attempts,
            report.failed.len(),
            report.skipped
        );
        progress.records_created += report.created;
        progress.records_failed += report.failed.len() + report.skipped;
        progress.advance(StepStatus::Submitted);
        Ok(report.failed)
    }

    /// Save state to file.
    fn save_state(&self, state: &mut MigrationState) -> Result<()> {
        if let Some(ref path) = self.state_file {
            state.save(path)?;
        }
        Ok(())
    }
}

/// Whether the destination created one record per submitted record.
fn verify_count(label: &str, expected: usize, created: usize) -> bool {
    if expected == created {
        info!("Created {} {}.", created, label);
        true
    } else {
        error!(
            "{}: destination returned {} ids for {} records",
            label, created, expected
        );
        false
    }
}

fn summarize(
    state: &MigrationState,
    started_at: DateTime<Utc>,
    documents_failed: Vec<String>,
) -> MigrationResult {
    let completed_at = state.completed_at.unwrap_or_else(Utc::now);
    let steps: Vec<StepSummary> = state
        .steps
        .iter()
        .map(|(step, s)| StepSummary {
            step: *step,
            status: s.status,
            rows_extracted: s.rows_extracted,
            records_created: s.records_created,
            records_failed: s.records_failed,
        })
        .collect();

    let mapping_failed = steps
        .iter()
        .any(|s| s.status == StepStatus::MappingFailed);
    let status = if mapping_failed || !documents_failed.is_empty() {
        "completed_with_errors"
    } else {
        "completed"
    };

    MigrationResult {
        run_id: state.run_id.clone(),
        status: status.to_string(),
        started_at,
        completed_at,
        duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
        records_created: steps.iter().map(|s| s.records_created).sum(),
        steps,
        documents_failed,
    }
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Per-step created counts, keyed by step name.
    pub fn created_by_step(&self) -> HashMap<String, usize> {
        self.steps
            .iter()
            .map(|s| (s.step.to_string(), s.records_created))
            .collect()
    }
}
