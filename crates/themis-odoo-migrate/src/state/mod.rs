//! File-based state management for resume capability.
//!
//! The state file records how far each migration step got and the
//! [`MigrationContext`] built so far, so a resumed run can skip the steps
//! whose records already exist on the destination and still resolve
//! references to them.

use crate::core::MigrationContext;
use crate::error::{MigrateError, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

type HmacSha256 = Hmac<Sha256>;

/// One migration step, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Users,
    Countries,
    Companies,
    Contacts,
    CaseCategories,
    Cases,
    CaseDescriptions,
    PartyCategories,
    Parties,
    BillingTypes,
    TimesheetsCosts,
    DocumentCategories,
    Documents,
}

impl Step {
    /// Every step, in the order the orchestrator runs them.
    pub const ALL: [Step; 13] = [
        Step::Users,
        Step::Countries,
        Step::Companies,
        Step::Contacts,
        Step::CaseCategories,
        Step::Cases,
        Step::CaseDescriptions,
        Step::PartyCategories,
        Step::Parties,
        Step::BillingTypes,
        Step::TimesheetsCosts,
        Step::DocumentCategories,
        Step::Documents,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Step::Users => "users",
            Step::Countries => "countries",
            Step::Companies => "companies",
            Step::Contacts => "contacts",
            Step::CaseCategories => "case_categories",
            Step::Cases => "cases",
            Step::CaseDescriptions => "case_descriptions",
            Step::PartyCategories => "party_categories",
            Step::Parties => "parties",
            Step::BillingTypes => "billing_types",
            Step::TimesheetsCosts => "timesheets_costs",
            Step::DocumentCategories => "document_categories",
            Step::Documents => "documents",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Step {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Step::ALL
            .iter()
            .copied()
            .find(|step| step.name() == wanted)
            .ok_or_else(|| MigrateError::Config(format!("unknown step '{}'", s)))
    }
}

/// Per-step progress.
///
/// `pending → extracted → transformed → submitted → mapped | mapping_failed`.
/// A step the operator excluded is `skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Extracted,
    Transformed,
    Submitted,
    Mapped,
    MappingFailed,
    Skipped,
}

impl StepStatus {
    /// Whether the step reached a final status.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            StepStatus::Mapped | StepStatus::MappingFailed | StepStatus::Skipped
        )
    }
}

/// Overall run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// Per-step state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepState {
    pub status: StepStatus,

    /// Source rows read.
    #[serde(default)]
    pub rows_extracted: usize,

    /// Destination records created or written.
    #[serde(default)]
    pub records_created: usize,

    /// Records the destination rejected or that could not be prepared.
    #[serde(default)]
    pub records_failed: usize,

    pub completed_at: Option<DateTime<Utc>>,
}

impl StepState {
    pub fn advance(&mut self, status: StepStatus) {
        self.status = status;
        if status.is_finished() {
            self.completed_at = Some(Utc::now());
        }
    }
}

/// Migration state for resume capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationState {
    /// Unique run identifier.
    pub run_id: String,

    /// SHA256 hash of the configuration.
    pub config_hash: String,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// Current run status.
    pub status: RunStatus,

    /// Per-step state.
    pub steps: BTreeMap<Step, StepState>,

    /// Mappings and side tables built by finished steps.
    #[serde(default)]
    pub context: MigrationContext,

    /// When the migration completed (if finished).
    pub completed_at: Option<DateTime<Utc>>,

    /// HMAC-SHA256 signature for integrity validation.
    /// Computed over serialized state (excluding this field) using config_hash as key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac: Option<String>,
}

impl MigrationState {
    /// Create a new migration state.
    pub fn new(run_id: String, config_hash: String) -> Self {
        Self {
            run_id,
            config_hash,
            started_at: Utc::now(),
            status: RunStatus::Running,
            steps: BTreeMap::new(),
            context: MigrationContext::new(),
            completed_at: None,
            hmac: None,
        }
    }

    /// Compute HMAC-SHA256 signature for state integrity validation.
    ///
    /// The state goes through `serde_json::Value` first so map keys are
    /// signed in sorted order, independent of hash map iteration order.
    fn compute_hmac(&self) -> Result<String> {
        let mut state_for_signing = self.clone();
        state_for_signing.hmac = None;

        let canonical = serde_json::to_value(&state_for_signing)
            .map_err(|e| MigrateError::State(format!("Failed to serialize state for HMAC: {}", e)))?;
        let content = canonical.to_string();

        let mut mac = HmacSha256::new_from_slice(self.config_hash.as_bytes())
            .map_err(|e| MigrateError::State(format!("Failed to create HMAC: {}", e)))?;

        mac.update(content.as_bytes());
        let result = mac.finalize();
        Ok(hex::encode(result.into_bytes()))
    }

    /// Load state from a file with integrity validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let state: Self = serde_json::from_str(&content)?;

        match &state.hmac {
            Some(stored_hmac) => {
                let expected_hmac = state.compute_hmac()?;
                if stored_hmac != &expected_hmac {
                    return Err(MigrateError::State(
                        "State file integrity check failed: HMAC mismatch (possible tampering)"
                            .to_string(),
                    ));
                }
            }
            None => {
                return Err(MigrateError::State(
                    "State file has no HMAC signature".to_string(),
                ));
            }
        }

        Ok(state)
    }

    /// Save state to a file (atomic write with HMAC).
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();

        self.hmac = Some(self.compute_hmac()?);

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| MigrateError::State(format!("Failed to serialize state: {}", e)))?;

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Validate that the config hash matches for resume.
    pub fn validate_config(&self, config_hash: &str) -> Result<()> {
        if self.config_hash != config_hash {
            return Err(MigrateError::ConfigChanged);
        }
        Ok(())
    }

    /// Get or create step state.
    pub fn step_mut(&mut self, step: Step) -> &mut StepState {
        self.steps.entry(step).or_default()
    }

    pub fn step_status(&self, step: Step) -> StepStatus {
        self.steps
            .get(&step)
            .map(|s| s.status)
            .unwrap_or_default()
    }

    /// Whether a step already mapped its records in an earlier run.
    pub fn is_step_mapped(&self, step: Step) -> bool {
        self.step_status(step) == StepStatus::Mapped
    }

    /// Mark the migration as completed.
    pub fn mark_completed(&mut self) {
        self.status = RunStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the migration as failed.
    pub fn mark_failed(&mut self) {
        self.status = RunStatus::Failed;
        self.completed_at = Some(Utc::now());
    }
}
