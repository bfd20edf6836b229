//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
///
/// Only conditions that must abort a run surface as errors. Data-quality
/// problems (unknown codes, missing files, rejected documents) are logged
/// and counted by the step that meets them.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(String),

    /// Destination refused the supplied credentials
    #[error("Authentication failed for user '{user}' on database '{database}'")]
    Authentication { database: String, user: String },

    /// Transport-level failure talking to the destination
    #[error("Destination request failed: {0}")]
    Rpc(#[from] reqwest::Error),

    /// Remote fault returned by the destination for a model call
    #[error("Destination call {model} failed: {message}")]
    Destination { model: String, message: String },

    /// State file error
    #[error("State file error: {0}")]
    State(String),

    /// Config hash mismatch on resume
    #[error("Config has changed since last run - cannot resume. Start a fresh run instead.")]
    ConfigChanged,

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Destination error for a model call.
    pub fn destination(model: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Destination {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error category.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::ConfigChanged | MigrateError::Yaml(_) => 2,
            MigrateError::Source(_) | MigrateError::Authentication { .. } | MigrateError::Rpc(_) => 3,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
