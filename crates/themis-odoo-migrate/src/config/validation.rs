//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};
use crate::state::Step;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.database.is_empty() && config.source.connection_string.is_none() {
        return Err(MigrateError::Config("source.database is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(MigrateError::Config("source.user is required".into()));
    }

    // Destination validation
    let url = config.destination.url.trim();
    if url.is_empty() {
        return Err(MigrateError::Config("destination.url is required".into()));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(MigrateError::Config(format!(
            "destination.url must start with http:// or https://, got '{}'",
            url
        )));
    }
    if config.destination.database.is_empty() {
        return Err(MigrateError::Config(
            "destination.database is required".into(),
        ));
    }
    if config.destination.user.is_empty() {
        return Err(MigrateError::Config("destination.user is required".into()));
    }
    if config.destination.timeout_seconds == 0 {
        return Err(MigrateError::Config(
            "destination.timeout_seconds must be at least 1".into(),
        ));
    }

    // Migration config validation
    if config.migration.max_batch_bytes == 0 {
        return Err(MigrateError::Config(
            "migration.max_batch_bytes must be at least 1".into(),
        ));
    }
    for name in &config.migration.skip_steps {
        if name.parse::<Step>().is_err() {
            return Err(MigrateError::Config(format!(
                "migration.skip_steps: unknown step '{}'",
                name
            )));
        }
    }

    Ok(())
}
