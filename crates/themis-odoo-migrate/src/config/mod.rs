//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 hash of the configuration for resume validation.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl SourceConfig {
    /// Build the ODBC connection string for the Firebird driver.
    pub fn connection_string(&self) -> String {
        if let Some(raw) = &self.connection_string {
            return raw.clone();
        }
        format!(
            "Driver={{{}}};Dbname={};Uid={};Pwd={};Charset={};",
            self.driver, self.database, self.user, self.password, self.charset
        )
    }
}

impl DestinationConfig {
    /// JSON-RPC endpoint derived from the base URL.
    pub fn endpoint(&self) -> String {
        format!("{}/jsonrpc", self.url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
source:
  database: /data/themis.fdb
destination:
  url: https://odoo.example.com/
  database: odoo
  user: admin
  secret: s3cret
migration:
  document_root: /data/documents
"#;

    #[test]
    fn test_from_yaml_applies_defaults() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.source.user, "SYSDBA");
        assert_eq!(config.source.charset, "ISO8859_1");
        assert_eq!(config.migration.max_batch_bytes, 30_000_000);
        assert!(config.migration.skip_steps.is_empty());
        assert_eq!(config.destination.timeout_seconds, 3600);
    }

    #[test]
    fn test_connection_string() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(
            config.source.connection_string(),
            "Driver={Firebird/InterBase(r) driver};Dbname=/data/themis.fdb;Uid=SYSDBA;Pwd=;Charset=ISO8859_1;"
        );

        let mut raw = config.source.clone();
        raw.connection_string = Some("DSN=themis".into());
        assert_eq!(raw.connection_string(), "DSN=themis");
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(
            config.destination.endpoint(),
            "https://odoo.example.com/jsonrpc"
        );
    }

    #[test]
    fn test_hash_changes_with_config() {
        let config = Config::from_yaml(YAML).unwrap();
        let mut other = config.clone();
        other.migration.max_batch_bytes = 10;
        assert_eq!(config.hash(), config.hash());
        assert_ne!(config.hash(), other.hash());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, YAML).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.destination.database, "odoo");
    }
}
