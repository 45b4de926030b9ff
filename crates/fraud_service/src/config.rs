//! Service configuration: TOML file, then environment overrides
//!
//! Recognised variables:
//! - `FRAUD_ARTIFACT_DIR`: bundle directory
//! - `FRAUD_STRICT_SCHEMA`: `true`/`false`
//! - `FRAUD_THRESHOLD`: default decision threshold in `[0, 1]`

use fraud_core::{FraudError, Result, SchemaMode};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_ARTIFACT_DIR: &str = "FRAUD_ARTIFACT_DIR";
pub const ENV_STRICT_SCHEMA: &str = "FRAUD_STRICT_SCHEMA";
pub const ENV_THRESHOLD: &str = "FRAUD_THRESHOLD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub artifact_dir: PathBuf,
    /// Reject requests carrying features outside the schema
    pub strict_schema: bool,
    /// Threshold used by `classify`
    pub threshold: f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("artifacts/latest"),
            strict_schema: false,
            threshold: 0.5,
        }
    }
}

impl ServiceConfig {
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file; absent keys take their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            FraudError::InvalidConfig(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Apply the process environment on top of the current values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from any key lookup; unparsable values are errors.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_ARTIFACT_DIR) {
            debug!(value = %dir, "artifact dir overridden");
            self.artifact_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_STRICT_SCHEMA) {
            self.strict_schema = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(FraudError::InvalidConfig(format!(
                        "{ENV_STRICT_SCHEMA} must be a boolean, got '{other}'"
                    )))
                }
            };
        }
        if let Some(raw) = lookup(ENV_THRESHOLD) {
            self.threshold = raw.trim().parse().map_err(|_| {
                FraudError::InvalidConfig(format!("{ENV_THRESHOLD} must be a number, got '{raw}'"))
            })?;
        }
        Ok(())
    }

    pub fn schema_mode(&self) -> SchemaMode {
        SchemaMode::from_strict(self.strict_schema)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(FraudError::InvalidThreshold(self.threshold));
        }
        if self.artifact_dir.as_os_str().is_empty() {
            return Err(FraudError::InvalidConfig("artifact_dir must be set".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config: ServiceConfig =
            toml::from_str("artifact_dir = \"from-file\"\nthreshold = 0.3").unwrap();
        config
            .apply_overrides(lookup(&[
                (ENV_ARTIFACT_DIR, "/srv/bundle"),
                (ENV_STRICT_SCHEMA, "TRUE"),
            ]))
            .unwrap();

        assert_eq!(config.artifact_dir, PathBuf::from("/srv/bundle"));
        assert!(config.strict_schema);
        assert_eq!(config.threshold, 0.3);
        assert_eq!(config.schema_mode(), SchemaMode::Strict);
    }

    #[test]
    fn test_bad_override_values_rejected() {
        let mut config = ServiceConfig::default();
        assert!(config
            .apply_overrides(lookup(&[(ENV_STRICT_SCHEMA, "maybe")]))
            .is_err());
        assert!(config
            .apply_overrides(lookup(&[(ENV_THRESHOLD, "high")]))
            .is_err());
    }

    #[test]
    fn test_threshold_range_validated() {
        let mut config = ServiceConfig::default();
        config.apply_overrides(lookup(&[(ENV_THRESHOLD, "1.5")])).unwrap();
        assert!(matches!(
            config.validate(),
            Err(FraudError::InvalidThreshold(t)) if t == 1.5
        ));
        config.threshold = f64::NAN;
        assert!(config.validate().is_err());
    }
}
