//! Configuration types for the flaw nozzle pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("nozzle count must be at least 2, got {0}")]
    InvalidNozzleCount(u32),

    #[error("tolerance must lie strictly between 0 and 0.5 nozzle steps, got {0}")]
    InvalidTolerance(f64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Nozzle array geometry and matching parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NozzleConfig {
    /// Total number of nozzles in the print-head array
    #[serde(default = "default_nozzle_count")]
    pub nozzle_count: u32,

    /// Accepted distance from a grid position, as a fraction of one nozzle step
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Labels expected in the input; empty means every label present
    #[serde(default)]
    pub labels: Vec<String>,
}

fn default_nozzle_count() -> u32 {
    636
}

fn default_tolerance() -> f64 {
    0.25
}

impl Default for NozzleConfig {
    fn default() -> Self {
        Self {
            nozzle_count: default_nozzle_count(),
            tolerance: default_tolerance(),
            labels: Vec::new(),
        }
    }
}

impl NozzleConfig {
    /// Check the structural preconditions of the matcher.
    ///
    /// This is the only fatal check in the pipeline and must run before any
    /// label is processed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nozzle_count < 2 {
            return Err(ConfigError::InvalidNozzleCount(self.nozzle_count));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 || self.tolerance >= 0.5 {
            return Err(ConfigError::InvalidTolerance(self.tolerance));
        }
        Ok(())
    }
}

/// Naming of the exported flaw list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Leading part of the output file name
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Print-head model tag placed between the date and the machine id
    #[serde(default = "default_model_tag")]
    pub model_tag: String,

    /// Machine identifier suffix (e.g. "04"); prompted for when absent
    #[serde(default)]
    pub machine: Option<String>,
}

fn default_prefix() -> String {
    "flaw_nozzle".to_string()
}

fn default_model_tag() -> String {
    "680k".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            model_tag: default_model_tag(),
            machine: None,
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub nozzles: NozzleConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_nozzle_config() {
        let config = NozzleConfig::default();
        assert_eq!(config.nozzle_count, 636);
        assert_eq!(config.tolerance, 0.25);
        assert!(config.labels.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_small_nozzle_count() {
        let config = NozzleConfig {
            nozzle_count: 1,
            ..NozzleConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidNozzleCount(1))
        ));
    }

    #[test]
    fn test_validate_rejects_tolerance_bounds() {
        for tolerance in [0.0, 0.5, -0.1, 0.75, f64::NAN] {
            let config = NozzleConfig {
                tolerance,
                ..NozzleConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidTolerance(_))),
                "tolerance {} should be rejected",
                tolerance
            );
        }
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: PipelineConfig =
            serde_yaml::from_str("nozzles:\n  tolerance: 0.3\n").unwrap();
        assert_eq!(config.nozzles.nozzle_count, 636);
        assert_eq!(config.nozzles.tolerance, 0.3);
        assert_eq!(config.output.prefix, "flaw_nozzle");
        assert_eq!(config.output.model_tag, "680k");
        assert!(config.output.machine.is_none());
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = PipelineConfig::default();
        config.nozzles.labels = vec!["A.tif".to_string(), "T.tif".to_string()];
        config.output.machine = Some("04".to_string());
        config.to_yaml(&path).unwrap();

        let loaded = PipelineConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
