/// Service configuration loader - parses flood_risk.toml
///
/// Keeps window lengths, artifact locations and timeouts out of the code so
/// a deployment can retune them without recompiling. Every field has a
/// default; a partial file only overrides what it names.
///
/// Precedence: defaults < `flood_risk.toml` < environment (`.env` included).

use crate::acquire::FallbackPolicy;
use crate::analysis::features::FeatureConfig;
use crate::pipeline::PipelineConfig;
use chrono::Duration as ChronoDuration;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "flood_risk.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AcquisitionSection {
    /// Minimum days of observations fetched before the target instant.
    /// See `PipelineConfig::acquisition_days` for the span actually requested.
    pub lookback_days: u32,
    /// Time shared by the primary attempt and the fallback.
    pub timeout_budget_secs: u64,
}

impl Default for AcquisitionSection {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            timeout_budget_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeatureSection {
    /// Rolling percentile window. Independent of `lookback_days`.
    pub window_days: u32,
    pub coverage_tolerance_hours: u32,
}

impl Default for FeatureSection {
    fn default() -> Self {
        Self {
            window_days: 7,
            coverage_tolerance_hours: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlignmentSection {
    /// 0 carries the last row forward without limit.
    pub max_carry_forward_days: u32,
}

impl Default for AlignmentSection {
    fn default() -> Self {
        Self {
            max_carry_forward_days: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ArtifactSection {
    pub scaler_path: PathBuf,
    pub classifier_path: PathBuf,
}

impl Default for ArtifactSection {
    fn default() -> Self {
        Self {
            scaler_path: PathBuf::from("artifacts/scaler.json"),
            classifier_path: PathBuf::from("artifacts/classifier.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub stations_path: PathBuf,
    /// Threads for HTTP request handling and batch predictions.
    pub workers: usize,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            stations_path: PathBuf::from("stations.toml"),
            workers: 4,
        }
    }
}

/// Root configuration structure for TOML parsing
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub acquisition: AcquisitionSection,
    pub features: FeatureSection,
    pub alignment: AlignmentSection,
    pub artifacts: ArtifactSection,
    pub service: ServiceSection,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl ServiceConfig {
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration for the service.
    ///
    /// `explicit` is a path the operator asked for (CLI flag); it must exist.
    /// Otherwise `FLOOD_CONFIG`, then `flood_risk.toml` in the working
    /// directory are tried, and a missing default file means all defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let requested = explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var("FLOOD_CONFIG").ok().map(PathBuf::from));

        let mut config = match requested {
            Some(path) => Self::from_toml(&read(&path)?)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::from_toml(&read(path)?)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `FLOOD_*` overrides looked up through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FLOOD_LOOKBACK_DAYS") {
            self.acquisition.lookback_days = parse_number("FLOOD_LOOKBACK_DAYS", &v)?;
        }
        if let Some(v) = lookup("FLOOD_WINDOW_DAYS") {
            self.features.window_days = parse_number("FLOOD_WINDOW_DAYS", &v)?;
        }
        if let Some(v) = lookup("FLOOD_SCALER_PATH") {
            self.artifacts.scaler_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("FLOOD_CLASSIFIER_PATH") {
            self.artifacts.classifier_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("FLOOD_STATIONS_PATH") {
            self.service.stations_path = PathBuf::from(v);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.acquisition.lookback_days == 0 {
            return Err(ConfigError::Invalid("acquisition.lookback_days must be positive".into()));
        }
        if self.features.window_days == 0 {
            return Err(ConfigError::Invalid("features.window_days must be positive".into()));
        }
        if i64::from(self.features.coverage_tolerance_hours) >= i64::from(self.features.window_days) * 24 {
            return Err(ConfigError::Invalid(
                "features.coverage_tolerance_hours must be shorter than the window".into(),
            ));
        }
        if self.service.workers == 0 {
            return Err(ConfigError::Invalid("service.workers must be positive".into()));
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let carry = self.alignment.max_carry_forward_days;
        PipelineConfig {
            lookback_days: self.acquisition.lookback_days,
            features: FeatureConfig {
                window: ChronoDuration::days(i64::from(self.features.window_days)),
                coverage_tolerance: ChronoDuration::hours(i64::from(self.features.coverage_tolerance_hours)),
            },
            max_carry_forward: (carry > 0).then(|| ChronoDuration::days(i64::from(carry))),
        }
    }

    pub fn fallback_policy(&self) -> FallbackPolicy {
        FallbackPolicy::with_budget(Duration::from_secs(self.acquisition.timeout_budget_secs))
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} must be a number, got '{}'", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = ServiceConfig::from_toml("").expect("empty config is valid");
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.acquisition.lookback_days, 7);
        assert_eq!(config.features.window_days, 7);
    }

    #[test]
    fn test_partial_file_overrides_only_named_fields() {
        let config = ServiceConfig::from_toml(
            r#"
            [features]
            window_days = 14

            [artifacts]
            scaler_path = "/models/scaler.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.features.window_days, 14);
        assert_eq!(config.features.coverage_tolerance_hours, 6);
        assert_eq!(config.acquisition.lookback_days, 7, "lookback stays independent");
        assert_eq!(config.artifacts.scaler_path, PathBuf::from("/models/scaler.json"));
        assert_eq!(config.artifacts.classifier_path, PathBuf::from("artifacts/classifier.json"));
    }

    #[test]
    fn test_zero_lookback_rejected() {
        let result = ServiceConfig::from_toml("[acquisition]\nlookback_days = 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_tolerance_longer_than_window_rejected() {
        let result = ServiceConfig::from_toml(
            "[features]\nwindow_days = 1\ncoverage_tolerance_hours = 24\n",
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = ServiceConfig::from_toml("[acquisition\nlookback_days = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("FLOOD_LOOKBACK_DAYS", "10"),
            ("FLOOD_CLASSIFIER_PATH", "/tmp/model.json"),
        ]
        .into_iter()
        .collect();
        let mut config = ServiceConfig::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.acquisition.lookback_days, 10);
        assert_eq!(config.artifacts.classifier_path, PathBuf::from("/tmp/model.json"));
        assert_eq!(config.features.window_days, 7);
    }

    #[test]
    fn test_non_numeric_env_override_rejected() {
        let mut config = ServiceConfig::default();
        let result = config.apply_env_overrides(|k| {
            (k == "FLOOD_WINDOW_DAYS").then(|| "a week".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_pipeline_config_conversion() {
        let config = ServiceConfig::from_toml("[alignment]\nmax_carry_forward_days = 0\n").unwrap();
        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.lookback_days, 7);
        assert_eq!(pipeline.features.window, ChronoDuration::days(7));
        assert_eq!(pipeline.features.coverage_tolerance, ChronoDuration::hours(6));
        assert_eq!(pipeline.max_carry_forward, None, "0 disables the bound");
        assert_eq!(pipeline.acquisition_days(), 15, "unbounded carry falls back to the lookback");
    }

    #[test]
    fn test_fallback_budget_conversion() {
        let config = ServiceConfig::from_toml("[acquisition]\ntimeout_budget_secs = 12\n").unwrap();
        assert_eq!(config.fallback_policy().budget, Duration::from_secs(12));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let result = ServiceConfig::load(Some(Path::new("/definitely/not/here/flood_risk.toml")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flood_risk.toml");
        fs::write(&path, "[service]\nworkers = 2\n").unwrap();
        let config = ServiceConfig::load(Some(&path)).expect("file should load");
        assert_eq!(config.service.workers, 2);
    }
}
