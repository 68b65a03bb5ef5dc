/// Fixed affine normalization: `(x - mean) / scale`, per feature.
///
/// Parameters come from a standard-scaler export:
///
/// ```json
/// { "feature_names": ["log_streamflow", ...], "mean": [..6..], "scale": [..6..] }
/// ```
///
/// `feature_names` is optional; when present it must match the engine's
/// feature order exactly (checked by `ModelArtifacts`).

use crate::inference::ArtifactError;
use crate::model::UndeterminedReason;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    feature_names: Option<Vec<String>>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl ScalingParameters {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ArtifactError> {
        let params = Self {
            feature_names: None,
            mean,
            scale,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn with_feature_names(mut self, names: Vec<String>) -> Result<Self, ArtifactError> {
        self.feature_names = Some(names);
        self.validate()?;
        Ok(self)
    }

    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        let params: Self = serde_json::from_str(json)
            .map_err(|source| ArtifactError::Parse { what: "scaler", source })?;
        params.validate()?;
        Ok(params)
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if self.mean.len() != self.scale.len() {
            return Err(ArtifactError::DimensionMismatch {
                what: "scaler scale vs mean".to_string(),
                expected: self.mean.len(),
                actual: self.scale.len(),
            });
        }
        if let Some(names) = &self.feature_names {
            if names.len() != self.mean.len() {
                return Err(ArtifactError::DimensionMismatch {
                    what: "scaler feature_names vs mean".to_string(),
                    expected: self.mean.len(),
                    actual: names.len(),
                });
            }
        }
        for (i, (m, s)) in self.mean.iter().zip(&self.scale).enumerate() {
            if !m.is_finite() {
                return Err(ArtifactError::InvalidParameter(format!(
                    "scaler mean[{}] is not finite",
                    i
                )));
            }
            if !s.is_finite() || *s == 0.0 {
                return Err(ArtifactError::InvalidParameter(format!(
                    "scaler scale[{}] must be finite and non-zero, got {}",
                    i, s
                )));
            }
        }
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    /// Normalizes `features`, refusing vectors of the wrong length.
    pub fn transform(&self, features: &[f64]) -> Result<Vec<f64>, UndeterminedReason> {
        if features.len() != self.dim() {
            return Err(UndeterminedReason::DimensionMismatch {
                expected: self.dim(),
                actual: features.len(),
            });
        }
        Ok(features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }
}
