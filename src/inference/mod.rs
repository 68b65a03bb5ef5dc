/// Normalizer + classifier artifacts.
///
/// Both artifacts are loaded once at startup, checked against the feature
/// contract in `model::FEATURE_NAMES`, and then shared read-only by every
/// prediction. A disagreement in feature count or order is fatal here so that
/// requests never run against a mismatched model.
///
/// - `scaler`     — `ScalingParameters` (per-feature mean/scale)
/// - `classifier` — `Classifier` trait + `MlpClassifier`

pub mod classifier;
pub mod scaler;

use crate::model::{FeatureVector, UndeterminedReason, FEATURE_COUNT, FEATURE_NAMES};
use classifier::{Classifier, MlpClassifier};
use scaler::ScalingParameters;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {what} artifact: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("dimension mismatch in {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },
    #[error("feature order mismatch: expected {expected:?}, got {actual:?}")]
    FeatureOrder {
        expected: Vec<String>,
        actual: Vec<String>,
    },
    #[error("invalid artifact parameter: {0}")]
    InvalidParameter(String),
    #[error(
        "artifacts already loaded from {} and {}",
        .scaler_path.display(),
        .classifier_path.display()
    )]
    AlreadyLoaded {
        scaler_path: PathBuf,
        classifier_path: PathBuf,
    },
}

/// The immutable pair every prediction reads.
#[derive(Clone)]
pub struct ModelArtifacts {
    scaler: ScalingParameters,
    classifier: Arc<dyn Classifier>,
}

impl std::fmt::Debug for ModelArtifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelArtifacts")
            .field("scaler_dim", &self.scaler.dim())
            .field("classifier_input_dim", &self.classifier.input_dim())
            .finish()
    }
}

impl ModelArtifacts {
    /// Pairs a scaler with a classifier, refusing any feature-count or
    /// feature-order disagreement with the engine.
    pub fn new(scaler: ScalingParameters, classifier: Arc<dyn Classifier>) -> Result<Self, ArtifactError> {
        if scaler.dim() != FEATURE_COUNT {
            return Err(ArtifactError::DimensionMismatch {
                what: "scaler vs feature engine".to_string(),
                expected: FEATURE_COUNT,
                actual: scaler.dim(),
            });
        }
        if classifier.input_dim() != scaler.dim() {
            return Err(ArtifactError::DimensionMismatch {
                what: "classifier input vs scaler".to_string(),
                expected: scaler.dim(),
                actual: classifier.input_dim(),
            });
        }
        if let Some(names) = scaler.feature_names() {
            if names.iter().map(String::as_str).ne(FEATURE_NAMES) {
                return Err(ArtifactError::FeatureOrder {
                    expected: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
                    actual: names.to_vec(),
                });
            }
        }
        Ok(Self { scaler, classifier })
    }

    /// Reads a JSON scaler and a JSON dense classifier from disk.
    pub fn load(scaler_path: &Path, classifier_path: &Path) -> Result<Self, ArtifactError> {
        let scaler = ScalingParameters::from_json(&read(scaler_path)?)?;
        let classifier = MlpClassifier::from_json(&read(classifier_path)?)?;
        let artifacts = Self::new(scaler, Arc::new(classifier))?;
        info!(
            scaler = %scaler_path.display(),
            classifier = %classifier_path.display(),
            features = FEATURE_COUNT,
            "loaded model artifacts"
        );
        Ok(artifacts)
    }

    pub fn scaler(&self) -> &ScalingParameters {
        &self.scaler
    }

    /// Normalizes a sanitized feature vector and runs the classifier.
    pub fn probability(&self, features: &FeatureVector) -> Result<f64, UndeterminedReason> {
        self.probability_of(features)
    }

    /// As `probability`, for vectors whose length is not fixed by the type.
    /// Fails closed on a length mismatch.
    pub fn probability_of(&self, features: &[f64]) -> Result<f64, UndeterminedReason> {
        let normalized = self.scaler.transform(features)?;
        let raw = self.classifier.forward(&normalized);
        if !raw.is_finite() {
            return Err(UndeterminedReason::NonFiniteProbability);
        }
        Ok(raw.clamp(0.0, 1.0))
    }
}

fn read(path: &Path) -> Result<String, ArtifactError> {
    fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Process-wide artifacts
// ---------------------------------------------------------------------------

struct LoadedArtifacts {
    scaler_path: PathBuf,
    classifier_path: PathBuf,
    artifacts: Arc<ModelArtifacts>,
}

static SHARED: Mutex<Option<LoadedArtifacts>> = Mutex::new(None);

/// Loads the artifacts at most once per process and hands out shared
/// handles. Concurrent first callers wait on the lock rather than loading
/// twice; a failed load leaves the slot empty so a later call may retry.
///
/// Once loaded, a call naming different paths (compared as given, not
/// canonicalized) fails with `ArtifactError::AlreadyLoaded`.
pub fn shared_artifacts(scaler_path: &Path, classifier_path: &Path) -> Result<Arc<ModelArtifacts>, ArtifactError> {
    let mut slot = SHARED.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(existing) = slot.as_ref() {
        if existing.scaler_path != scaler_path || existing.classifier_path != classifier_path {
            return Err(ArtifactError::AlreadyLoaded {
                scaler_path: existing.scaler_path.clone(),
                classifier_path: existing.classifier_path.clone(),
            });
        }
        return Ok(Arc::clone(&existing.artifacts));
    }
    let loaded = Arc::new(ModelArtifacts::load(scaler_path, classifier_path)?);
    *slot = Some(LoadedArtifacts {
        scaler_path: scaler_path.to_path_buf(),
        classifier_path: classifier_path.to_path_buf(),
        artifacts: Arc::clone(&loaded),
    });
    Ok(loaded)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn scaler() -> ScalingParameters {
        ScalingParameters::new(vec![0.0; FEATURE_COUNT], vec![1.0; FEATURE_COUNT]).unwrap()
    }

    fn logistic() -> Arc<dyn Classifier> {
        Arc::new(MlpClassifier::logistic(vec![0.5; FEATURE_COUNT], -1.0).unwrap())
    }

    #[test]
    fn test_matching_artifacts_accepted() {
        assert!(ModelArtifacts::new(scaler(), logistic()).is_ok());
    }

    #[test]
    fn test_scaler_with_wrong_feature_count_rejected() {
        let five = ScalingParameters::new(vec![0.0; 5], vec![1.0; 5]).unwrap();
        let model: Arc<dyn Classifier> = Arc::new(MlpClassifier::logistic(vec![0.5; 5], 0.0).unwrap());
        let result = ModelArtifacts::new(five, model);
        assert!(matches!(result, Err(ArtifactError::DimensionMismatch { expected: 6, actual: 5, .. })));
    }

    #[test]
    fn test_classifier_scaler_disagreement_rejected() {
        let model: Arc<dyn Classifier> = Arc::new(MlpClassifier::logistic(vec![0.5; 7], 0.0).unwrap());
        let result = ModelArtifacts::new(scaler(), model);
        assert!(matches!(result, Err(ArtifactError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_feature_order_regression_rejected() {
        let mut names: Vec<String> = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        names.swap(4, 5);
        let reordered = scaler().with_feature_names(names).unwrap();
        let result = ModelArtifacts::new(reordered, logistic());
        assert!(matches!(result, Err(ArtifactError::FeatureOrder { .. })));
    }

    #[test]
    fn test_matching_feature_names_accepted() {
        let names = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        let named = scaler().with_feature_names(names).unwrap();
        assert!(ModelArtifacts::new(named, logistic()).is_ok());
    }

    #[test]
    fn test_probability_of_wrong_length_fails_closed() {
        let artifacts = ModelArtifacts::new(scaler(), logistic()).unwrap();
        assert_eq!(
            artifacts.probability_of(&[0.0; 4]),
            Err(UndeterminedReason::DimensionMismatch { expected: 6, actual: 4 })
        );
    }

    #[test]
    fn test_probability_is_in_unit_interval() {
        let artifacts = ModelArtifacts::new(scaler(), logistic()).unwrap();
        let p = artifacts.probability(&[2.0; FEATURE_COUNT]).unwrap();
        assert!((0.0..=1.0).contains(&p));
        let expected = 1.0 / (1.0 + (-(0.5 * 12.0 - 1.0_f64)).exp());
        assert!((p - expected).abs() < 1e-12);
    }

    fn write_artifacts(dir: &Path) -> (PathBuf, PathBuf) {
        let scaler_path = dir.join("scaler.json");
        let model_path = dir.join("classifier.json");

        let mut f = fs::File::create(&scaler_path).unwrap();
        write!(f, "{}", serde_json::to_string(&scaler()).unwrap()).unwrap();
        let model = MlpClassifier::logistic(vec![0.1; FEATURE_COUNT], 0.0).unwrap();
        fs::write(&model_path, serde_json::to_string(&model).unwrap()).unwrap();
        (scaler_path, model_path)
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let (scaler_path, model_path) = write_artifacts(dir.path());

        let artifacts = ModelArtifacts::load(&scaler_path, &model_path).expect("should load");
        assert_eq!(artifacts.scaler().dim(), FEATURE_COUNT);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ModelArtifacts::load(&dir.path().join("nope.json"), &dir.path().join("nope2.json"));
        assert!(matches!(result, Err(ArtifactError::Io { .. })));
    }

    // The only test touching the process-wide slot; keep it that way.
    #[test]
    fn test_shared_artifacts_load_once_across_threads() {
        let dir = tempfile::tempdir().unwrap();
        let (scaler_path, model_path) = write_artifacts(dir.path());

        let barrier = Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let (scaler_path, model_path) = (scaler_path.clone(), model_path.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    shared_artifacts(&scaler_path, &model_path).expect("shared load should succeed")
                })
            })
            .collect();
        let loaded: Vec<Arc<ModelArtifacts>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for other in &loaded[1..] {
            assert!(Arc::ptr_eq(&loaded[0], other), "every caller must share one load");
        }

        let elsewhere = tempfile::tempdir().unwrap();
        let (other_scaler, other_model) = write_artifacts(elsewhere.path());
        let result = shared_artifacts(&other_scaler, &other_model);
        assert!(
            matches!(result, Err(ArtifactError::AlreadyLoaded { .. })),
            "different paths must not silently return the first load"
        );

        let again = shared_artifacts(&scaler_path, &model_path).unwrap();
        assert!(Arc::ptr_eq(&loaded[0], &again));
    }
}
