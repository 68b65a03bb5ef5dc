/// Binary probability classifier.
///
/// `MlpClassifier` evaluates a dense feed-forward network exported as JSON:
///
/// ```json
/// { "layers": [
///     { "weights": [[..in..], ..out..], "bias": [..out..], "activation": "relu" },
///     { "weights": [[..]], "bias": [b], "activation": "sigmoid" }
/// ] }
/// ```
///
/// Weights are row-major `[out][in]`. Evaluation is a pure function of the
/// input: no state is touched, so one instance serves any number of threads.

use crate::inference::ArtifactError;
use serde::{Deserialize, Serialize};

/// Forward-only probability model over a normalized feature vector.
pub trait Classifier: Send + Sync {
    fn input_dim(&self) -> usize;

    /// Raw probability for `features`; callers guarantee
    /// `features.len() == self.input_dim()`.
    fn forward(&self, features: &[f64]) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Sigmoid,
    Linear,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Linear => x,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    pub activation: Activation,
}

impl DenseLayer {
    fn input_dim(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    fn output_dim(&self) -> usize {
        self.weights.len()
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| {
                let z: f64 = row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b;
                self.activation.apply(z)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpClassifier {
    layers: Vec<DenseLayer>,
}

impl MlpClassifier {
    pub fn new(layers: Vec<DenseLayer>) -> Result<Self, ArtifactError> {
        let model = Self { layers };
        model.validate()?;
        Ok(model)
    }

    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        let model: Self = serde_json::from_str(json)
            .map_err(|source| ArtifactError::Parse { what: "classifier", source })?;
        model.validate()?;
        Ok(model)
    }

    /// Single sigmoid unit: logistic regression over the inputs.
    pub fn logistic(weights: Vec<f64>, bias: f64) -> Result<Self, ArtifactError> {
        Self::new(vec![DenseLayer {
            weights: vec![weights],
            bias: vec![bias],
            activation: Activation::Sigmoid,
        }])
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if self.layers.is_empty() {
            return Err(ArtifactError::InvalidParameter("classifier has no layers".to_string()));
        }

        for (i, layer) in self.layers.iter().enumerate() {
            let width = layer.input_dim();
            if width == 0 {
                return Err(ArtifactError::InvalidParameter(format!("layer {} has no weights", i)));
            }
            if let Some(row) = layer.weights.iter().position(|r| r.len() != width) {
                return Err(ArtifactError::DimensionMismatch {
                    what: format!("layer {} weight row {}", i, row),
                    expected: width,
                    actual: layer.weights[row].len(),
                });
            }
            if layer.bias.len() != layer.output_dim() {
                return Err(ArtifactError::DimensionMismatch {
                    what: format!("layer {} bias", i),
                    expected: layer.output_dim(),
                    actual: layer.bias.len(),
                });
            }
            let all_finite = layer
                .weights
                .iter()
                .flatten()
                .chain(&layer.bias)
                .all(|v| v.is_finite());
            if !all_finite {
                return Err(ArtifactError::InvalidParameter(format!(
                    "layer {} contains non-finite parameters",
                    i
                )));
            }
        }

        for (i, pair) in self.layers.windows(2).enumerate() {
            if pair[0].output_dim() != pair[1].input_dim() {
                return Err(ArtifactError::DimensionMismatch {
                    what: format!("layer {} input", i + 1),
                    expected: pair[0].output_dim(),
                    actual: pair[1].input_dim(),
                });
            }
        }

        let outputs = self.layers.last().map_or(0, DenseLayer::output_dim);
        if outputs != 1 {
            return Err(ArtifactError::DimensionMismatch {
                what: "classifier output".to_string(),
                expected: 1,
                actual: outputs,
            });
        }
        Ok(())
    }
}

impl Classifier for MlpClassifier {
    fn input_dim(&self) -> usize {
        self.layers.first().map_or(0, DenseLayer::input_dim)
    }

    fn forward(&self, features: &[f64]) -> f64 {
        let mut activations = features.to_vec();
        for layer in &self.layers {
            activations = layer.forward(&activations);
        }
        activations.first().copied().unwrap_or(f64::NAN)
    }
}
