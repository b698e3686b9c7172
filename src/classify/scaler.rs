// Feature standardization
// Applies the pretrained per-feature mean/scale before classification

use serde::{Deserialize, Serialize};

use crate::classify::backend::ClassifierError;
use crate::motion::FeatureVector;

/// Standardized feature values, ready for the classifier
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledVector(pub Vec<f64>);

impl ScaledVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Per-feature standardization: `(x - mean) / scale`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Self {
        StandardScaler { mean, scale }
    }

    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, features: &FeatureVector) -> Result<ScaledVector, ClassifierError> {
        let values = features.as_slice();
        if self.mean.len() != values.len() || self.scale.len() != values.len() {
            return Err(ClassifierError::DimensionMismatch {
                stage: "scaler",
                expected: self.mean.len(),
                found: values.len(),
            });
        }

        let scaled = values
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(x, (mean, scale))| {
                // Constant training features carry a zero scale
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - mean) / scale
            })
            .collect();

        Ok(ScaledVector(scaled))
    }
}
