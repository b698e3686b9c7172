// Classifier backend abstraction
// Pretrained binary models: linear decision function or nearest-neighbour vote

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::scaler::{ScaledVector, StandardScaler};
use crate::classify::types::MotionLabel;
use crate::motion::FeatureVector;

/// Classification backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierBackend {
    /// Linear decision function (logistic regression, linear SVM)
    Linear,

    /// K-nearest-neighbour vote over stored reference vectors
    Knn,
}

/// Errors that can occur during classification
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("{stage} expects {expected} features, got {found}")]
    DimensionMismatch {
        stage: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Feature {index} is not finite")]
    NonFinite { index: usize },

    #[error("Model has no reference samples")]
    EmptyReference,
}

/// A labelled reference vector for the KNN backend (already standardized)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceSample {
    pub features: Vec<f64>,
    pub class: i64,
}

/// Pretrained model parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    /// Class 1 when `coef · x + intercept > threshold`
    Linear {
        coef: Vec<f64>,
        intercept: f64,
        #[serde(default)]
        threshold: f64,
    },

    /// Majority class among the k nearest references; ties go to class 0
    Knn {
        k: usize,
        references: Vec<ReferenceSample>,
    },
}

/// Scaler + model pair, invoked once per pipeline run
#[derive(Debug, Clone)]
pub struct Classifier {
    scaler: Option<StandardScaler>,
    model: ModelSpec,
}

impl Classifier {
    /// Create a classifier; without a scaler features pass through unchanged
    pub fn new(model: ModelSpec, scaler: Option<StandardScaler>) -> Self {
        Classifier { scaler, model }
    }

    /// Get the current backend type
    pub fn backend(&self) -> ClassifierBackend {
        match self.model {
            ModelSpec::Linear { .. } => ClassifierBackend::Linear,
            ModelSpec::Knn { .. } => ClassifierBackend::Knn,
        }
    }

    /// Apply the pretrained scaler
    pub fn standardize(&self, features: &FeatureVector) -> Result<ScaledVector, ClassifierError> {
        match &self.scaler {
            Some(scaler) => scaler.transform(features),
            None => Ok(ScaledVector(features.as_slice().to_vec())),
        }
    }

    /// Classify standardized features
    pub fn classify(&self, scaled: &ScaledVector) -> Result<MotionLabel, ClassifierError> {
        let x = scaled.as_slice();
        if let Some(index) = x.iter().position(|v| !v.is_finite()) {
            return Err(ClassifierError::NonFinite { index });
        }

        let class = match &self.model {
            ModelSpec::Linear {
                coef,
                intercept,
                threshold,
            } => {
                check_dimension("linear model", coef.len(), x.len())?;
                let score: f64 = coef.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + intercept;
                if score > *threshold {
                    1
                } else {
                    0
                }
            }
            ModelSpec::Knn { k, references } => knn_vote(*k, references, x)?,
        };

        Ok(MotionLabel::from_class(class))
    }

    /// Standardize then classify
    pub fn predict(&self, features: &FeatureVector) -> Result<MotionLabel, ClassifierError> {
        let scaled = self.standardize(features)?;
        self.classify(&scaled)
    }

    /// Number of features the model was trained on
    pub fn dimension(&self) -> Option<usize> {
        match &self.model {
            ModelSpec::Linear { coef, .. } => Some(coef.len()),
            ModelSpec::Knn { references, .. } => references.first().map(|r| r.features.len()),
        }
    }

    pub fn scaler(&self) -> Option<&StandardScaler> {
        self.scaler.as_ref()
    }
}

fn check_dimension(stage: &'static str, expected: usize, found: usize) -> Result<(), ClassifierError> {
    if expected == found {
        Ok(())
    } else {
        Err(ClassifierError::DimensionMismatch {
            stage,
            expected,
            found,
        })
    }
}

fn knn_vote(k: usize, references: &[ReferenceSample], x: &[f64]) -> Result<i64, ClassifierError> {
    if references.is_empty() {
        return Err(ClassifierError::EmptyReference);
    }

    let mut distances: Vec<(f64, i64)> = Vec::with_capacity(references.len());
    for reference in references {
        check_dimension("knn reference", reference.features.len(), x.len())?;
        let distance = reference
            .features
            .iter()
            .zip(x)
            .map(|(r, v)| (r - v).powi(2))
            .sum::<f64>()
            .sqrt();
        distances.push((distance, reference.class));
    }

    distances.sort_by(|a, b| a.0.total_cmp(&b.0));

    let nearest = distances.iter().take(k.max(1));
    let (tremor, rest) = nearest.fold((0usize, 0usize), |(t, r), (_, class)| {
        if *class == 1 {
            (t + 1, r)
        } else {
            (t, r + 1)
        }
    });

    Ok(if tremor > rest { 1 } else { 0 })
}
