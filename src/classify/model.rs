// Pretrained model artifacts
// Loads scaler + classifier parameters from JSON and checks them against the feature layout

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;

use crate::classify::backend::{Classifier, ModelSpec};
use crate::classify::scaler::StandardScaler;
use crate::motion::{FeatureVector, FEATURE_COUNT};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid model artifact: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Artifact lists {found} feature names, expected 36")]
    FeatureCount { found: usize },

    #[error("Feature {index} is {found:?} in the artifact but {expected:?} here")]
    FeatureOrder {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("{part} has {found} dimensions, expected 36")]
    Dimension { part: &'static str, found: usize },
}

/// On-disk artifact: optional feature names, optional scaler, required model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Feature names the model was trained with, in training order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaler: Option<StandardScaler>,

    pub model: ModelSpec,
}

/// A validated classifier plus where it came from
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub classifier: Classifier,
    pub name: Option<String>,
    /// SHA-256 of the artifact bytes, hex encoded
    pub fingerprint: String,
}

impl ModelArtifact {
    pub fn from_json_bytes(data: &[u8]) -> Result<Self, ModelError> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    /// Check the artifact against the feature layout this build produces
    pub fn validate(&self) -> Result<(), ModelError> {
        if let Some(names) = &self.feature_names {
            if names.len() != FEATURE_COUNT {
                return Err(ModelError::FeatureCount { found: names.len() });
            }
            for (index, (expected, found)) in FeatureVector::names().iter().zip(names).enumerate() {
                if expected != found {
                    return Err(ModelError::FeatureOrder {
                        index,
                        expected: expected.clone(),
                        found: found.clone(),
                    });
                }
            }
        }

        if let Some(scaler) = &self.scaler {
            for (part, len) in [("scaler mean", scaler.mean.len()), ("scaler scale", scaler.scale.len())] {
                if len != FEATURE_COUNT {
                    return Err(ModelError::Dimension { part, found: len });
                }
            }
        }

        match &self.model {
            ModelSpec::Linear { coef, .. } if coef.len() != FEATURE_COUNT => {
                return Err(ModelError::Dimension {
                    part: "linear coefficients",
                    found: coef.len(),
                });
            }
            ModelSpec::Knn { references, .. } => {
                if let Some(bad) = references.iter().find(|r| r.features.len() != FEATURE_COUNT) {
                    return Err(ModelError::Dimension {
                        part: "knn reference",
                        found: bad.features.len(),
                    });
                }
            }
            _ => {}
        }

        Ok(())
    }

    pub fn into_classifier(self) -> Classifier {
        Classifier::new(self.model, self.scaler)
    }
}

/// Hex SHA-256 of artifact bytes
pub fn fingerprint(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Parse and validate an artifact held in memory
pub fn load_model_bytes(data: &[u8]) -> Result<LoadedModel, ModelError> {
    let artifact = ModelArtifact::from_json_bytes(data)?;
    artifact.validate()?;

    let name = artifact.name.clone();
    Ok(LoadedModel {
        classifier: artifact.into_classifier(),
        name,
        fingerprint: fingerprint(data),
    })
}

/// Read, parse and validate an artifact file
pub fn load_model(path: &Path) -> Result<LoadedModel, ModelError> {
    let data = std::fs::read(path)?;
    let loaded = load_model_bytes(&data)?;

    log::info!(
        "Loaded {:?} model {} from {} (sha256 {})",
        loaded.classifier.backend(),
        loaded.name.as_deref().unwrap_or("<unnamed>"),
        path.display(),
        loaded.fingerprint
    );

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::backend::ClassifierBackend;
    use std::fs;
    use tempfile::TempDir;

    fn linear_artifact() -> ModelArtifact {
        ModelArtifact {
            name: Some("test".to_string()),
            feature_names: Some(FeatureVector::names()),
            scaler: Some(StandardScaler::new(
                vec![0.0; FEATURE_COUNT],
                vec![1.0; FEATURE_COUNT],
            )),
            model: ModelSpec::Linear {
                coef: vec![0.1; FEATURE_COUNT],
                intercept: -1.0,
                threshold: 0.0,
            },
        }
    }

    #[test]
    fn test_load_model_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.json");
        let bytes = linear_artifact().to_json_bytes().unwrap();
        fs::write(&path, &bytes).unwrap();

        let loaded = load_model(&path).unwrap();
        assert_eq!(loaded.classifier.backend(), ClassifierBackend::Linear);
        assert_eq!(loaded.name.as_deref(), Some("test"));
        assert_eq!(loaded.fingerprint, fingerprint(&bytes));
        assert_eq!(loaded.fingerprint.len(), 64);
    }

    #[test]
    fn test_reordered_feature_names_rejected() {
        let mut artifact = linear_artifact();
        if let Some(names) = artifact.feature_names.as_mut() {
            names.swap(0, 1);
        }
        match artifact.validate() {
            Err(ModelError::FeatureOrder { index, expected, .. }) => {
                assert_eq!(index, 0);
                assert_eq!(expected, "accel.x_mean");
            }
            other => panic!("expected feature order error, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_dimensions_rejected() {
        let mut artifact = linear_artifact();
        artifact.model = ModelSpec::Linear {
            coef: vec![1.0; 12],
            intercept: 0.0,
            threshold: 0.0,
        };
        assert!(matches!(
            artifact.validate(),
            Err(ModelError::Dimension { found: 12, .. })
        ));

        let mut artifact = linear_artifact();
        artifact.scaler = Some(StandardScaler::new(vec![0.0; 36], vec![1.0; 30]));
        assert!(matches!(
            artifact.validate(),
            Err(ModelError::Dimension { part: "scaler scale", .. })
        ));
    }

    #[test]
    fn test_minimal_artifact() {
        let json = format!(
            r#"{{"model": {{"kind": "knn", "k": 1, "references": [{{"features": {:?}, "class": 1}}]}}}}"#,
            vec![0.0; FEATURE_COUNT]
        );
        let loaded = load_model_bytes(json.as_bytes()).unwrap();
        assert_eq!(loaded.classifier.backend(), ClassifierBackend::Knn);
        assert!(loaded.classifier.scaler().is_none());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(load_model_bytes(b"not json"), Err(ModelError::Json(_))));
    }
}
