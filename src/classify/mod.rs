// Classification module
// Pretrained scaler + binary classifier, model artifacts, and prediction smoothing

pub mod backend;
pub mod model;
pub mod scaler;
pub mod smoother;
pub mod types;

pub use backend::{Classifier, ClassifierBackend, ClassifierError, ModelSpec, ReferenceSample};
pub use model::{load_model, LoadedModel, ModelArtifact, ModelError};
pub use scaler::{ScaledVector, StandardScaler};
pub use smoother::PredictionSmoother;
pub use types::MotionLabel;
