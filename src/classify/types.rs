// Motion label types
// Binary classifier output and its wire representation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Motion state of the subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionLabel {
    /// No tremor detected. Also the smoothed output until tremor is confirmed.
    Rest,

    /// Tremor detected
    Tremor,
}

impl MotionLabel {
    /// Map the classifier's numeric class (1 = tremor, anything else = rest)
    pub fn from_class(class: i64) -> Self {
        if class == 1 {
            MotionLabel::Tremor
        } else {
            MotionLabel::Rest
        }
    }

    /// Numeric class as stored in training data
    pub fn class(&self) -> i64 {
        match self {
            MotionLabel::Rest => 0,
            MotionLabel::Tremor => 1,
        }
    }

    /// Wire name used in prediction frames and CSV label columns
    pub fn as_str(&self) -> &'static str {
        match self {
            MotionLabel::Rest => "rest",
            MotionLabel::Tremor => "tremor",
        }
    }
}

impl fmt::Display for MotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
