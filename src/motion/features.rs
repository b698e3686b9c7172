// Window feature extraction
// Per-axis statistics and dominant frequency for motion-state classification
//
// The pretrained scaler and classifier consume these values positionally.
// Reordering axes or statistics silently breaks every stored model, so the
// layout below is fixed: axis-major, statistics in STATS order.

use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::motion::sample::Axis;
use crate::motion::window::ChannelFrame;

/// Statistics computed for every axis, in vector order
pub const STATS: [&str; 6] = ["mean", "std", "min", "max", "energy", "dom_freq"];

/// Number of values in a feature vector (6 axes × 6 statistics)
pub const FEATURE_COUNT: usize = 36;

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("Window is empty")]
    EmptyWindow,

    #[error("Channel {0} missing from window")]
    MissingChannel(&'static str),

    #[error("FFT failed: {0}")]
    Fft(String),

    #[error("Feature vector has {found} values, expected 36")]
    WrongLength { found: usize },
}

/// Fixed-length feature vector for one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    /// Wrap raw values; fails unless exactly FEATURE_COUNT are given
    pub fn from_values(values: Vec<f64>) -> Option<Self> {
        if values.len() == FEATURE_COUNT {
            Some(FeatureVector { values })
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Value of one statistic for one axis
    pub fn get(&self, axis: Axis, stat: &str) -> Option<f64> {
        let stat_index = STATS.iter().position(|s| *s == stat)?;
        self.values.get(axis.index() * STATS.len() + stat_index).copied()
    }

    /// Feature names in vector order, e.g. `accel.x_mean` … `gyro.z_dom_freq`
    pub fn names() -> Vec<String> {
        Axis::ALL
            .iter()
            .flat_map(|axis| STATS.iter().map(move |stat| format!("{}_{}", axis.name(), stat)))
            .collect()
    }
}

impl TryFrom<Vec<f64>> for FeatureVector {
    type Error = FeatureError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        let found = values.len();
        FeatureVector::from_values(values).ok_or(FeatureError::WrongLength { found })
    }
}

impl From<FeatureVector> for Vec<f64> {
    fn from(features: FeatureVector) -> Self {
        features.values
    }
}

/// Statistics for one axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub energy: f64,
    pub dom_freq: f64,
}

impl AxisStats {
    fn to_array(self) -> [f64; 6] {
        [self.mean, self.std, self.min, self.max, self.energy, self.dom_freq]
    }
}

/// Extract the feature vector from a (filtered) window
pub fn extract_features(
    frame: &ChannelFrame,
    sample_rate_hz: f64,
) -> Result<FeatureVector, FeatureError> {
    if frame.is_empty() {
        return Err(FeatureError::EmptyWindow);
    }

    let mut values = Vec::with_capacity(FEATURE_COUNT);
    for axis in Axis::ALL {
        let channel = frame
            .channel(axis)
            .ok_or(FeatureError::MissingChannel(axis.name()))?;
        let stats = axis_stats(channel, sample_rate_hz)?;
        values.extend_from_slice(&stats.to_array());
    }

    Ok(FeatureVector { values })
}

/// Compute all statistics for a single channel
pub fn axis_stats(values: &[f64], sample_rate_hz: f64) -> Result<AxisStats, FeatureError> {
    if values.is_empty() {
        return Err(FeatureError::EmptyWindow);
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    // Population variance (divide by n)
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let energy = values.iter().map(|x| x * x).sum::<f64>();
    let dom_freq = dominant_frequency(values, sample_rate_hz)?;

    Ok(AxisStats {
        mean,
        std: variance.sqrt(),
        min,
        max,
        energy,
        dom_freq,
    })
}

/// Frequency of the strongest bin in the lower half of the spectrum
///
/// Bins `0..n/2` are searched, DC included; ties resolve to the lowest bin.
/// Bin spacing is `sample_rate_hz / n`.
pub fn dominant_frequency(values: &[f64], sample_rate_hz: f64) -> Result<f64, FeatureError> {
    let n = values.len();
    let half = n / 2;
    if half == 0 {
        return Ok(0.0);
    }

    let spectrum = compute_fft(values)?;

    let mut best_bin = 0;
    let mut best_magnitude = f64::NEG_INFINITY;
    for (bin, &magnitude) in spectrum.iter().take(half).enumerate() {
        if magnitude > best_magnitude {
            best_magnitude = magnitude;
            best_bin = bin;
        }
    }

    let bin_width = sample_rate_hz / n as f64;
    Ok(best_bin as f64 * bin_width)
}

/// Compute real FFT and return magnitude spectrum
fn compute_fft(values: &[f64]) -> Result<Vec<f64>, FeatureError> {
    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(values.len());

    let mut input = values.to_vec();
    let mut spectrum = fft.make_output_vec();

    fft.process(&mut input, &mut spectrum)
        .map_err(|e| FeatureError::Fft(e.to_string()))?;

    Ok(spectrum.iter().map(|c| c.norm()).collect())
}
