// Configuration
// Command-line flags and the JSON-loadable pipeline configuration

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::classify::smoother::DEFAULT_SMOOTHING_DEPTH;
use crate::motion::TriggerPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid setting: {0}")]
    Invalid(String),

    #[error("--model is required in classify mode")]
    MissingModel,
}

/// Parameters of the windowing / filtering / smoothing pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Samples per analysis window
    pub window_size: usize,

    /// Hop between runs when `trigger` is `stride`
    pub stride: usize,

    /// Measured sampling rate of the sensor stream
    pub sample_rate_hz: f64,

    /// Low-pass cutoff frequency
    pub cutoff_hz: f64,

    /// Butterworth filter order
    pub filter_order: usize,

    /// Number of consecutive tremor predictions required to report tremor
    pub smoothing_depth: usize,

    pub trigger: TriggerPolicy,

    /// Clear the prediction history whenever a peer connects
    pub reset_history_on_connect: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            window_size: 150,
            stride: 75,
            sample_rate_hz: 71.4,
            cutoff_hz: 10.0,
            filter_order: 4,
            smoothing_depth: DEFAULT_SMOOTHING_DEPTH,
            trigger: TriggerPolicy::EverySample,
            reset_history_on_connect: false,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read(path)?;
        let config: PipelineConfig = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::Invalid("window_size must be positive".into()));
        }
        if self.stride == 0 {
            return Err(ConfigError::Invalid("stride must be positive".into()));
        }
        if !(self.sample_rate_hz > 0.0) {
            return Err(ConfigError::Invalid("sample_rate_hz must be positive".into()));
        }
        if self.smoothing_depth == 0 {
            return Err(ConfigError::Invalid("smoothing_depth must be positive".into()));
        }
        if self.filter_order == 0 {
            return Err(ConfigError::Invalid("filter_order must be at least 1".into()));
        }
        let nyquist_hz = self.sample_rate_hz / 2.0;
        if !(self.cutoff_hz > 0.0 && self.cutoff_hz < nyquist_hz) {
            return Err(ConfigError::Invalid(format!(
                "cutoff_hz must lie between 0 and {} Hz",
                nyquist_hz
            )));
        }
        // Zero-phase filtering pads each end by 3 × (order + 1) samples
        let pad_len = self.filter_pad_len();
        if self.window_size <= pad_len {
            return Err(ConfigError::Invalid(format!(
                "window_size {} must exceed the filter padding of {} samples",
                self.window_size, pad_len
            )));
        }
        Ok(())
    }

    /// Odd-extension length used by the zero-phase filter
    pub fn filter_pad_len(&self) -> usize {
        3 * (self.filter_order + 1)
    }
}

/// What the server does with incoming records
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SessionMode {
    /// Parse, classify and broadcast predictions
    Classify,

    /// Record labelled training data; records are relayed but not classified
    Collect,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "tremorwatch", about = "Streaming IMU rest/tremor classifier")]
pub struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP / WebSocket port
    #[arg(long, default_value = "8000")]
    pub port: u16,

    /// Directory holding index.html
    #[arg(long, default_value = "./www")]
    pub www: PathBuf,

    #[arg(long, value_enum, default_value = "classify")]
    pub mode: SessionMode,

    /// Pretrained model artifact (JSON)
    #[arg(long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Pipeline configuration (JSON)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Recording file name; nothing is recorded without it
    #[arg(long, value_name = "NAME")]
    pub output: Option<String>,

    /// Output directory for classify-mode recordings
    #[arg(long, default_value = "resultats")]
    pub results_dir: PathBuf,

    /// Output root for collect-mode recordings (one sub-directory per label)
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Recording duration in seconds, 0 for unlimited
    #[arg(long, default_value = "0")]
    pub duration: u64,

    /// Label attached to every collect-mode row
    #[arg(long, default_value = "non_defini")]
    pub label: String,

    /// JSONL file receiving one entry per pipeline run
    #[arg(long, value_name = "PATH")]
    pub trace: Option<PathBuf>,
}

impl Args {
    /// Collect-mode label, normalised like the directory it names
    pub fn normalized_label(&self) -> String {
        let label = self.label.trim().to_lowercase();
        if label.is_empty() {
            "non_defini".to_string()
        } else {
            label
        }
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        let config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }
}
