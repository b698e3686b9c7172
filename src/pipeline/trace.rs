// Prediction trace
// Append-only JSONL log of every pipeline run, for offline review of live sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::classify::MotionLabel;
use crate::motion::FeatureVector;

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// One pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionTrace {
    /// RFC 3339 time of the run
    pub timestamp: String,

    /// Accepted-sample count at the time of the run
    pub sample_index: u64,

    pub raw: MotionLabel,

    pub smoothed: MotionLabel,

    pub features: FeatureVector,
}

impl PredictionTrace {
    pub fn new(
        at: DateTime<Utc>,
        sample_index: u64,
        raw: MotionLabel,
        smoothed: MotionLabel,
        features: FeatureVector,
    ) -> Self {
        PredictionTrace {
            timestamp: at.to_rfc3339(),
            sample_index,
            raw,
            smoothed,
            features,
        }
    }

    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Append-only JSONL trace writer; keeps the file open for the session
pub struct TraceWriter {
    file_path: PathBuf,
    file: File,
}

impl TraceWriter {
    /// Open (or create) the trace file for appending
    pub fn open(file_path: PathBuf) -> Result<Self, TraceError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)?;
        Ok(TraceWriter { file_path, file })
    }

    pub fn write(&mut self, entry: &PredictionTrace) -> Result<(), TraceError> {
        let json_line = entry.to_json_line()?;
        self.file.write_all(json_line.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Read trace entries from a JSONL file
pub fn read_trace_file(path: &Path) -> Result<Vec<PredictionTrace>, TraceError> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::FEATURE_COUNT;
    use tempfile::TempDir;

    fn entry(index: u64, smoothed: MotionLabel) -> PredictionTrace {
        PredictionTrace::new(
            Utc::now(),
            index,
            MotionLabel::Tremor,
            smoothed,
            FeatureVector::from_values(vec![0.5; FEATURE_COUNT]).unwrap(),
        )
    }

    #[test]
    fn test_json_line_format() {
        let line = entry(150, MotionLabel::Rest).to_json_line().unwrap();
        assert!(line.ends_with('\n'));

        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["raw"], "tremor");
        assert_eq!(value["smoothed"], "rest");
        assert_eq!(value["sample_index"], 150);
    }

    #[test]
    fn test_trace_writer_appends() {
        let temp_dir = TempDir::new().unwrap();
        let trace_path = temp_dir.path().join("trace.jsonl");

        {
            let mut writer = TraceWriter::open(trace_path.clone()).unwrap();
            writer.write(&entry(150, MotionLabel::Rest)).unwrap();
            writer.write(&entry(151, MotionLabel::Tremor)).unwrap();
        }
        // Reopening appends rather than truncating
        let mut writer = TraceWriter::open(trace_path.clone()).unwrap();
        writer.write(&entry(152, MotionLabel::Tremor)).unwrap();

        let entries = read_trace_file(&trace_path).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].sample_index, 150);
        assert_eq!(entries[2].smoothed, MotionLabel::Tremor);
        assert_eq!(entries[1].features.as_slice().len(), FEATURE_COUNT);
    }
}
