// CSV session recorder
// Appends accepted rows (plus a label column) and stops at an optional deadline

use chrono::{DateTime, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Header row written to new recording files
pub const CSV_HEADER: [&str; 8] = [
    "timestamp",
    "accel.x",
    "accel.y",
    "accel.z",
    "gyro.x",
    "gyro.y",
    "gyro.z",
    "label",
];

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Recording file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("Recording name is empty")]
    EmptyName,
}

fn csv_file_name(name: &str) -> Result<String, RecordingError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RecordingError::EmptyName);
    }
    if name.ends_with(".csv") {
        Ok(name.to_string())
    } else {
        Ok(format!("{}.csv", name))
    }
}

/// Destination for a classification session: `<results_dir>/<name>.csv`.
/// Never reuses an existing file.
pub fn classify_output_path(results_dir: &Path, name: &str) -> Result<PathBuf, RecordingError> {
    fs::create_dir_all(results_dir)?;
    let path = results_dir.join(csv_file_name(name)?);
    if path.exists() {
        return Err(RecordingError::AlreadyExists(path));
    }
    Ok(path)
}

/// Destination for a labelled capture session: `<data_dir>/<label>/<name>.csv`.
/// Existing files are appended to.
pub fn collect_output_path(
    data_dir: &Path,
    label: &str,
    name: &str,
) -> Result<PathBuf, RecordingError> {
    let dir = data_dir.join(label);
    fs::create_dir_all(&dir)?;
    Ok(dir.join(csv_file_name(name)?))
}

/// Append-only CSV writer for one process lifetime
pub struct CsvRecorder {
    path: PathBuf,
    /// None once the recording has ended
    file: Option<File>,
    end_time: Option<DateTime<Utc>>,
    rows: u64,
}

impl CsvRecorder {
    /// Open `path` for appending; the header is written only to an empty file
    pub fn create(path: PathBuf, end_time: Option<DateTime<Utc>>) -> Result<Self, RecordingError> {
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        if file.metadata()?.len() == 0 {
            writeln!(file, "{}", CSV_HEADER.join(","))?;
            file.flush()?;
        }

        Ok(CsvRecorder {
            path,
            file: Some(file),
            end_time,
            rows: 0,
        })
    }

    /// Close the recording if `now` is past the deadline.
    /// Returns true only on the call that ends the recording.
    pub fn check_deadline(&mut self, now: DateTime<Utc>) -> bool {
        match self.end_time {
            Some(end) if now > end && self.file.is_some() => {
                self.close();
                true
            }
            _ => false,
        }
    }

    /// Append one row: the record fields, then the label column (may be empty).
    /// Does nothing once the recording has ended.
    pub fn write_row(&mut self, fields: &[&str], label: Option<&str>) -> Result<(), RecordingError> {
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => return Ok(()),
        };

        let line = format!("{},{}\n", fields.join(","), label.unwrap_or(""));
        file.write_all(line.as_bytes())?;
        file.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn close(&mut self) {
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush() {
                log::error!("Failed to flush {}: {}", self.path.display(), e);
            }
        }
    }

    pub fn is_recording(&self) -> bool {
        self.file.is_some()
    }

    /// Rows written since the recorder was opened (header excluded)
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
