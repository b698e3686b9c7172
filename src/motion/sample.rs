// IMU sample decoding
// Parses one comma-separated ingress record into a 6-axis sample

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum number of fields in an ingress record (timestamp/id + 6 axes)
pub const MIN_RECORD_FIELDS: usize = 7;

/// Field delimiter for ingress records
pub const FIELD_DELIMITER: char = ',';

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("Record has {found} fields, expected at least 7")]
    TooFewFields { found: usize },

    #[error("Field {index} is not a number: {value:?}")]
    InvalidNumber { index: usize, value: String },
}

/// One of the six sensor channels, in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    AccelX,
    AccelY,
    AccelZ,
    GyroX,
    GyroY,
    GyroZ,
}

impl Axis {
    /// All channels in input order. Feature vectors follow this order.
    pub const ALL: [Axis; 6] = [
        Axis::AccelX,
        Axis::AccelY,
        Axis::AccelZ,
        Axis::GyroX,
        Axis::GyroY,
        Axis::GyroZ,
    ];

    /// Canonical channel name, as used in CSV headers and feature names
    pub fn name(&self) -> &'static str {
        match self {
            Axis::AccelX => "accel.x",
            Axis::AccelY => "accel.y",
            Axis::AccelZ => "accel.z",
            Axis::GyroX => "gyro.x",
            Axis::GyroY => "gyro.y",
            Axis::GyroZ => "gyro.z",
        }
    }

    /// Position of this channel within a sample
    pub fn index(&self) -> usize {
        match self {
            Axis::AccelX => 0,
            Axis::AccelY => 1,
            Axis::AccelZ => 2,
            Axis::GyroX => 3,
            Axis::GyroY => 4,
            Axis::GyroZ => 5,
        }
    }
}

/// A single accelerometer + gyroscope reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    values: [f64; 6],
}

impl Sample {
    pub fn new(values: [f64; 6]) -> Self {
        Sample { values }
    }

    /// Value of one channel
    pub fn axis(&self, axis: Axis) -> f64 {
        self.values[axis.index()]
    }

    pub fn accel(&self) -> [f64; 3] {
        [self.values[0], self.values[1], self.values[2]]
    }

    pub fn gyro(&self) -> [f64; 3] {
        [self.values[3], self.values[4], self.values[5]]
    }

    pub fn values(&self) -> &[f64; 6] {
        &self.values
    }
}

/// Split a raw record into trimmed fields
pub fn split_record(record: &str) -> Vec<&str> {
    record.trim().split(FIELD_DELIMITER).map(str::trim).collect()
}

/// Parse an ingress record
///
/// Format: `<id>,<accel.x>,<accel.y>,<accel.z>,<gyro.x>,<gyro.y>,<gyro.z>[,...]`
/// The leading field is not interpreted and trailing fields are ignored.
pub fn parse_record(record: &str) -> Result<Sample, ParseError> {
    let fields = split_record(record);
    if fields.len() < MIN_RECORD_FIELDS {
        return Err(ParseError::TooFewFields { found: fields.len() });
    }

    let mut values = [0.0; 6];
    for (slot, (index, field)) in values.iter_mut().zip(fields.iter().enumerate().skip(1)) {
        *slot = field.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
            index,
            value: field.to_string(),
        })?;
    }

    Ok(Sample::new(values))
}
