// Zero-phase low-pass filtering
// Butterworth design as cascaded second-order sections, applied forward then backward
//
// No state survives between calls: every window is filtered from scratch,
// which is what keeps the output time-aligned with the input.

use std::f64::consts::PI;
use thiserror::Error;

use crate::motion::sample::Axis;
use crate::motion::window::ChannelFrame;

#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("Filter order must be at least 1")]
    InvalidOrder,

    #[error("Cutoff {cutoff_hz} Hz must lie between 0 and Nyquist ({nyquist_hz} Hz)")]
    InvalidCutoff { cutoff_hz: f64, nyquist_hz: f64 },

    #[error("Segment of {len} samples is too short, need more than {pad_len}")]
    SegmentTooShort { len: usize, pad_len: usize },
}

/// One IIR section in transposed direct form II.
/// `a0` is normalised to 1; first-order sections keep `b[2] == a[2] == 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Section {
    b: [f64; 3],
    a: [f64; 3],
}

impl Section {
    fn second_order(k: f64, q: f64) -> Self {
        let k2 = k * k;
        let norm = 1.0 / (1.0 + k / q + k2);
        let b0 = k2 * norm;
        Section {
            b: [b0, 2.0 * b0, b0],
            a: [1.0, 2.0 * (k2 - 1.0) * norm, (1.0 - k / q + k2) * norm],
        }
    }

    fn first_order(k: f64) -> Self {
        let norm = 1.0 / (1.0 + k);
        let b0 = k * norm;
        Section {
            b: [b0, b0, 0.0],
            a: [1.0, (k - 1.0) * norm, 0.0],
        }
    }

    /// Gain at 0 Hz
    fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (self.a[0] + self.a[1] + self.a[2])
    }

    /// Run the section in place, starting from the steady state for a
    /// constant input of `level`. Returns the steady-state output level.
    fn run(&self, signal: &mut [f64], level: f64) -> f64 {
        let gain = self.dc_gain();
        let steady = gain * level;
        let mut z1 = steady - self.b[0] * level;
        let mut z2 = self.b[2] * level - self.a[2] * steady;

        for x in signal.iter_mut() {
            let input = *x;
            let y = self.b[0] * input + z1;
            z1 = self.b[1] * input - self.a[1] * y + z2;
            z2 = self.b[2] * input - self.a[2] * y;
            *x = y;
        }

        steady
    }
}

/// Butterworth low-pass filter with forward-backward application
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    sections: Vec<Section>,
    order: usize,
    cutoff_hz: f64,
    sample_rate_hz: f64,
    pad_len: usize,
}

impl LowPassFilter {
    /// Design a digital Butterworth low-pass filter
    ///
    /// Bilinear transform with prewarping, so the -3 dB point of a single
    /// pass lands exactly on `cutoff_hz`.
    pub fn butterworth(
        order: usize,
        cutoff_hz: f64,
        sample_rate_hz: f64,
    ) -> Result<Self, FilterError> {
        if order == 0 {
            return Err(FilterError::InvalidOrder);
        }

        let nyquist_hz = sample_rate_hz / 2.0;
        if !(cutoff_hz > 0.0 && cutoff_hz < nyquist_hz) {
            return Err(FilterError::InvalidCutoff {
                cutoff_hz,
                nyquist_hz,
            });
        }

        let k = (PI * cutoff_hz / sample_rate_hz).tan();
        let mut sections = Vec::with_capacity((order + 1) / 2);

        // Conjugate pole pairs at angles (2i - 1)π / 2N from the negative real axis
        for i in 1..=order / 2 {
            let angle = (2 * i - 1) as f64 * PI / (2 * order) as f64;
            let q = 1.0 / (2.0 * angle.cos());
            sections.push(Section::second_order(k, q));
        }
        if order % 2 == 1 {
            sections.push(Section::first_order(k));
        }

        Ok(LowPassFilter {
            sections,
            order,
            cutoff_hz,
            sample_rate_hz,
            pad_len: 3 * (order + 1),
        })
    }

    /// Filter one channel with zero phase
    ///
    /// The signal is odd-extended at both ends, run forward, reversed and
    /// run again, then reversed back and trimmed to its original length.
    pub fn filtfilt(&self, signal: &[f64]) -> Result<Vec<f64>, FilterError> {
        let n = signal.len();
        let pad = self.pad_len;
        if n <= pad {
            return Err(FilterError::SegmentTooShort { len: n, pad_len: pad });
        }

        let first = signal[0];
        let last = signal[n - 1];

        let mut extended = Vec::with_capacity(n + 2 * pad);
        extended.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i]));
        extended.extend_from_slice(signal);
        extended.extend((n - 1 - pad..n - 1).rev().map(|i| 2.0 * last - signal[i]));

        self.run_cascade(&mut extended);
        extended.reverse();
        self.run_cascade(&mut extended);
        extended.reverse();

        Ok(extended[pad..pad + n].to_vec())
    }

    fn run_cascade(&self, signal: &mut [f64]) {
        let mut level = match signal.first() {
            Some(&x) => x,
            None => return,
        };
        for section in &self.sections {
            level = section.run(signal, level);
        }
    }

    /// Filter every channel present in the frame; absent channels are skipped
    pub fn apply(&self, frame: &mut ChannelFrame) -> Result<(), FilterError> {
        for axis in Axis::ALL {
            if let Some(values) = frame.channel_mut(axis) {
                let filtered = self.filtfilt(values)?;
                *values = filtered;
            }
        }
        Ok(())
    }

    /// Overall gain at 0 Hz for a single pass (1.0 for a low-pass design)
    pub fn dc_gain(&self) -> f64 {
        self.sections.iter().map(Section::dc_gain).product()
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn cutoff_hz(&self) -> f64 {
        self.cutoff_hz
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    /// Samples of odd extension added at each end; segments must be longer
    pub fn pad_len(&self) -> usize {
        self.pad_len
    }
}
