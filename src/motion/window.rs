// Session sample buffer
// Bounded ring of the most recent samples plus the trigger policy

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::motion::sample::{Axis, Sample};

/// When a full window should be pushed through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolicy {
    /// Every accepted sample after warm-up triggers a run over the trailing window
    EverySample,

    /// First run at warm-up, then one run every `stride` accepted samples
    Stride,
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        TriggerPolicy::EverySample
    }
}

/// Rolling sample window shared by every connection of the process
#[derive(Debug, Clone)]
pub struct SessionBuffer {
    samples: VecDeque<Sample>,
    window_size: usize,
    stride: usize,
    policy: TriggerPolicy,
    /// Total samples accepted since creation (not bounded by the ring)
    accepted: u64,
}

impl SessionBuffer {
    /// Create a buffer for windows of `window_size` samples.
    /// A zero stride is treated as 1.
    pub fn new(window_size: usize, stride: usize, policy: TriggerPolicy) -> Self {
        SessionBuffer {
            samples: VecDeque::with_capacity(window_size),
            window_size,
            stride: stride.max(1),
            policy,
            accepted: 0,
        }
    }

    /// Append a sample, evicting the oldest once the ring is full.
    /// Returns true when this sample triggers a pipeline run.
    pub fn push(&mut self, sample: Sample) -> bool {
        if self.window_size == 0 {
            return false;
        }

        if self.samples.len() == self.window_size {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.accepted += 1;

        self.should_trigger()
    }

    fn should_trigger(&self) -> bool {
        let window = self.window_size as u64;
        if self.accepted < window {
            return false;
        }

        match self.policy {
            TriggerPolicy::EverySample => true,
            TriggerPolicy::Stride => (self.accepted - window) % self.stride as u64 == 0,
        }
    }

    /// The current window, oldest first, once warm-up is complete
    pub fn window(&self) -> Option<Vec<Sample>> {
        if self.is_warm() {
            Some(self.samples.iter().copied().collect())
        } else {
            None
        }
    }

    /// Whether at least one full window has been accumulated
    pub fn is_warm(&self) -> bool {
        self.window_size > 0 && self.samples.len() == self.window_size
    }

    /// Number of samples currently held (never above the window size)
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total samples accepted over the buffer's lifetime
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn policy(&self) -> TriggerPolicy {
        self.policy
    }
}

/// Column view of a window: one series per present channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFrame {
    channels: Vec<(Axis, Vec<f64>)>,
}

impl ChannelFrame {
    /// Transpose samples into six channel series
    pub fn from_samples(samples: &[Sample]) -> Self {
        let channels = Axis::ALL
            .iter()
            .map(|&axis| (axis, samples.iter().map(|s| s.axis(axis)).collect()))
            .collect();
        ChannelFrame { channels }
    }

    /// Build a frame from explicit channel series
    pub fn from_channels(channels: Vec<(Axis, Vec<f64>)>) -> Self {
        ChannelFrame { channels }
    }

    pub fn channel(&self, axis: Axis) -> Option<&[f64]> {
        self.channels
            .iter()
            .find(|(a, _)| *a == axis)
            .map(|(_, values)| values.as_slice())
    }

    pub fn channel_mut(&mut self, axis: Axis) -> Option<&mut Vec<f64>> {
        self.channels
            .iter_mut()
            .find(|(a, _)| *a == axis)
            .map(|(_, values)| values)
    }

    /// Number of samples per channel (0 for an empty frame)
    pub fn len(&self) -> usize {
        self.channels.first().map(|(_, v)| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(v: f64) -> Sample {
        Sample::new([v; 6])
    }

    #[test]
    fn test_no_trigger_before_warm_up() {
        let mut buffer = SessionBuffer::new(5, 2, TriggerPolicy::EverySample);
        for i in 0..4 {
            assert!(!buffer.push(sample(i as f64)));
            assert!(buffer.window().is_none());
        }
        assert!(buffer.push(sample(4.0)));
        assert_eq!(buffer.window().unwrap().len(), 5);
    }

    #[test]
    fn test_every_sample_trigger_after_warm_up() {
        let mut buffer = SessionBuffer::new(3, 10, TriggerPolicy::EverySample);
        let triggers: Vec<bool> = (0..6).map(|i| buffer.push(sample(i as f64))).collect();
        assert_eq!(triggers, vec![false, false, true, true, true, true]);
    }

    #[test]
    fn test_stride_trigger() {
        let mut buffer = SessionBuffer::new(4, 2, TriggerPolicy::Stride);
        let fired: Vec<u64> = (0..10)
            .filter_map(|i| {
                if buffer.push(sample(i as f64)) {
                    Some(buffer.accepted())
                } else {
                    None
                }
            })
            .collect();
        assert_eq!(fired, vec![4, 6, 8, 10]);
    }

    #[test]
    fn test_ring_keeps_latest_in_order() {
        let mut buffer = SessionBuffer::new(3, 1, TriggerPolicy::EverySample);
        for i in 0..5 {
            buffer.push(sample(i as f64));
        }
        let window = buffer.window().unwrap();
        let firsts: Vec<f64> = window.iter().map(|s| s.axis(Axis::AccelX)).collect();
        assert_eq!(firsts, vec![2.0, 3.0, 4.0]);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.accepted(), 5);
    }

    #[test]
    fn test_channel_frame_transpose() {
        let samples = vec![
            Sample::new([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            Sample::new([7.0, 8.0, 9.0, 10.0, 11.0, 12.0]),
        ];
        let frame = ChannelFrame::from_samples(&samples);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.channel(Axis::AccelY).unwrap(), &[2.0, 8.0]);
        assert_eq!(frame.channel(Axis::GyroZ).unwrap(), &[6.0, 12.0]);
    }
}
