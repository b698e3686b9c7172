// Prediction debouncing
// Tremor is reported only after a full history of unanimous tremor predictions

use std::collections::VecDeque;

use crate::classify::types::MotionLabel;

/// Default number of raw predictions considered
pub const DEFAULT_SMOOTHING_DEPTH: usize = 3;

/// Debounce filter over the most recent raw labels
///
/// Not a majority vote: one `Rest` in the history forces `Rest`, and
/// `Tremor` surfaces only once the history is full of `Tremor`.
#[derive(Debug, Clone)]
pub struct PredictionSmoother {
    history: VecDeque<MotionLabel>,
    depth: usize,
}

impl PredictionSmoother {
    /// A zero depth is treated as 1 (no smoothing)
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        PredictionSmoother {
            history: VecDeque::with_capacity(depth),
            depth,
        }
    }

    /// Record a raw label and return the smoothed label
    pub fn push(&mut self, raw: MotionLabel) -> MotionLabel {
        if self.history.len() == self.depth {
            self.history.pop_front();
        }
        self.history.push_back(raw);
        self.current()
    }

    /// Smoothed label for the current history
    pub fn current(&self) -> MotionLabel {
        let confirmed = self.history.len() == self.depth
            && self.history.iter().all(|l| *l == MotionLabel::Tremor);
        if confirmed {
            MotionLabel::Tremor
        } else {
            MotionLabel::Rest
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn history(&self) -> impl Iterator<Item = &MotionLabel> {
        self.history.iter()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Default for PredictionSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_DEPTH)
    }
}
