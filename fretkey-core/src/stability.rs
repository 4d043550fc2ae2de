//! # Stability Tracking Module
//!
//! Keeps a short history of accepted frequencies and turns their spread into
//! a multiplier for the peak confidence. A note that holds steady across
//! consecutive windows is trusted; a frequency that jumps around is not.

use std::collections::VecDeque;

/// Number of accepted frequencies kept in the history.
pub const HISTORY_CAPACITY: usize = 5;

/// Number of most recent entries the stability is computed over.
const STABILITY_SPAN: usize = 3;

/// Standard deviation in Hz at which stability drops to zero.
const STABILITY_TOLERANCE_HZ: f32 = 50.0;

/// Bounded FIFO of accepted frequencies.
#[derive(Debug, Clone, Default)]
pub struct StabilityTracker {
    history: VecDeque<f32>,
    last_confidence: f32,
}

impl StabilityTracker {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(HISTORY_CAPACITY + 1),
            last_confidence: 0.0,
        }
    }

    /// Records an accepted frequency and returns the combined confidence
    /// (`peak_confidence * stability`).
    pub fn record(&mut self, frequency: f32, peak_confidence: f32) -> f32 {
        self.history.push_back(frequency);
        while self.history.len() > HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.last_confidence = peak_confidence * self.stability();
        self.last_confidence
    }

    /// Consistency of the last three entries in [0, 1].
    ///
    /// With fewer than two entries there is nothing to compare, so the
    /// tracker reports a neutral 0.5.
    pub fn stability(&self) -> f32 {
        if self.history.len() < 2 {
            return 0.5;
        }

        let recent: Vec<f32> = self
            .history
            .iter()
            .skip(self.history.len().saturating_sub(STABILITY_SPAN))
            .copied()
            .collect();
        let count = recent.len() as f32;
        let mean = recent.iter().sum::<f32>() / count;
        let variance = recent.iter().map(|f| (f - mean).powi(2)).sum::<f32>() / count;

        (1.0 - variance.sqrt() / STABILITY_TOLERANCE_HZ).max(0.0)
    }

    /// Combined confidence of the most recent accepted frequency.
    pub fn last_confidence(&self) -> f32 {
        self.last_confidence
    }

    pub fn history(&self) -> impl Iterator<Item = &f32> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.last_confidence = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_entry_is_half_stable() {
        let mut tracker = StabilityTracker::new();
        assert_eq!(tracker.stability(), 0.5);
        let combined = tracker.record(110.0, 1.0);
        assert_eq!(combined, 0.5);
        assert_eq!(tracker.last_confidence(), 0.5);
    }

    #[test]
    fn identical_entries_are_fully_stable() {
        let mut tracker = StabilityTracker::new();
        tracker.record(110.0, 1.0);
        assert_eq!(tracker.record(110.0, 0.8), 0.8);
    }

    #[test]
    fn only_last_three_entries_count() {
        let mut tracker = StabilityTracker::new();
        tracker.record(500.0, 1.0);
        tracker.record(100.0, 1.0);
        tracker.record(100.0, 1.0);
        tracker.record(100.0, 1.0);
        assert_eq!(tracker.stability(), 1.0);
    }

    #[test]
    fn spread_lowers_stability() {
        let mut tracker = StabilityTracker::new();
        tracker.record(100.0, 1.0);
        tracker.record(150.0, 1.0);
        // Two entries 50 Hz apart: std-dev 25 Hz → 0.5.
        assert!((tracker.stability() - 0.5).abs() < 1e-6);
        tracker.record(400.0, 1.0);
        assert_eq!(tracker.stability(), 0.0);
    }

    #[test]
    fn history_is_bounded() {
        let mut tracker = StabilityTracker::new();
        for i in 0..12 {
            tracker.record(100.0 + i as f32, 1.0);
        }
        assert_eq!(tracker.len(), HISTORY_CAPACITY);
        let first = *tracker.history().next().unwrap();
        assert_eq!(first, 107.0);

        tracker.clear();
        assert!(tracker.is_empty());
        assert_eq!(tracker.last_confidence(), 0.0);
    }
}
