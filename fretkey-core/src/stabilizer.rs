//! # Event Stabilizer Module
//!
//! A single confident spectral read can still be a transient, so a note is
//! only committed after it has been classified `consistency_threshold` times
//! in a row without a gap longer than the debounce window.
//!
//! The stabilizer never reads a clock itself; the caller passes the arrival
//! time of every classification.

use std::time::{Duration, Instant};

use crate::tuning::Note;

/// The first sighting of a note never commits, so at least two agreeing
/// detections are always needed.
pub const MIN_CONSISTENCY_THRESHOLD: u32 = 2;

/// Per-consumer debounce state.
#[derive(Debug, Clone, Default)]
pub struct StabilizationState {
    pub last_note: Option<Note>,
    pub last_timestamp: Option<Instant>,
    pub consistency_count: u32,
}

/// Debounce and consistency gate at the output boundary.
#[derive(Debug, Clone)]
pub struct EventStabilizer {
    debounce: Duration,
    consistency_threshold: u32,
    state: StabilizationState,
}

impl EventStabilizer {
    pub fn new(debounce: Duration, consistency_threshold: u32) -> Self {
        Self {
            debounce,
            consistency_threshold: consistency_threshold.max(MIN_CONSISTENCY_THRESHOLD),
            state: StabilizationState::default(),
        }
    }

    /// Feeds one classified note seen at `now`. Returns `true` when the note
    /// is committed on this call.
    ///
    /// The counter is not cleared on commit, so a held note cannot commit
    /// again until the debounce window passes and the count is rebuilt.
    pub fn observe(&mut self, note: Note, now: Instant) -> bool {
        let within_window = match (self.state.last_note, self.state.last_timestamp) {
            (Some(last), Some(at)) if last == note => {
                now.saturating_duration_since(at) <= self.debounce
            }
            _ => false,
        };

        if !within_window {
            self.state.last_note = Some(note);
            self.state.last_timestamp = Some(now);
            self.state.consistency_count = 1;
            return false;
        }

        self.state.consistency_count += 1;
        self.commit_if_due(now)
    }

    fn commit_if_due(&mut self, now: Instant) -> bool {
        if self.state.consistency_count == self.consistency_threshold {
            self.state.last_timestamp = Some(now);
            log::debug!(
                "Committed {} after {} consistent detections",
                self.state.last_note.map(|n| n.name).unwrap_or("?"),
                self.state.consistency_count
            );
            true
        } else {
            false
        }
    }

    pub fn state(&self) -> &StabilizationState {
        &self.state
    }

    pub fn consistency_threshold(&self) -> u32 {
        self.consistency_threshold
    }

    pub fn reset(&mut self) {
        self.state = StabilizationState::default();
    }
}
