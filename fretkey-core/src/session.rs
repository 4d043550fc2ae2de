//! # Detection Session Module
//!
//! Owns every piece of mutable detection state for one consumer and runs the
//! full pipeline synchronously, one chunk at a time:
//!
//! ```text
//! chunk → WindowBuffer → SpectralAnalyzer → PeakEstimator → StabilityTracker
//!       → NoteClassifier → EventStabilizer → NoteEvent
//! ```
//!
//! Independent sessions share nothing, so several can run side by side.

use serde::Serialize;
use std::time::Instant;

use crate::calibration::CalibrationProfile;
use crate::config::DetectorConfig;
use crate::error::ConfigError;
use crate::fft::SpectralAnalyzer;
use crate::peak::{estimate_peak, PeakEstimate};
use crate::stabilizer::EventStabilizer;
use crate::stability::StabilityTracker;
use crate::tuning::{self, Note};
use crate::window::{pcm16le_to_samples, WindowBuffer};

/// A committed note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NoteEvent {
    pub note: Note,
    /// Observed frequency in Hz.
    pub frequency: f32,
    /// Combined peak × stability confidence.
    pub confidence: f32,
}

impl NoteEvent {
    /// Deviation of the observed frequency from the reference note.
    pub fn cents_deviation(&self) -> f32 {
        tuning::calculate_cents_deviation(self.frequency, self.note.frequency)
    }
}

/// A frequency that passed the confidence gate, before debouncing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    pub frequency: f32,
    pub confidence: f32,
    /// Reference note within tolerance, if any.
    pub note: Option<Note>,
}

/// One detection session: window, history, debounce state, and the
/// calibration profile in use.
#[derive(Debug)]
pub struct DetectionSession {
    config: DetectorConfig,
    profile: CalibrationProfile,
    window: WindowBuffer,
    analyzer: SpectralAnalyzer,
    stability: StabilityTracker,
    stabilizer: EventStabilizer,
    last_peak: Option<PeakEstimate>,
}

impl DetectionSession {
    pub fn new(config: DetectorConfig, profile: CalibrationProfile) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            window: WindowBuffer::new(config.window_size),
            analyzer: SpectralAnalyzer::new(config.window_size, config.sample_rate),
            stability: StabilityTracker::new(),
            stabilizer: EventStabilizer::new(config.debounce, config.consistency_threshold),
            last_peak: None,
            profile,
            config,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    /// Peak estimate of the most recently analysed window.
    pub fn last_peak(&self) -> Option<&PeakEstimate> {
        self.last_peak.as_ref()
    }

    /// Combined confidence of the most recent accepted frequency.
    pub fn last_confidence(&self) -> f32 {
        self.stability.last_confidence()
    }

    /// Feeds a PCM16LE chunk received at `now` and returns a note event if
    /// one was committed on this chunk.
    pub fn feed(&mut self, chunk: &[u8], now: Instant) -> Option<NoteEvent> {
        let samples = pcm16le_to_samples(chunk);
        self.feed_samples(&samples, now)
    }

    /// Same as `feed` for already normalized samples.
    pub fn feed_samples(&mut self, samples: &[f32], now: Instant) -> Option<NoteEvent> {
        let detection = self.detect(samples)?;
        let note = detection.note?;

        if self.stabilizer.observe(note, now) {
            let event = NoteEvent {
                note,
                frequency: detection.frequency,
                confidence: detection.confidence,
            };
            log::debug!(
                "Note event: {} ({:.1} Hz, confidence {:.2})",
                event.note,
                event.frequency,
                event.confidence
            );
            Some(event)
        } else {
            None
        }
    }

    /// Runs the pipeline up to classification without touching the debounce
    /// state. Returns a detection only when the combined confidence clears
    /// the configured gate.
    pub fn detect(&mut self, samples: &[f32]) -> Option<Detection> {
        self.window.push(samples);
        if !self.window.is_ready() {
            return None;
        }

        let frame = self.analyzer.analyze(self.window.samples())?;
        let peak = estimate_peak(&frame, &self.profile);
        self.last_peak = Some(peak);

        let frequency = peak.frequency?;
        let confidence = self.stability.record(frequency, peak.confidence);
        if confidence <= self.config.confidence_gate {
            log::trace!(
                "Detection below gate: {:.1} Hz, confidence {:.2}",
                frequency,
                confidence
            );
            return None;
        }

        Some(Detection {
            frequency,
            confidence,
            note: tuning::frequency_to_note(frequency),
        })
    }

    /// Discards all in-flight state. Nothing is flushed.
    pub fn reset(&mut self) {
        self.window.clear();
        self.stability.clear();
        self.stabilizer.reset();
        self.last_peak = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = DetectorConfig {
            window_size: 0,
            ..DetectorConfig::default()
        };
        assert!(DetectionSession::new(config, CalibrationProfile::default()).is_err());
    }

    #[test]
    fn first_accepted_window_is_held_back_by_stability() {
        let mut session =
            DetectionSession::new(DetectorConfig::default(), CalibrationProfile::default()).unwrap();
        let signal = sine(110.0, 44100, 4096);
        // Stability is 0.5 for a single entry, which does not clear the 0.5 gate.
        assert!(session.detect(&signal).is_none());
        assert!(session.last_peak().unwrap().is_accepted());
        let detection = session.detect(&signal).unwrap();
        assert_eq!(detection.note.map(|n| n.name), Some("A2"));
    }

    #[test]
    fn reset_discards_window_and_history() {
        let mut session =
            DetectionSession::new(DetectorConfig::default(), CalibrationProfile::default()).unwrap();
        let signal = sine(196.0, 44100, 4096);
        session.detect(&signal);
        session.detect(&signal);
        session.reset();
        assert!(session.last_peak().is_none());
        assert_eq!(session.last_confidence(), 0.0);
        // Needs a full window and a fresh history again.
        assert!(session.detect(&signal[..2048]).is_none());
        assert!(session.last_peak().is_none());
    }

    #[test]
    fn commits_after_consistent_windows() {
        let config = DetectorConfig {
            debounce: Duration::from_millis(200),
            consistency_threshold: 3,
            ..DetectorConfig::default()
        };
        let mut session = DetectionSession::new(config, CalibrationProfile::default()).unwrap();
        let signal = sine(196.0, 44100, 4096);
        let t0 = Instant::now();
        let events: Vec<NoteEvent> = (0..6)
            .filter_map(|i| session.feed_samples(&signal, t0 + Duration::from_millis(10 * i)))
            .collect();
        // Window 1 is gated by stability; windows 2-4 build the count.
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].note.name, "G3");
        assert!(events[0].cents_deviation().abs() < 100.0);
    }
}
