//! # Calibration Module
//!
//! Two-phase calibration that adapts the peak estimator to the room and the
//! instrument before steady-state detection starts:
//!
//! 1. **Noise phase** - the player stays silent while up to 30 raw pitch
//!    estimates are taken. Whatever frequencies show up are averaged into the
//!    noise level.
//! 2. **Instrument phase** - after the player confirms they are ready, up to
//!    100 estimates are taken in the 50-1000 Hz band while every string is
//!    played. The observed spread becomes the search band and the number of
//!    distinct notes picks the magnitude threshold.
//!
//! The controller is an explicit state machine owned by the caller. Waiting
//! for the player's confirmation is the caller's business; the controller
//! only refuses to collect instrument estimates until `confirm_ready` is
//! called.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::config::DetectorConfig;
use crate::error::{CalibrationError, ConfigError};
use crate::fft::SpectralAnalyzer;
use crate::peak::estimate_peak;
use crate::tuning::{self, Note};
use crate::window::WindowBuffer;

/// Estimates taken during the noise phase.
pub const NOISE_SAMPLE_LIMIT: usize = 30;
/// Estimates taken during the instrument phase.
pub const INSTRUMENT_SAMPLE_LIMIT: usize = 100;
/// Band searched while measuring the instrument.
pub const INSTRUMENT_SEARCH_RANGE: FrequencyRange = FrequencyRange { min: 50.0, max: 1000.0 };
/// Margin added on both sides of the observed instrument range.
pub const RANGE_MARGIN_HZ: f32 = 10.0;

/// Threshold used when at least three distinct notes were heard.
pub const SENSITIVE_THRESHOLD: f32 = 0.005;
/// Threshold used when one or two distinct notes were heard.
pub const DEFAULT_THRESHOLD: f32 = 0.01;
/// Threshold used when nothing usable was heard.
pub const CONSERVATIVE_THRESHOLD: f32 = 0.02;

/// Frequency search band in Hz. `min` is always below `max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrequencyRange {
    pub min: f32,
    pub max: f32,
}

impl FrequencyRange {
    pub fn new(min: f32, max: f32) -> Result<Self, ConfigError> {
        if !(min < max) || !min.is_finite() || !max.is_finite() {
            return Err(ConfigError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, frequency: f32) -> bool {
        frequency >= self.min && frequency <= self.max
    }
}

impl Default for FrequencyRange {
    fn default() -> Self {
        Self { min: 80.0, max: 800.0 }
    }
}

/// Thresholds consumed by the peak estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationProfile {
    /// Average frequency (Hz) detected while the room was quiet.
    pub noise_level: f32,
    /// Band the dominant peak is searched in.
    pub frequency_range: FrequencyRange,
    /// Minimum peak magnitude for an estimate to be accepted.
    pub magnitude_threshold: f32,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            noise_level: 0.0,
            frequency_range: FrequencyRange::default(),
            magnitude_threshold: CONSERVATIVE_THRESHOLD,
        }
    }
}

/// What the calibration heard, for display after it finishes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CalibrationReport {
    pub noise_estimates: usize,
    pub noise_detections: usize,
    pub instrument_estimates: usize,
    /// Accepted instrument frequencies, sorted ascending.
    pub observed_frequencies: Vec<f32>,
    pub distinct_notes: Vec<String>,
}

/// Final result of a calibration run.
#[derive(Debug, Clone, Serialize)]
pub struct Calibration {
    pub profile: CalibrationProfile,
    pub report: CalibrationReport,
}

/// Where the controller currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    Idle,
    /// Measuring ambient noise.
    Noise,
    /// Noise measured; waiting for the player to confirm.
    AwaitingConfirmation,
    /// Measuring the instrument.
    Instrument,
    /// Instrument estimates collected; ready to finalize.
    InstrumentComplete,
    Finished,
}

impl CalibrationPhase {
    fn label(self) -> &'static str {
        match self {
            CalibrationPhase::Idle => "idle",
            CalibrationPhase::Noise => "noise",
            CalibrationPhase::AwaitingConfirmation => "awaiting-confirmation",
            CalibrationPhase::Instrument => "instrument",
            CalibrationPhase::InstrumentComplete => "instrument-complete",
            CalibrationPhase::Finished => "finished",
        }
    }
}

/// Derives the search band from the frequencies heard during the instrument
/// phase, falling back to `prior` when nothing was heard.
pub fn derive_frequency_range(observed: &[f32], prior: FrequencyRange) -> FrequencyRange {
    let mut sorted: Vec<f32> = observed.iter().copied().filter(|f| f.is_finite()).collect();
    sorted.sort_by(f32::total_cmp);

    match (sorted.first(), sorted.last()) {
        (Some(&lowest), Some(&highest)) => FrequencyRange {
            min: lowest - RANGE_MARGIN_HZ,
            max: highest + RANGE_MARGIN_HZ,
        },
        _ => prior,
    }
}

/// More distinct notes means a better-characterised instrument, which earns
/// a more sensitive threshold.
pub fn threshold_for_distinct_notes(distinct: usize) -> f32 {
    match distinct {
        0 => CONSERVATIVE_THRESHOLD,
        1 | 2 => DEFAULT_THRESHOLD,
        _ => SENSITIVE_THRESHOLD,
    }
}

/// Runs the noise and instrument phases and produces a `CalibrationProfile`.
#[derive(Debug)]
pub struct CalibrationController {
    phase: CalibrationPhase,
    prior: CalibrationProfile,
    window: WindowBuffer,
    analyzer: SpectralAnalyzer,
    noise_estimates: usize,
    noise_frequencies: Vec<f32>,
    noise_level: f32,
    instrument_estimates: usize,
    observed: Vec<f32>,
    distinct_notes: BTreeSet<Note>,
}

impl CalibrationController {
    pub fn new(config: &DetectorConfig) -> Self {
        Self::with_prior(config, CalibrationProfile::default())
    }

    /// Starts from `prior`, whose range is kept if the instrument phase hears nothing.
    pub fn with_prior(config: &DetectorConfig, prior: CalibrationProfile) -> Self {
        Self {
            phase: CalibrationPhase::Idle,
            prior,
            window: WindowBuffer::new(config.window_size),
            analyzer: SpectralAnalyzer::new(config.window_size, config.sample_rate),
            noise_estimates: 0,
            noise_frequencies: Vec::new(),
            noise_level: 0.0,
            instrument_estimates: 0,
            observed: Vec::new(),
            distinct_notes: BTreeSet::new(),
        }
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    pub fn noise_level(&self) -> f32 {
        self.noise_level
    }

    pub fn begin_noise_phase(&mut self) -> Result<(), CalibrationError> {
        self.expect_phase(CalibrationPhase::Idle, "start the noise phase")?;
        log::info!("Calibration: measuring ambient noise");
        self.phase = CalibrationPhase::Noise;
        Ok(())
    }

    /// Feeds a PCM16LE chunk. Every ready window yields one estimate for the
    /// active phase; chunks arriving outside a collecting phase are ignored.
    pub fn feed(&mut self, chunk: &[u8]) -> CalibrationPhase {
        let samples = crate::window::pcm16le_to_samples(chunk);
        self.feed_samples(&samples)
    }

    /// Same as `feed` for already normalized samples.
    pub fn feed_samples(&mut self, samples: &[f32]) -> CalibrationPhase {
        let profile = match self.phase {
            CalibrationPhase::Noise => CalibrationProfile::default(),
            CalibrationPhase::Instrument => CalibrationProfile {
                noise_level: self.noise_level,
                frequency_range: INSTRUMENT_SEARCH_RANGE,
                magnitude_threshold: CalibrationProfile::default().magnitude_threshold,
            },
            _ => return self.phase,
        };

        self.window.push(samples);
        if !self.window.is_ready() {
            return self.phase;
        }

        let frequency = self
            .analyzer
            .analyze(self.window.samples())
            .and_then(|frame| estimate_peak(&frame, &profile).frequency);

        if self.phase == CalibrationPhase::Noise {
            self.take_noise_estimate(frequency);
        } else {
            self.take_instrument_estimate(frequency);
        }
        self.phase
    }

    /// Records one noise-phase estimate. The phase ends by itself after
    /// `NOISE_SAMPLE_LIMIT` estimates.
    pub fn record_noise_estimate(&mut self, frequency: Option<f32>) -> Result<(), CalibrationError> {
        self.expect_phase(CalibrationPhase::Noise, "record a noise estimate")?;
        self.take_noise_estimate(frequency);
        Ok(())
    }

    fn take_noise_estimate(&mut self, frequency: Option<f32>) {
        self.noise_estimates += 1;
        if let Some(freq) = frequency {
            log::debug!("Calibration noise estimate: {:.1} Hz", freq);
            self.noise_frequencies.push(freq);
        }
        if self.noise_estimates >= NOISE_SAMPLE_LIMIT {
            self.close_noise_phase();
        }
    }

    /// Ends the noise phase (early, when the caller's sampling time is up)
    /// and returns the measured noise level.
    pub fn finish_noise_phase(&mut self) -> Result<f32, CalibrationError> {
        self.expect_phase(CalibrationPhase::Noise, "finish the noise phase")?;
        Ok(self.close_noise_phase())
    }

    fn close_noise_phase(&mut self) -> f32 {
        self.noise_level = if self.noise_frequencies.is_empty() {
            0.0
        } else {
            self.noise_frequencies.iter().sum::<f32>() / self.noise_frequencies.len() as f32
        };
        log::info!(
            "Calibration: noise level {:.1} Hz from {} of {} estimates",
            self.noise_level,
            self.noise_frequencies.len(),
            self.noise_estimates
        );
        self.window.clear();
        self.phase = CalibrationPhase::AwaitingConfirmation;
        self.noise_level
    }

    /// The player is ready to play; start measuring the instrument.
    pub fn confirm_ready(&mut self) -> Result<(), CalibrationError> {
        self.expect_phase(CalibrationPhase::AwaitingConfirmation, "confirm readiness")?;
        log::info!("Calibration: measuring instrument range");
        self.window.clear();
        self.phase = CalibrationPhase::Instrument;
        Ok(())
    }

    /// Records one instrument-phase estimate. The phase completes by itself
    /// after `INSTRUMENT_SAMPLE_LIMIT` estimates.
    pub fn record_instrument_estimate(
        &mut self,
        frequency: Option<f32>,
    ) -> Result<(), CalibrationError> {
        self.expect_phase(CalibrationPhase::Instrument, "record an instrument estimate")?;
        self.take_instrument_estimate(frequency);
        Ok(())
    }

    fn take_instrument_estimate(&mut self, frequency: Option<f32>) {
        self.instrument_estimates += 1;
        if let Some(freq) = frequency {
            self.observed.push(freq);
            if let Some(note) = tuning::frequency_to_note(freq) {
                if self.distinct_notes.insert(note) {
                    log::info!("Calibration: heard {} ({:.1} Hz)", note, freq);
                }
            }
        }
        if self.instrument_estimates >= INSTRUMENT_SAMPLE_LIMIT {
            self.close_instrument_phase();
        }
    }

    /// Ends the instrument phase, early if the caller's sampling time is up.
    pub fn finish_instrument_phase(&mut self) -> Result<(), CalibrationError> {
        self.expect_phase(CalibrationPhase::Instrument, "finish the instrument phase")?;
        self.close_instrument_phase();
        Ok(())
    }

    fn close_instrument_phase(&mut self) {
        self.window.clear();
        self.phase = CalibrationPhase::InstrumentComplete;
    }

    /// Builds the final profile. One-shot: the controller is finished afterwards.
    pub fn finalize(&mut self) -> Result<Calibration, CalibrationError> {
        if self.phase == CalibrationPhase::Instrument {
            self.close_instrument_phase();
        }
        self.expect_phase(CalibrationPhase::InstrumentComplete, "finalize")?;

        let frequency_range = derive_frequency_range(&self.observed, self.prior.frequency_range);
        let magnitude_threshold = threshold_for_distinct_notes(self.distinct_notes.len());
        let profile = CalibrationProfile {
            noise_level: self.noise_level,
            frequency_range,
            magnitude_threshold,
        };

        let mut observed_frequencies = self.observed.clone();
        observed_frequencies.sort_by(f32::total_cmp);
        let report = CalibrationReport {
            noise_estimates: self.noise_estimates,
            noise_detections: self.noise_frequencies.len(),
            instrument_estimates: self.instrument_estimates,
            observed_frequencies,
            distinct_notes: self.distinct_notes.iter().map(|n| n.name.to_string()).collect(),
        };

        log::info!(
            "Calibration complete: range {:.1}-{:.1} Hz, threshold {}, noise {:.1} Hz ({} distinct notes)",
            profile.frequency_range.min,
            profile.frequency_range.max,
            profile.magnitude_threshold,
            profile.noise_level,
            report.distinct_notes.len()
        );

        self.phase = CalibrationPhase::Finished;
        Ok(Calibration { profile, report })
    }

    fn expect_phase(
        &self,
        expected: CalibrationPhase,
        action: &'static str,
    ) -> Result<(), CalibrationError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(CalibrationError::WrongPhase {
                action,
                phase: self.phase.label(),
            })
        }
    }
}
