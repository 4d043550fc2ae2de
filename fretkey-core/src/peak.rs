//! # Peak Estimation Module
//!
//! Locates the dominant frequency of a `SpectralFrame` inside the calibrated
//! search band and scores how much it stands out.
//!
//! The secondary magnitude is a running second maximum collected during the
//! same scan, not a separate peak picker, so it is frequently the bin right
//! next to the primary peak. Confidence thresholds downstream are tuned
//! against exactly this behaviour.

use serde::Serialize;

use crate::calibration::CalibrationProfile;
use crate::fft::SpectralFrame;

/// Minimum distance in Hz between an estimate and the calibrated noise level.
pub const NOISE_REJECTION_HZ: f32 = 20.0;

/// Result of a single peak scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeakEstimate {
    /// Estimated frequency in Hz, absent when the acceptance gate failed.
    pub frequency: Option<f32>,
    /// Magnitude of the strongest bin in the band.
    pub magnitude: f32,
    /// Running second-largest magnitude seen during the scan.
    pub secondary_magnitude: f32,
    /// Confidence in [0, 1]; zero when the gate failed.
    pub confidence: f32,
}

impl PeakEstimate {
    pub fn is_accepted(&self) -> bool {
        self.frequency.is_some()
    }
}

/// Scans the calibrated band of `frame` and returns the gated estimate.
///
/// The band covers bins `floor(min * N / sr)` up to, but not including,
/// `floor(max * N / sr)`, clipped to the frame length.
pub fn estimate_peak(frame: &SpectralFrame, profile: &CalibrationProfile) -> PeakEstimate {
    let start_bin = frame.frequency_to_bin(profile.frequency_range.min);
    let end_bin = frame
        .frequency_to_bin(profile.frequency_range.max)
        .min(frame.len());

    let mut max_magnitude = 0.0f32;
    let mut second_magnitude = 0.0f32;
    let mut peak_bin = 0usize;

    for bin in start_bin..end_bin {
        let magnitude = frame.magnitudes[bin];
        if magnitude > max_magnitude {
            second_magnitude = max_magnitude;
            max_magnitude = magnitude;
            peak_bin = bin;
        } else if magnitude > second_magnitude {
            second_magnitude = magnitude;
        }
    }

    let frequency = frame.bin_frequency(peak_bin);
    let threshold = profile.magnitude_threshold;

    let above_threshold = max_magnitude > threshold;
    // Compares against a frequency-valued noise level, not an amplitude.
    let not_noise = (frequency - profile.noise_level).abs() > NOISE_REJECTION_HZ;

    if !(above_threshold && not_noise) {
        log::trace!(
            "peak rejected: {:.1} Hz mag={:.4} (threshold {:.4}, noise {:.1} Hz)",
            frequency,
            max_magnitude,
            threshold,
            profile.noise_level
        );
        return PeakEstimate {
            frequency: None,
            magnitude: max_magnitude,
            secondary_magnitude: second_magnitude,
            confidence: 0.0,
        };
    }

    let peak_ratio = if second_magnitude > 0.0 {
        max_magnitude / second_magnitude
    } else {
        max_magnitude
    };
    let confidence = ((max_magnitude / threshold) * (peak_ratio / 2.0)).min(1.0);

    PeakEstimate {
        frequency: Some(frequency),
        magnitude: max_magnitude,
        secondary_magnitude: second_magnitude,
        confidence,
    }
}
