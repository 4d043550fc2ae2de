//! Calibration driven by synthetic audio, followed by detection with the
//! resulting profile.

use std::time::{Duration, Instant};

use fretkey_core::calibration::{
    CONSERVATIVE_THRESHOLD, INSTRUMENT_SAMPLE_LIMIT, NOISE_SAMPLE_LIMIT, RANGE_MARGIN_HZ,
    SENSITIVE_THRESHOLD,
};
use fretkey_core::{CalibrationController, CalibrationPhase, DetectionSession, DetectorConfig};

const SAMPLE_RATE: u32 = 44100;
const CHUNK: usize = 1024;

fn tone(freq: f32, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
        .collect()
}

fn to_pcm16le(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&s| ((s * 32767.0) as i16).to_le_bytes())
        .collect()
}

fn run_noise_phase(cal: &mut CalibrationController) {
    cal.begin_noise_phase().unwrap();
    let silence = vec![0u8; CHUNK * 2];
    while cal.phase() == CalibrationPhase::Noise {
        cal.feed(&silence);
    }
    assert_eq!(cal.phase(), CalibrationPhase::AwaitingConfirmation);
    assert_eq!(cal.noise_level(), 0.0);
}

#[test]
fn test_open_strings_widen_sensitivity() {
    let config = DetectorConfig::default();
    let mut cal = CalibrationController::new(&config);
    run_noise_phase(&mut cal);

    // Chunks fed before confirmation are ignored.
    let early = to_pcm16le(&tone(110.0, CHUNK));
    assert_eq!(cal.feed(&early), CalibrationPhase::AwaitingConfirmation);

    cal.confirm_ready().unwrap();
    for freq in [82.41, 110.0, 146.83, 196.0] {
        let pcm = to_pcm16le(&tone(freq, CHUNK * 12));
        for chunk in pcm.chunks(CHUNK * 2) {
            cal.feed(chunk);
        }
    }
    assert_eq!(cal.phase(), CalibrationPhase::Instrument);

    let calibration = cal.finalize().unwrap();
    let report = &calibration.report;
    let profile = calibration.profile;

    assert!(report.distinct_notes.len() >= 3, "heard {:?}", report.distinct_notes);
    assert_eq!(profile.magnitude_threshold, SENSITIVE_THRESHOLD);

    let lowest = report.observed_frequencies.first().copied().unwrap();
    let highest = report.observed_frequencies.last().copied().unwrap();
    assert_eq!(profile.frequency_range.min, lowest - RANGE_MARGIN_HZ);
    assert_eq!(profile.frequency_range.max, highest + RANGE_MARGIN_HZ);
    assert!(lowest < 95.0 && highest > 185.0);
}

#[test]
fn test_quiet_instrument_phase_keeps_defaults() {
    let config = DetectorConfig::default();
    let mut cal = CalibrationController::new(&config);
    run_noise_phase(&mut cal);
    cal.confirm_ready().unwrap();

    let silence = vec![0u8; CHUNK * 2];
    while cal.phase() == CalibrationPhase::Instrument {
        cal.feed(&silence);
    }

    let calibration = cal.finalize().unwrap();
    assert_eq!(calibration.report.noise_estimates, NOISE_SAMPLE_LIMIT);
    assert_eq!(calibration.report.instrument_estimates, INSTRUMENT_SAMPLE_LIMIT);
    assert_eq!(calibration.profile.magnitude_threshold, CONSERVATIVE_THRESHOLD);
    assert_eq!(calibration.profile.frequency_range.min, 80.0);
    assert_eq!(calibration.profile.frequency_range.max, 800.0);
}

#[test]
fn test_calibrated_profile_drives_detection() {
    let config = DetectorConfig::default();
    let mut cal = CalibrationController::new(&config);
    run_noise_phase(&mut cal);
    cal.confirm_ready().unwrap();
    for freq in [110.0, 196.0, 329.63] {
        let pcm = to_pcm16le(&tone(freq, CHUNK * 12));
        for chunk in pcm.chunks(CHUNK * 2) {
            cal.feed(chunk);
        }
    }
    let calibration = cal.finalize().unwrap();

    let mut session = DetectionSession::new(config, calibration.profile).unwrap();
    let pcm = to_pcm16le(&tone(196.0, CHUNK * 12));
    let t0 = Instant::now();
    let events: Vec<_> = pcm
        .chunks(CHUNK * 2)
        .enumerate()
        .filter_map(|(i, chunk)| session.feed(chunk, t0 + Duration::from_millis(23 * i as u64)))
        .collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].note.name, "G3");
}
