//! Configuration parameters for a detection session

use std::time::Duration;

use crate::error::ConfigError;
use crate::mapping::MappingScheme;
use crate::stabilizer::MIN_CONSISTENCY_THRESHOLD;

/// Default capture sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Default analysis window length in samples.
///
/// At 44.1 kHz this gives a bin width of roughly 10.8 Hz, which is enough to
/// separate the open strings of a guitar.
pub const DEFAULT_WINDOW_SIZE: usize = 4096;

/// Largest accepted analysis window, about 1.5 s of audio at 44.1 kHz.
pub const MAX_WINDOW_SIZE: usize = 65536;

/// Detection session configuration.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Sample rate of the incoming PCM stream in Hz (default: 44100)
    pub sample_rate: u32,

    /// Analysis window size N in samples (default: 4096)
    pub window_size: usize,

    /// Active note → key mapping scheme (default: letters)
    pub scheme: MappingScheme,

    /// Maximum gap between two agreeing detections before the
    /// consistency counter starts over (default: 200 ms)
    pub debounce: Duration,

    /// Number of agreeing detections required before a note is committed (default: 3)
    pub consistency_threshold: u32,

    /// Minimum combined confidence (peak × stability) for a frequency to
    /// reach the classifier (default: 0.5)
    pub confidence_gate: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            window_size: DEFAULT_WINDOW_SIZE,
            scheme: MappingScheme::Letters,
            debounce: Duration::from_millis(200),
            consistency_threshold: 3,
            confidence_gate: 0.5,
        }
    }
}

impl DetectorConfig {
    /// Checks the values that would otherwise make the pipeline meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate);
        }
        if !(2..=MAX_WINDOW_SIZE).contains(&self.window_size) {
            return Err(ConfigError::InvalidWindowSize(self.window_size));
        }
        if self.consistency_threshold < MIN_CONSISTENCY_THRESHOLD {
            return Err(ConfigError::InvalidConsistencyThreshold(
                self.consistency_threshold,
            ));
        }
        Ok(())
    }

    /// Width of one spectral bin in Hz.
    pub fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.window_size as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = DetectorConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.bin_width() - 10.766).abs() < 0.01);
    }

    #[test]
    fn largest_window_is_accepted() {
        let config = DetectorConfig {
            window_size: MAX_WINDOW_SIZE,
            ..DetectorConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_values() {
        let mut config = DetectorConfig::default();
        config.window_size = 1;
        assert_eq!(config.validate(), Err(ConfigError::InvalidWindowSize(1)));

        let mut config = DetectorConfig::default();
        config.window_size = usize::MAX;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidWindowSize(usize::MAX))
        );

        let mut config = DetectorConfig::default();
        config.consistency_threshold = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidConsistencyThreshold(0))
        );

        let mut config = DetectorConfig::default();
        config.sample_rate = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidSampleRate));
    }
}
