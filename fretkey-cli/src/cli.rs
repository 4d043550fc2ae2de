//! Command-line parsing and conversion into a detector configuration.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use std::time::Duration;

use fretkey_core::config::{DEFAULT_SAMPLE_RATE, DEFAULT_WINDOW_SIZE};
use fretkey_core::mapping::parse_mapping;
use fretkey_core::{DetectorConfig, KeyMapper, MappingScheme};

/// Where committed notes go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Send the mapped keys to the focused application
    Type,
    /// Write the mapped keys to stdout
    Echo,
    /// Print one JSON object per committed note on stdout
    Json,
    /// Only log what would be typed
    DryRun,
}

/// Play guitar, type text. Open strings are detected from the microphone and
/// turned into key presses.
#[derive(Debug, Parser, Clone)]
#[command(name = "fretkey", version)]
pub struct Args {
    /// Mapping scheme: letters, numbers, qwerty or custom
    #[arg(long, default_value = "letters")]
    pub scheme: String,

    /// Override a custom-scheme entry, e.g. --map E2=backspace (repeatable)
    #[arg(long = "map", action = ArgAction::Append, value_name = "NOTE=KEY")]
    pub mappings: Vec<String>,

    /// Print the mappings of every scheme and exit
    #[arg(long)]
    pub list_schemes: bool,

    /// Print detected audio input devices and exit
    #[arg(long)]
    pub list_input_devices: bool,

    /// Preferred audio input device name
    #[arg(long)]
    pub input_device: Option<String>,

    /// Capture sample rate in Hz
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Analysis window size in samples
    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
    pub window_size: usize,

    /// Maximum gap between agreeing detections, in milliseconds
    #[arg(long, default_value_t = 200)]
    pub debounce_ms: u64,

    /// Agreeing detections required before a note is typed
    #[arg(long, default_value_t = 3)]
    pub consistency: u32,

    /// Skip calibration and use the default thresholds
    #[arg(long)]
    pub skip_calibration: bool,

    /// Time limit for the ambient noise measurement, in seconds
    #[arg(long, default_value_t = 3)]
    pub noise_seconds: u64,

    /// Time limit for the instrument measurement, in seconds
    #[arg(long, default_value_t = 10)]
    pub instrument_seconds: u64,

    /// Stop automatically after this many seconds
    #[arg(long)]
    pub duration_secs: Option<u64>,

    /// What to do with committed notes
    #[arg(long, value_enum, default_value_t = OutputMode::Type)]
    pub output: OutputMode,

    /// Print the calibration summary as JSON
    #[arg(long)]
    pub json_calibration: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn detector_config(&self) -> Result<DetectorConfig> {
        let scheme: MappingScheme = self.scheme.parse()?;
        let config = DetectorConfig {
            sample_rate: self.sample_rate,
            window_size: self.window_size,
            scheme,
            debounce: Duration::from_millis(self.debounce_ms),
            consistency_threshold: self.consistency,
            ..DetectorConfig::default()
        };
        config.validate().context("invalid detector configuration")?;
        Ok(config)
    }

    /// Builds the key mapper for `scheme`, applying every `--map` override.
    pub fn key_mapper(&self, scheme: MappingScheme) -> Result<KeyMapper> {
        let mut mapper = KeyMapper::new(scheme);
        for spec in &self.mappings {
            let (note, action) =
                parse_mapping(spec).with_context(|| format!("bad --map value '{}'", spec))?;
            mapper.add_custom_mapping(note, action);
        }
        if !self.mappings.is_empty() && scheme != MappingScheme::Custom {
            log::warn!(
                "--map only changes the custom scheme; active scheme is {}",
                scheme
            );
        }
        Ok(mapper)
    }

    pub fn noise_duration(&self) -> Duration {
        Duration::from_secs(self.noise_seconds)
    }

    pub fn instrument_duration(&self) -> Duration {
        Duration::from_secs(self.instrument_seconds)
    }
}
