// fretkey-core/src/lib.rs

//! The core logic for the guitar-driven keyboard.
//! This crate turns a stream of PCM audio into debounced note events and
//! maps them onto key actions. It is completely headless; capture and key
//! injection are collaborators at the edges.

pub mod audio;
pub mod calibration;
pub mod config;
pub mod error;
pub mod fft;
pub mod inject;
pub mod mapping;
pub mod peak;
pub mod session;
pub mod stabilizer;
pub mod stability;
pub mod tuning;
pub mod window;

pub use calibration::{Calibration, CalibrationController, CalibrationPhase, CalibrationProfile, FrequencyRange};
pub use config::DetectorConfig;
pub use error::{CalibrationError, ConfigError, InjectError};
pub use mapping::{KeyAction, KeyMapper, MappingScheme};
pub use session::{DetectionSession, Detection, NoteEvent};
pub use tuning::Note;
