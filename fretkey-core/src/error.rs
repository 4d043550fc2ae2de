//! # Error Types
//!
//! Detection itself never fails: every rejected window is simply "no event".
//! The errors here cover configuration mistakes, misuse of the calibration
//! state machine, and failures reported by the key injection collaborator.

use thiserror::Error;

/// Invalid configuration supplied by the user or the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown mapping scheme '{0}' (available: letters, numbers, qwerty, custom)")]
    UnknownScheme(String),
    #[error("unknown note '{0}' (reference notes: E2, A2, D3, G3, B3, E4)")]
    UnknownNote(String),
    #[error("cannot parse key '{0}'")]
    InvalidKey(String),
    #[error("invalid mapping '{0}', expected NOTE=KEY")]
    InvalidMapping(String),
    #[error("invalid frequency range: min {min} Hz must be below max {max} Hz")]
    InvalidRange { min: f32, max: f32 },
    #[error("window size must be between 2 and 65536 samples, got {0}")]
    InvalidWindowSize(usize),
    #[error("sample rate must be non-zero")]
    InvalidSampleRate,
    #[error("consistency threshold must be at least 2, got {0}")]
    InvalidConsistencyThreshold(u32),
}

/// An operation was requested in a calibration phase that does not allow it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    #[error("cannot {action} while calibration is in the {phase} phase")]
    WrongPhase {
        action: &'static str,
        phase: &'static str,
    },
}

/// Failure reported by a key injection backend. Never fatal to the pipeline.
#[derive(Debug, Error)]
pub enum InjectError {
    #[error("I/O error while injecting key: {0}")]
    Io(#[from] std::io::Error),
    #[error("injection backend unavailable: {0}")]
    Unavailable(String),
    #[error("keystroke rejected by the system: {0}")]
    Rejected(String),
}
