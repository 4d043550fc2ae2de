//! # Note Classification Module
//!
//! Maps an estimated frequency onto the fixed reference table of open guitar
//! strings in standard tuning. Anything further than 20 Hz from every
//! reference note is not a note.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Maximum distance in Hz between a frequency and the note it is classified as.
pub const NOTE_TOLERANCE_HZ: f32 = 20.0;

/// A reference note with its canonical frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Note {
    /// Note label (e.g. "E2", "A2")
    pub name: &'static str,
    /// Frequency in Hz
    pub frequency: f32,
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl Eq for Note {}

impl std::hash::Hash for Note {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Note {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Note {
    /// Orders by pitch, which for the reference table is also table order.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.frequency
            .total_cmp(&other.frequency)
            .then_with(|| self.name.cmp(other.name))
    }
}

/// Open strings of a six-string guitar in standard tuning, low to high.
///
/// Classification scans this table in order, so on an exact tie the lower
/// string wins.
pub const REFERENCE_NOTES: [Note; 6] = [
    Note { name: "E2", frequency: 82.41 },
    Note { name: "A2", frequency: 110.00 },
    Note { name: "D3", frequency: 146.83 },
    Note { name: "G3", frequency: 196.00 },
    Note { name: "B3", frequency: 246.94 },
    Note { name: "E4", frequency: 329.63 },
];

/// Static map for note name to table index lookups.
static NOTE_MAP: Lazy<BTreeMap<&'static str, usize>> = Lazy::new(|| {
    REFERENCE_NOTES
        .iter()
        .enumerate()
        .map(|(i, note)| (note.name, i))
        .collect()
});

impl FromStr for Note {
    type Err = ConfigError;

    /// Looks a note up by label, ignoring ASCII case ("a2" is A2).
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let normalized = name.trim().to_ascii_uppercase();
        NOTE_MAP
            .get(normalized.as_str())
            .map(|&i| REFERENCE_NOTES[i])
            .ok_or_else(|| ConfigError::UnknownNote(name.to_string()))
    }
}

/// Finds the closest reference note and the absolute distance to it in Hz.
///
/// The first minimum in table order wins a tie.
pub fn find_nearest_note(freq: f32) -> (Note, f32) {
    let mut closest = REFERENCE_NOTES[0];
    let mut smallest_difference = f32::INFINITY;

    for note in REFERENCE_NOTES.iter() {
        let difference = (freq - note.frequency).abs();
        if difference < smallest_difference {
            smallest_difference = difference;
            closest = *note;
        }
    }

    (closest, smallest_difference)
}

/// Classifies a frequency, returning `None` when no reference note lies
/// strictly within `NOTE_TOLERANCE_HZ`.
pub fn frequency_to_note(freq: f32) -> Option<Note> {
    if !freq.is_finite() {
        return None;
    }
    let (note, difference) = find_nearest_note(freq);
    if difference < NOTE_TOLERANCE_HZ {
        Some(note)
    } else {
        None
    }
}

/// Calculates the deviation from a target frequency in cents.
///
/// 100 cents = 1 semitone; positive values are sharp, negative flat.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}
