//! Fixed lookup tables for the legacy header's categorical indices
//!
//! The tables are closed: an index past the end resolves to `"Other"`, while
//! the raw value is kept so the header re-encodes unchanged.

use serde::Serialize;

/// Fallback name for indices outside a table
pub const OTHER: &str = "Other";

/// Instrument icons shown by the authoring tool
pub const ICONS: [&str; 28] = [
    "Organ",
    "Cello",
    "Drum Kit",
    "Bell",
    "Trumpet",
    "Guitar",
    "Piano",
    "Marimba",
    "Record Player",
    "E-Piano",
    "Drum Pads",
    "Bass Guitar",
    "Electric Guitar",
    "Wave",
    "Asian Symbol",
    "Flute",
    "Speaker",
    "Score",
    "Conga",
    "Pipe Organ",
    "FX",
    "Computer",
    "Violin",
    "Surround",
    "Synthesizer",
    "Microphone",
    "Oboe",
    "Saxophone",
];

/// Sound categories
pub const CATEGORIES: [&str; 12] = [
    "Acoustic",
    "Electric",
    "Synthetic",
    "Orchestral",
    "Ethnic",
    "Vintage",
    "Percussive",
    "Vocal",
    "Sound Effects",
    "Loops",
    "Ambient",
    "Experimental",
];

/// Sound characters
pub const CHARACTERS: [&str; 12] = [
    "Bright", "Dark", "Warm", "Clean", "Distorted", "Soft", "Hard", "Wide", "Dry", "Wet",
    "Evolving", "Plucked",
];

/// A categorical index together with its resolved name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryIndex {
    /// Value stored in the header
    pub raw: u16,
    /// Table entry, or [`OTHER`]
    pub name: &'static str,
}

impl CategoryIndex {
    /// Resolve `raw` against `table`
    pub fn resolve(table: &[&'static str], raw: u16) -> Self {
        Self {
            raw,
            name: table.get(raw as usize).copied().unwrap_or(OTHER),
        }
    }

    /// Find the index of a name; unknown names map to the first index past the table
    pub fn from_name(table: &[&'static str], name: &str) -> Self {
        match table.iter().position(|entry| entry.eq_ignore_ascii_case(name)) {
            Some(index) => Self::resolve(table, index as u16),
            None => Self {
                raw: table.len() as u16,
                name: OTHER,
            },
        }
    }

    /// True when the raw value is outside the table
    pub fn is_other(&self) -> bool {
        self.name == OTHER
    }
}
