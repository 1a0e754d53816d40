use serde::{Deserialize, Serialize};

/// Tunables for one analysis engine, resolved once at construction.
///
/// Every field has a default, so a partial TOML table deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Semitones at or above which a voice transition counts as a large leap
    pub large_leap_threshold: u8,
    /// Chords per sliding key window
    pub modulation_window: usize,
    /// Consecutive agreeing windows required before a modulation fires
    pub modulation_debounce: usize,
    /// Minimum window key confidence for a modulation candidate
    pub modulation_confidence: f64,
    /// Default phrase length in chords, used for cadence boundaries and sectioning
    pub phrase_length: usize,
    /// Ranked keys kept after the most likely one
    pub key_alternatives: usize,
    /// Repeated patterns reported in the form analysis
    pub max_patterns: usize,
    /// Longest pattern the repeated-subsequence search considers
    pub max_pattern_length: usize,
    /// Octave used to place chord-symbol bass notes (C3 = MIDI 48)
    pub chord_symbol_octave: u8,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            large_leap_threshold: 7,
            modulation_window: 8,
            modulation_debounce: 3,
            modulation_confidence: 0.7,
            phrase_length: 4,
            key_alternatives: 5,
            max_patterns: 5,
            max_pattern_length: 32,
            chord_symbol_octave: 3,
        }
    }
}

impl AnalysisConfig {
    /// MIDI pitch of `pitch_class` in the chord-symbol register.
    pub fn chord_symbol_pitch(&self, pitch_class: u8) -> u8 {
        let base = (self.chord_symbol_octave.min(9) as u16 + 1) * 12;
        (base + (pitch_class % 12) as u16).min(127) as u8
    }
}
