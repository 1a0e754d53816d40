use crate::cadence::detect_cadences;
use crate::chords::{label_segment, segment, Segment};
use crate::config::AnalysisConfig;
use crate::form::analyze_form;
use crate::key::detect_key;
use crate::modulation::{detect_modulations, opening_key};
use crate::non_chord::find_non_chord_tones;
use crate::profile::PitchClassProfile;
use crate::types::{
    CadencePoint, ChordSpan, FormReport, Key, KeyDetection, ModulationEvent, NonChordTone,
    NoteEvent, RomanNumeral, VoiceLeadingReport, VoicePoint,
};
use crate::voice_leading::analyze_voice_leading;

/// Trait for harmonic analysis backends.
///
/// Each stage is a pure function of its inputs so an engine can be shared
/// across threads. `HeuristicAnalyzer` is the template-matching backend.
pub trait MusicAnalyzer: Send + Sync {
    fn detect_key(&self, profile: &PitchClassProfile) -> KeyDetection;

    fn segment(&self, notes: &[NoteEvent]) -> Vec<Segment>;

    fn label(&self, segment: &Segment, key: &Key) -> ChordSpan;

    fn voice_leading(&self, points: &[VoicePoint]) -> VoiceLeadingReport;

    fn cadences(&self, numerals: &[RomanNumeral], boundaries: &[usize]) -> Vec<CadencePoint>;

    /// Key the opening of the stream is heard in, when it can be told.
    fn opening_key(&self, stream: &[ChordSpan]) -> Option<Key>;

    fn modulations(&self, stream: &[ChordSpan], initial_key: Option<Key>) -> Vec<ModulationEvent>;

    fn non_chord_tones(
        &self,
        notes: &[NoteEvent],
        initial_key: Key,
        modulations: &[ModulationEvent],
    ) -> Vec<NonChordTone>;

    fn form(
        &self,
        numerals: &[RomanNumeral],
        boundaries: &[usize],
        initial_key: Key,
        modulations: &[ModulationEvent],
    ) -> FormReport;
}

/// Krumhansl-Schmuckler key detection, interval-template chord labeling,
/// rule-based cadences, windowed modulation detection and repeated-pattern
/// form analysis.
#[derive(Debug, Clone, Default)]
pub struct HeuristicAnalyzer {
    config: AnalysisConfig,
}

impl HeuristicAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }
}

impl MusicAnalyzer for HeuristicAnalyzer {
    fn detect_key(&self, profile: &PitchClassProfile) -> KeyDetection {
        detect_key(profile, self.config.key_alternatives)
    }

    fn segment(&self, notes: &[NoteEvent]) -> Vec<Segment> {
        segment(notes)
    }

    fn label(&self, segment: &Segment, key: &Key) -> ChordSpan {
        label_segment(segment, key)
    }

    fn voice_leading(&self, points: &[VoicePoint]) -> VoiceLeadingReport {
        analyze_voice_leading(points, self.config.large_leap_threshold)
    }

    fn cadences(&self, numerals: &[RomanNumeral], boundaries: &[usize]) -> Vec<CadencePoint> {
        detect_cadences(numerals, boundaries)
    }

    fn opening_key(&self, stream: &[ChordSpan]) -> Option<Key> {
        opening_key(stream, &self.config)
    }

    fn modulations(&self, stream: &[ChordSpan], initial_key: Option<Key>) -> Vec<ModulationEvent> {
        detect_modulations(stream, initial_key, &self.config)
    }

    fn non_chord_tones(
        &self,
        notes: &[NoteEvent],
        initial_key: Key,
        modulations: &[ModulationEvent],
    ) -> Vec<NonChordTone> {
        find_non_chord_tones(notes, initial_key, modulations)
    }

    fn form(
        &self,
        numerals: &[RomanNumeral],
        boundaries: &[usize],
        initial_key: Key,
        modulations: &[ModulationEvent],
    ) -> FormReport {
        analyze_form(
            numerals,
            boundaries,
            initial_key,
            modulations,
            self.config.phrase_length,
            self.config.max_pattern_length,
            self.config.max_patterns,
        )
    }
}
