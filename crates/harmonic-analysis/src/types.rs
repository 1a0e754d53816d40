use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A single sounding note. Times are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// MIDI pitch 0–127
    pub pitch: u8,
    pub start_time: f64,
    pub duration: f64,
}

impl NoteEvent {
    /// Build a validated note.
    pub fn new(pitch: u8, start_time: f64, duration: f64) -> Result<Self> {
        let note = Self {
            pitch,
            start_time,
            duration,
        };
        note.validate(0)?;
        Ok(note)
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    pub fn pitch_class(&self) -> u8 {
        self.pitch % 12
    }

    /// Check the structural contract for the note at `index` of its input.
    pub fn validate(&self, index: usize) -> Result<()> {
        if self.pitch > 127 {
            return Err(Error::PitchOutOfRange {
                index,
                pitch: self.pitch,
            });
        }
        if !self.start_time.is_finite() || !self.duration.is_finite() {
            return Err(Error::NonFiniteTiming { index });
        }
        if self.start_time < 0.0 {
            return Err(Error::NegativeStart {
                index,
                start: self.start_time,
            });
        }
        if self.duration <= 0.0 {
            return Err(Error::NonPositiveDuration {
                index,
                duration: self.duration,
            });
        }
        Ok(())
    }
}

/// Build notes from parallel pitch/start/duration arrays.
///
/// All three arrays must have the same length, and every resulting note
/// must pass [`NoteEvent::validate`].
pub fn notes_from_parallel(pitches: &[i64], starts: &[f64], durations: &[f64]) -> Result<Vec<NoteEvent>> {
    if pitches.len() != starts.len() || pitches.len() != durations.len() {
        return Err(Error::LengthMismatch {
            pitches: pitches.len(),
            starts: starts.len(),
            durations: durations.len(),
        });
    }

    pitches
        .iter()
        .zip(starts)
        .zip(durations)
        .enumerate()
        .map(|(index, ((&pitch, &start_time), &duration))| {
            let pitch = u8::try_from(pitch)
                .ok()
                .filter(|p| *p <= 127)
                .ok_or(Error::PitchOutOfRange {
                    index,
                    pitch: pitch.clamp(0, u8::MAX as i64) as u8,
                })?;
            let note = NoteEvent {
                pitch,
                start_time,
                duration,
            };
            note.validate(index)?;
            Ok(note)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    Major,
    Minor,
}

impl std::fmt::Display for KeyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMode::Major => write!(f, "major"),
            KeyMode::Minor => write!(f, "minor"),
        }
    }
}

/// A tonal center: root pitch class plus mode.
///
/// Serializes as its conventional name ("C", "F#m", "Bb").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Key {
    /// Pitch class 0–11 (C=0, C#=1, ...)
    pub root_pitch_class: u8,
    pub mode: KeyMode,
}

impl Default for Key {
    fn default() -> Self {
        Key {
            root_pitch_class: 0,
            mode: KeyMode::Major,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyCandidate {
    /// Root note name: "C", "Db", "F#", etc.
    pub root: String,
    /// Pitch class 0–11 (C=0, C#=1, ...)
    pub root_pitch_class: u8,
    pub mode: KeyMode,
    /// Template correlation mapped onto [0, 1]
    pub confidence: f64,
}

impl KeyCandidate {
    pub fn key(&self) -> Key {
        Key {
            root_pitch_class: self.root_pitch_class,
            mode: self.mode,
        }
    }
}

impl Default for KeyCandidate {
    fn default() -> Self {
        KeyCandidate {
            root: "C".into(),
            root_pitch_class: 0,
            mode: KeyMode::Major,
            confidence: 0.0,
        }
    }
}

/// Ranked key detection: the most likely key followed by alternatives
/// in descending confidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyDetection {
    pub most_likely: KeyCandidate,
    pub alternatives: Vec<KeyCandidate>,
}

impl KeyDetection {
    pub fn ranked(&self) -> impl Iterator<Item = &KeyCandidate> {
        std::iter::once(&self.most_likely).chain(self.alternatives.iter())
    }

    pub fn is_degenerate(&self) -> bool {
        self.most_likely.confidence == 0.0 && self.alternatives.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    Suspended4,
    Suspended2,
    Dominant7,
    Major7,
    Minor7,
    MinorMajor7,
    Diminished7,
    HalfDiminished7,
    Major6,
    Minor6,
    Add9,
    Power,
}

impl ChordQuality {
    /// Suffix for chord symbol display
    pub fn suffix(&self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
            ChordQuality::Diminished => "dim",
            ChordQuality::Augmented => "aug",
            ChordQuality::Suspended4 => "sus4",
            ChordQuality::Suspended2 => "sus2",
            ChordQuality::Dominant7 => "7",
            ChordQuality::Major7 => "maj7",
            ChordQuality::Minor7 => "m7",
            ChordQuality::MinorMajor7 => "m(maj7)",
            ChordQuality::Diminished7 => "dim7",
            ChordQuality::HalfDiminished7 => "m7b5",
            ChordQuality::Major6 => "6",
            ChordQuality::Minor6 => "m6",
            ChordQuality::Add9 => "add9",
            ChordQuality::Power => "5",
        }
    }

    /// Whether the chord's third is minor (or diminished), which lowercases
    /// its Roman numeral.
    pub fn is_minor_family(&self) -> bool {
        matches!(
            self,
            ChordQuality::Minor
                | ChordQuality::Diminished
                | ChordQuality::Minor7
                | ChordQuality::MinorMajor7
                | ChordQuality::Diminished7
                | ChordQuality::HalfDiminished7
                | ChordQuality::Minor6
        )
    }
}

/// Functional role of a chord within its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarmonicFunction {
    Tonic,
    Predominant,
    Dominant,
    /// Root lies outside the key's scale
    Chromatic,
}

/// Scale-degree label of a chord relative to a key: accidental, degree, quality.
///
/// Case and suffix derive from the quality, so `Dm7` in C is `ii7` and
/// `G7` is `V7`. Serializes as its display string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RomanNumeral {
    /// -1 = flat, 0 = diatonic, 1 = sharp
    pub alteration: i8,
    /// Scale degree 1–7
    pub degree: u8,
    pub quality: ChordQuality,
}

/// Sentinel symbol for spans whose pitch-class set matches no chord template.
pub const UNCLASSIFIED: &str = "unclassified";

/// A maximal time interval with a constant set of sounding pitch classes,
/// labeled against the key active at its start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordSpan {
    pub start_time: f64,
    pub end_time: f64,
    /// Sounding pitch classes, ascending
    pub pitch_classes: Vec<u8>,
    /// Lowest sounding MIDI pitch, if any note sounds
    pub bass_pitch: Option<u8>,
    pub root_pitch_class: Option<u8>,
    pub quality: Option<ChordQuality>,
    /// Chord symbol ("Cmaj7", "F#m") or "unclassified"
    pub symbol: String,
    pub roman_numeral: Option<RomanNumeral>,
    pub function: Option<HarmonicFunction>,
    pub confidence: f64,
    /// Key context used for the Roman numeral
    pub key: Key,
}

impl ChordSpan {
    pub fn is_classified(&self) -> bool {
        self.quality.is_some()
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// One (pitch, position) observation of a voice: a chord root or bass note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoicePoint {
    pub pitch: u8,
    pub position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceLeadingQuality {
    InsufficientData,
    Smooth,
    Moderate,
    Choppy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeapRecord {
    pub from_pitch: u8,
    pub to_pitch: u8,
    /// Signed: positive is ascending
    pub interval_semitones: i16,
    /// Position of the point the leap departs from
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceLeadingReport {
    /// 0–100, higher is smoother
    pub smoothness_score: f64,
    pub quality: VoiceLeadingQuality,
    pub total_transitions: usize,
    pub steps: usize,
    pub skips: usize,
    pub leaps: usize,
    pub large_leaps: Vec<LeapRecord>,
    pub suggestions: Vec<String>,
}

impl Default for VoiceLeadingReport {
    fn default() -> Self {
        VoiceLeadingReport {
            smoothness_score: 100.0,
            quality: VoiceLeadingQuality::InsufficientData,
            total_transitions: 0,
            steps: 0,
            skips: 0,
            leaps: 0,
            large_leaps: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CadenceType {
    Authentic,
    Half,
    Plagal,
    Deceptive,
}

impl CadenceType {
    pub fn strength(&self) -> f64 {
        match self {
            CadenceType::Authentic => 1.0,
            CadenceType::Deceptive => 0.8,
            CadenceType::Plagal => 0.7,
            CadenceType::Half => 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadencePoint {
    /// Index of the arrival chord in the harmonic stream
    pub position: usize,
    #[serde(rename = "type")]
    pub cadence_type: CadenceType,
    pub chords: [RomanNumeral; 2],
    pub strength: f64,
}

/// How two keys relate on the circle of fifths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRelationship {
    Same,
    Relative,
    Parallel,
    CloselyRelated,
    ModeratelyRelated,
    /// Distant on the circle of fifths, tonics a third apart
    ChromaticMediant,
    Distant,
}

/// A diatonic triad shared by both keys of a modulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotChord {
    /// Spelled for the destination key
    pub symbol: String,
    pub from_numeral: RomanNumeral,
    pub to_numeral: RomanNumeral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulationEvent {
    pub from_key: Key,
    pub to_key: Key,
    /// Start time of the first chord heard in the new key
    pub approx_time: f64,
    /// Harmonic-stream index where the new key takes effect
    pub position: usize,
    pub confidence: f64,
    pub relationship: KeyRelationship,
    /// In scale-degree order of the departing key
    pub pivot_chords: Vec<PivotChord>,
    /// Scale pitch classes the two keys share, ascending
    pub common_tones: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MusicalForm {
    Phrase,
    Period,
    BinaryForm,
    SongForm,
    ExtendedForm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatedPattern {
    pub pattern: Vec<RomanNumeral>,
    pub length: usize,
    /// Non-overlapping start positions, ascending
    pub positions: Vec<usize>,
}

impl RepeatedPattern {
    pub fn repetitions(&self) -> usize {
        self.positions.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormReport {
    pub total_length: usize,
    pub repeated_patterns: Vec<RepeatedPattern>,
    pub suggested_form: MusicalForm,
    pub phrase_lengths: Vec<usize>,
    /// Section letters in order, e.g. ["A", "A", "B"]
    pub sections: Vec<String>,
    pub key_centers: Vec<Key>,
}

impl Default for FormReport {
    fn default() -> Self {
        FormReport {
            total_length: 0,
            repeated_patterns: Vec::new(),
            suggested_form: MusicalForm::Phrase,
            phrase_lengths: Vec::new(),
            sections: Vec::new(),
            key_centers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnrecognizedChordSymbol,
    UnrecognizedKeyContext,
}

/// Input that was skipped rather than failing the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Position in the input sequence, when the input is a sequence
    pub index: Option<usize>,
    pub input: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonChordToneKind {
    /// Approached and left by step in the same direction
    PassingTone,
    /// Steps away from a pitch and returns to it
    NeighborTone,
    Other,
}

/// A note outside the harmony sounding under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonChordTone {
    pub pitch: u8,
    pub time: f64,
    pub kind: NonChordToneKind,
    /// Symbol of the underlying chord
    pub chord: String,
}

/// Complete harmonic analysis of one input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub key: KeyDetection,
    /// Key used to label the opening chords (supplied or detected)
    pub key_context: Key,
    pub chords: Vec<ChordSpan>,
    pub voice_leading: VoiceLeadingReport,
    pub cadences: Vec<CadencePoint>,
    pub modulations: Vec<ModulationEvent>,
    pub form: FormReport,
    /// Chord changes per time unit, one entry per harmonic-stream chord
    pub harmonic_rhythm: Vec<f64>,
    /// Embellishing notes; always empty for chord-symbol input
    pub non_chord_tones: Vec<NonChordTone>,
    pub diagnostics: Vec<Diagnostic>,
}
