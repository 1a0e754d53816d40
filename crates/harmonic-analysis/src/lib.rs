//! Harmonic analysis of note streams and chord progressions.
//!
//! Key detection, chord segmentation and Roman-numeral labeling,
//! voice-leading scoring, cadence and modulation detection, and form
//! inference, composed by [`AnalysisEngine`] into one [`AnalysisResult`].

pub mod analyzer;
pub mod cadence;
pub mod chord_templates;
pub mod chords;
pub mod config;
pub mod form;
pub mod key;
pub mod modulation;
pub mod non_chord;
pub mod profile;
pub mod roman;
pub mod symbol;
pub mod types;
pub mod voice_leading;

pub use analyzer::{HeuristicAnalyzer, MusicAnalyzer};
pub use config::AnalysisConfig;
pub use key::{detect_key, detect_key_from_notes, rank_keys, KeySignature};
pub use profile::PitchClassProfile;
pub use symbol::{parse_chord_symbol, ChordSymbol};
pub use types::{
    notes_from_parallel, AnalysisResult, CadencePoint, CadenceType, ChordQuality, ChordSpan,
    Diagnostic, DiagnosticKind, FormReport, HarmonicFunction, Key, KeyCandidate, KeyDetection,
    KeyMode, KeyRelationship, LeapRecord, ModulationEvent, MusicalForm, NonChordTone,
    NonChordToneKind, NoteEvent, PivotChord, RepeatedPattern, RomanNumeral, VoiceLeadingQuality,
    VoiceLeadingReport, VoicePoint, UNCLASSIFIED,
};

use std::sync::Arc;

use tracing::{debug, info};

use crate::cadence::default_boundaries;
use crate::chords::{harmonic_stream, relabel, symbol_span};
use crate::modulation::{key_at_position, key_at_time};
use crate::voice_leading::bass_line;

/// Errors from harmonic analysis. Only malformed input is an error;
/// musically ambiguous input yields low-confidence results instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parallel arrays differ in length: {pitches} pitches, {starts} starts, {durations} durations")]
    LengthMismatch {
        pitches: usize,
        starts: usize,
        durations: usize,
    },

    #[error("note {index}: pitch {pitch} is outside 0-127")]
    PitchOutOfRange { index: usize, pitch: u8 },

    #[error("note {index}: duration {duration} must be positive")]
    NonPositiveDuration { index: usize, duration: f64 },

    #[error("note {index}: start time {start} is negative")]
    NegativeStart { index: usize, start: f64 },

    #[error("note {index}: start time and duration must be finite")]
    NonFiniteTiming { index: usize },

    #[error("unrecognized key '{0}'")]
    UnrecognizedKey(String),

    #[error("unrecognized Roman numeral '{0}'")]
    UnrecognizedNumeral(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Per-call inputs besides the music itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisOptions {
    /// Key context such as "C", "Am" or "F#". Detected when absent or unparseable.
    pub key: Option<String>,
    /// Phrase-end indices into the harmonic stream. Defaults to every
    /// `phrase_length` chords.
    pub phrase_boundaries: Option<Vec<usize>>,
}

impl AnalysisOptions {
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::default()
        }
    }
}

/// Harmonic analysis engine.
///
/// Composes key detection, chord labeling, voice leading, cadences,
/// modulations and form into a single `AnalysisResult`. Holds no per-call
/// state, so one engine may serve many threads.
pub struct AnalysisEngine {
    analyzer: Arc<dyn MusicAnalyzer>,
    config: AnalysisConfig,
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl AnalysisEngine {
    /// Create with the default heuristic analyzer.
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            analyzer: Arc::new(HeuristicAnalyzer::new(config.clone())),
            config,
        }
    }

    /// Create with a custom analyzer.
    pub fn with_analyzer(analyzer: Arc<dyn MusicAnalyzer>, config: AnalysisConfig) -> Self {
        Self { analyzer, config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze timed notes.
    ///
    /// Fails only if a note is malformed; see [`NoteEvent::validate`].
    pub fn analyze_notes(
        &self,
        notes: &[NoteEvent],
        options: &AnalysisOptions,
    ) -> Result<AnalysisResult> {
        for (index, note) in notes.iter().enumerate() {
            note.validate(index)?;
        }

        let mut diagnostics = Vec::new();
        let supplied = supplied_key(options, &mut diagnostics);

        let detection = self
            .analyzer
            .detect_key(&PitchClassProfile::from_notes(notes));
        let key_context = supplied.unwrap_or_else(|| detection.most_likely.key());

        let segments = self.analyzer.segment(notes);
        debug!(notes = notes.len(), segments = segments.len(), "segmented");

        let spans = segments
            .iter()
            .map(|segment| self.analyzer.label(segment, &key_context))
            .collect();

        Ok(self.complete(
            detection,
            key_context,
            supplied.is_some(),
            spans,
            notes,
            options,
            diagnostics,
        ))
    }

    /// Analyze a chord progression written as symbols, one time unit per chord.
    ///
    /// Unrecognized symbols are skipped and reported in `diagnostics`.
    pub fn analyze_chord_symbols<S: AsRef<str>>(
        &self,
        symbols: &[S],
        options: &AnalysisOptions,
    ) -> AnalysisResult {
        let mut diagnostics = Vec::new();
        let mut chords = Vec::with_capacity(symbols.len());

        for (index, text) in symbols.iter().enumerate() {
            let text = text.as_ref();
            match symbol::parse_chord_symbol(text) {
                Some(chord) => chords.push(chord),
                None => diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::UnrecognizedChordSymbol,
                    index: Some(index),
                    input: text.to_string(),
                    message: format!("unrecognized chord symbol '{text}'; skipped"),
                }),
            }
        }

        let supplied = supplied_key(options, &mut diagnostics);

        let profile = PitchClassProfile::from_weighted(
            chords
                .iter()
                .flat_map(|c| c.pitch_classes().into_iter().map(|pc| (pc, 1.0))),
        );
        let detection = self.analyzer.detect_key(&profile);
        let key_context = supplied.unwrap_or_else(|| detection.most_likely.key());

        let spans = chords
            .iter()
            .enumerate()
            .map(|(slot, chord)| {
                let bass = self.config.chord_symbol_pitch(chord.bass_pitch_class());
                symbol_span(slot as f64, slot as f64 + 1.0, chord, bass, &key_context)
            })
            .collect();

        self.complete(
            detection,
            key_context,
            supplied.is_some(),
            spans,
            &[],
            options,
            diagnostics,
        )
    }

    /// Run the stages downstream of chord labeling.
    ///
    /// Without a supplied key, labelling and modulation detection both start
    /// from the key of the first modulation window, so a piece that opens
    /// outside its overall key is not numbered against the later one.
    #[allow(clippy::too_many_arguments)]
    fn complete(
        &self,
        detection: KeyDetection,
        key_context: Key,
        key_supplied: bool,
        spans: Vec<ChordSpan>,
        notes: &[NoteEvent],
        options: &AnalysisOptions,
        diagnostics: Vec<Diagnostic>,
    ) -> AnalysisResult {
        let mut stream = harmonic_stream(&spans);
        let opening = if key_supplied {
            key_context
        } else {
            self.analyzer.opening_key(&stream).unwrap_or(key_context)
        };
        let modulations = self.analyzer.modulations(&stream, Some(opening));

        let chords: Vec<ChordSpan> = if opening == key_context && modulations.is_empty() {
            spans
        } else {
            debug!(opening = %opening, modulations = modulations.len(), "relabelling");
            stream = stream
                .iter()
                .enumerate()
                .map(|(i, chord)| relabel(chord, &key_at_position(opening, &modulations, i)))
                .collect();
            spans
                .iter()
                .map(|span| relabel(span, &key_at_time(opening, &modulations, span.start_time)))
                .collect()
        };
        let non_chord_tones = self
            .analyzer
            .non_chord_tones(notes, opening, &modulations);

        let numerals: Vec<RomanNumeral> = stream.iter().filter_map(|c| c.roman_numeral).collect();
        let boundaries = options
            .phrase_boundaries
            .clone()
            .unwrap_or_else(|| default_boundaries(numerals.len(), self.config.phrase_length));

        let voice_leading = self.analyzer.voice_leading(&bass_line(&stream));
        let cadences = self.analyzer.cadences(&numerals, &boundaries);
        let form = self
            .analyzer
            .form(&numerals, &boundaries, opening, &modulations);
        let harmonic_rhythm = stream
            .iter()
            .map(|chord| 1.0 / chord.duration().max(0.1))
            .collect();

        info!(
            key = %opening,
            confidence = detection.most_likely.confidence,
            chords = chords.len(),
            cadences = cadences.len(),
            modulations = modulations.len(),
            form = ?form.suggested_form,
            "harmonic analysis complete"
        );

        AnalysisResult {
            key: detection,
            key_context: opening,
            chords,
            voice_leading,
            cadences,
            modulations,
            form,
            harmonic_rhythm,
            non_chord_tones,
            diagnostics,
        }
    }
}

/// Parse the caller's key context, recording a diagnostic when it is unusable.
fn supplied_key(options: &AnalysisOptions, diagnostics: &mut Vec<Diagnostic>) -> Option<Key> {
    let text = options.key.as_deref()?;
    match text.parse::<Key>() {
        Ok(key) => Some(key),
        Err(err) => {
            diagnostics.push(Diagnostic {
                kind: DiagnosticKind::UnrecognizedKeyContext,
                index: None,
                input: text.to_string(),
                message: format!("{err}; using the detected key"),
            });
            None
        }
    }
}
