use tracing::debug;

use crate::chord_templates::note_name;
use crate::chords::TIME_EPSILON;
use crate::config::AnalysisConfig;
use crate::key::detect_key;
use crate::profile::PitchClassProfile;
use crate::types::{ChordSpan, Key, KeyDetection, ModulationEvent, PivotChord, RomanNumeral};

/// Consecutive windows agreeing on a key that differs from the established one.
#[derive(Debug, Default)]
struct Debounce {
    candidate: Option<Key>,
    streak: usize,
    confidence_sum: f64,
    /// Stream index where the candidate key first took hold
    onset: usize,
}

impl Debounce {
    fn reset(&mut self) {
        *self = Debounce::default();
    }

    fn observe(&mut self, key: Key, confidence: f64, onset: usize) {
        if self.candidate != Some(key) {
            *self = Debounce {
                candidate: Some(key),
                streak: 0,
                confidence_sum: 0.0,
                onset,
            };
        }
        self.streak += 1;
        self.confidence_sum += confidence;
    }

    fn mean_confidence(&self) -> f64 {
        if self.streak == 0 {
            return 0.0;
        }
        self.confidence_sum / self.streak as f64
    }
}

fn window_detections<'a>(
    stream: &'a [ChordSpan],
    window: usize,
) -> impl Iterator<Item = (usize, KeyDetection)> + 'a {
    (window..=stream.len()).map(move |end| {
        let start = end - window;
        let detection = detect_key(&PitchClassProfile::from_chords(&stream[start..end]), 0);
        (start, detection)
    })
}

/// Key of the first window with a determinate key, if the stream fills one.
///
/// This is the key the modulation detector starts from when no key is
/// supplied, so labelling the opening chords in it keeps numerals and
/// modulation events in agreement.
pub fn opening_key(stream: &[ChordSpan], config: &AnalysisConfig) -> Option<Key> {
    window_detections(stream, config.modulation_window.max(2))
        .find(|(_, detection)| !detection.is_degenerate())
        .map(|(_, detection)| detection.most_likely.key())
}

/// Find sustained key changes in a harmonic stream.
///
/// Slides a window of `modulation_window` chords across the stream and
/// detects each window's key. A change is reported once
/// `modulation_debounce` consecutive windows agree on the same new key with
/// confidence at or above `modulation_confidence`. The new key takes effect
/// at the middle of the first agreeing window.
///
/// The established key starts as `initial_key`, or the first window's key
/// when none is supplied.
pub fn detect_modulations(
    stream: &[ChordSpan],
    initial_key: Option<Key>,
    config: &AnalysisConfig,
) -> Vec<ModulationEvent> {
    let window = config.modulation_window.max(2);
    let required = config.modulation_debounce.max(1);
    if stream.len() < window {
        return Vec::new();
    }

    let mut established = initial_key;
    let mut debounce = Debounce::default();
    let mut events = Vec::new();

    for (start, detection) in window_detections(stream, window) {
        if detection.is_degenerate() {
            debounce.reset();
            continue;
        }

        let window_key = detection.most_likely.key();
        let confidence = detection.most_likely.confidence;
        let current = *established.get_or_insert(window_key);

        if window_key == current || confidence < config.modulation_confidence {
            debounce.reset();
            continue;
        }

        debounce.observe(window_key, confidence, start + window / 2);
        if debounce.streak < required {
            continue;
        }

        let position = debounce.onset;
        let event = ModulationEvent {
            from_key: current,
            to_key: window_key,
            approx_time: stream[position].start_time,
            position,
            confidence: debounce.mean_confidence(),
            relationship: current.relationship(&window_key),
            pivot_chords: pivot_chords(&current, &window_key),
            common_tones: current.common_tones(&window_key),
        };
        debug!(
            from = %event.from_key,
            to = %event.to_key,
            position,
            confidence = event.confidence,
            pivots = event.pivot_chords.len(),
            "modulation"
        );
        events.push(event);
        established = Some(window_key);
        debounce.reset();
    }

    events
}

/// Diatonic triads of `from` that are also diatonic in `to`.
pub fn pivot_chords(from: &Key, to: &Key) -> Vec<PivotChord> {
    let theirs = to.diatonic_triads();
    from.diatonic_triads()
        .into_iter()
        .filter(|triad| theirs.contains(triad))
        .map(|(root, quality)| PivotChord {
            symbol: format!("{}{}", note_name(root, to.uses_flats()), quality.suffix()),
            from_numeral: RomanNumeral::for_chord(root, quality, from),
            to_numeral: RomanNumeral::for_chord(root, quality, to),
        })
        .collect()
}

/// Key in effect at harmonic-stream index `position`.
pub fn key_at_position(initial_key: Key, events: &[ModulationEvent], position: usize) -> Key {
    events
        .iter()
        .take_while(|e| e.position <= position)
        .last()
        .map_or(initial_key, |e| e.to_key)
}

/// Key in effect at `time`.
pub fn key_at_time(initial_key: Key, events: &[ModulationEvent], time: f64) -> Key {
    events
        .iter()
        .take_while(|e| e.approx_time <= time + TIME_EPSILON)
        .last()
        .map_or(initial_key, |e| e.to_key)
}
