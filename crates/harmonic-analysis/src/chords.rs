use crate::chord_templates::match_chord;
use crate::symbol::ChordSymbol;
use crate::types::{ChordQuality, ChordSpan, Key, NoteEvent, RomanNumeral, UNCLASSIFIED};

/// Times closer than this are treated as the same instant.
pub const TIME_EPSILON: f64 = 1e-9;

/// A maximal time interval over which the set of sounding pitch classes is constant.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start_time: f64,
    pub end_time: f64,
    /// Ascending, deduplicated
    pub pitch_classes: Vec<u8>,
    /// Lowest MIDI pitch sounding anywhere in the segment
    pub bass_pitch: Option<u8>,
}

/// Partition notes into contiguous segments of constant pitch-class content.
///
/// Sweeps every note start and end in time order. Silent gaps become
/// segments with an empty pitch-class set, so the segments tile the
/// input's full extent from the earliest start to the latest end.
pub fn segment(notes: &[NoteEvent]) -> Vec<Segment> {
    if notes.is_empty() {
        return Vec::new();
    }

    let mut boundaries: Vec<f64> = notes
        .iter()
        .flat_map(|n| [n.start_time, n.end_time()])
        .collect();
    boundaries.sort_by(f64::total_cmp);
    boundaries.dedup_by(|later, earlier| (*later - *earlier).abs() <= TIME_EPSILON);

    let mut by_start: Vec<&NoteEvent> = notes.iter().collect();
    by_start.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    let mut segments: Vec<Segment> = Vec::new();
    let mut active: Vec<&NoteEvent> = Vec::new();
    let mut next = 0;

    for window in boundaries.windows(2) {
        let (start, end) = (window[0], window[1]);

        active.retain(|n| n.end_time() > start + TIME_EPSILON);
        while next < by_start.len() && by_start[next].start_time <= start + TIME_EPSILON {
            if by_start[next].end_time() > start + TIME_EPSILON {
                active.push(by_start[next]);
            }
            next += 1;
        }

        let mask = active.iter().fold(0u16, |mask, n| mask | 1 << n.pitch_class());
        let bass_pitch = active.iter().map(|n| n.pitch).min();

        if let Some(last) = segments.last_mut() {
            if pitch_class_mask(&last.pitch_classes) == mask {
                last.end_time = end;
                last.bass_pitch = match (last.bass_pitch, bass_pitch) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
                continue;
            }
        }

        segments.push(Segment {
            start_time: start,
            end_time: end,
            pitch_classes: mask_to_pitch_classes(mask),
            bass_pitch,
        });
    }

    segments
}

fn pitch_class_mask(pitch_classes: &[u8]) -> u16 {
    pitch_classes.iter().fold(0u16, |mask, pc| mask | 1 << (pc % 12))
}

fn mask_to_pitch_classes(mask: u16) -> Vec<u8> {
    (0..12u8).filter(|pc| mask & (1 << pc) != 0).collect()
}

/// Match a segment against the chord templates and label it in `key`.
pub fn label_segment(segment: &Segment, key: &Key) -> ChordSpan {
    let chord = match_chord(&segment.pitch_classes, segment.bass_pitch.map(|p| p % 12));
    let mut span = unclassified_span(segment.start_time, segment.end_time, key);
    span.pitch_classes = segment.pitch_classes.clone();
    span.bass_pitch = segment.bass_pitch;

    if let Some(chord) = chord {
        span.symbol = chord.symbol(key.uses_flats());
        span.confidence = chord.confidence();
        apply_chord(&mut span, chord.root, chord.quality);
    }
    span
}

/// A span for a parsed chord symbol. No template matching is needed.
pub fn symbol_span(
    start_time: f64,
    end_time: f64,
    chord: &ChordSymbol,
    bass_pitch: u8,
    key: &Key,
) -> ChordSpan {
    let mut span = unclassified_span(start_time, end_time, key);
    span.pitch_classes = chord.pitch_classes();
    span.bass_pitch = Some(bass_pitch);
    span.symbol = chord.name(key.uses_flats());
    span.confidence = 1.0;
    apply_chord(&mut span, chord.root, chord.quality);
    span
}

fn unclassified_span(start_time: f64, end_time: f64, key: &Key) -> ChordSpan {
    ChordSpan {
        start_time,
        end_time,
        pitch_classes: Vec::new(),
        bass_pitch: None,
        root_pitch_class: None,
        quality: None,
        symbol: UNCLASSIFIED.to_string(),
        roman_numeral: None,
        function: None,
        confidence: 0.0,
        key: *key,
    }
}

fn apply_chord(span: &mut ChordSpan, root: u8, quality: ChordQuality) {
    let numeral = RomanNumeral::for_chord(root, quality, &span.key);
    span.root_pitch_class = Some(root);
    span.quality = Some(quality);
    span.roman_numeral = Some(numeral);
    span.function = Some(numeral.function());
}

/// The same span with its Roman numeral and function recomputed in `key`.
pub fn relabel(span: &ChordSpan, key: &Key) -> ChordSpan {
    let mut relabeled = span.clone();
    relabeled.key = *key;
    if let (Some(root), Some(quality)) = (span.root_pitch_class, span.quality) {
        apply_chord(&mut relabeled, root, quality);
    }
    relabeled
}

/// Classified spans with consecutive repeats of the same chord merged.
///
/// This is the chord sequence the voice-leading, cadence, modulation and
/// form stages work on. Unclassified spans and silences are skipped, and a
/// chord that returns after one of them starts a new entry: only spans
/// that directly follow each other in time merge.
pub fn harmonic_stream(spans: &[ChordSpan]) -> Vec<ChordSpan> {
    let mut stream: Vec<ChordSpan> = Vec::new();
    let mut adjacent = false;

    for span in spans {
        if !span.is_classified() {
            adjacent = false;
            continue;
        }
        if let Some(last) = stream.last_mut().filter(|_| adjacent) {
            if last.root_pitch_class == span.root_pitch_class
                && last.quality == span.quality
                && (span.start_time - last.end_time).abs() <= TIME_EPSILON
            {
                last.end_time = span.end_time;
                last.bass_pitch = match (last.bass_pitch, span.bass_pitch) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
                for pc in &span.pitch_classes {
                    if !last.pitch_classes.contains(pc) {
                        last.pitch_classes.push(*pc);
                    }
                }
                last.pitch_classes.sort_unstable();
                continue;
            }
        }
        stream.push(span.clone());
        adjacent = true;
    }

    stream
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HarmonicFunction;
    use pretty_assertions::assert_eq;

    fn make_note(pitch: u8, start: f64, duration: f64) -> NoteEvent {
        NoteEvent {
            pitch,
            start_time: start,
            duration,
        }
    }

    fn block_chord(pitches: &[u8], start: f64, duration: f64) -> Vec<NoteEvent> {
        pitches.iter().map(|&p| make_note(p, start, duration)).collect()
    }

    #[test]
    fn empty_notes_empty_segments() {
        assert!(segment(&[]).is_empty());
    }

    #[test]
    fn block_chords_become_segments() {
        let mut notes = block_chord(&[60, 64, 67], 0.0, 1.0);
        notes.extend(block_chord(&[65, 69, 72], 1.0, 1.0));
        let segments = segment(&notes);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].pitch_classes, vec![0, 4, 7]);
        assert_eq!(segments[0].bass_pitch, Some(60));
        assert_eq!(segments[1].pitch_classes, vec![0, 5, 9]);
        assert_eq!(segments[1].start_time, 1.0);
        assert_eq!(segments[1].end_time, 2.0);
    }

    #[test]
    fn octave_doubling_does_not_split() {
        // C E G held; a high C enters halfway without changing the set
        let mut notes = block_chord(&[48, 64, 67], 0.0, 2.0);
        notes.push(make_note(72, 1.0, 1.0));
        let segments = segment(&notes);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].end_time, 2.0);
    }

    #[test]
    fn gaps_become_empty_segments() {
        let mut notes = block_chord(&[60, 64, 67], 0.0, 1.0);
        notes.extend(block_chord(&[62, 65, 69], 1.5, 1.0));
        let segments = segment(&notes);
        assert_eq!(segments.len(), 3);
        assert!(segments[1].pitch_classes.is_empty());
        assert_eq!(segments[1].bass_pitch, None);
        assert_eq!((segments[1].start_time, segments[1].end_time), (1.0, 1.5));
    }

    #[test]
    fn overlapping_notes_split_at_every_change() {
        let notes = vec![
            make_note(60, 0.0, 2.0),
            make_note(64, 0.5, 2.0),
            make_note(67, 1.0, 0.5),
        ];
        let segments = segment(&notes);
        let sets: Vec<Vec<u8>> = segments.iter().map(|s| s.pitch_classes.clone()).collect();
        assert_eq!(
            sets,
            vec![vec![0], vec![0, 4], vec![0, 4, 7], vec![0, 4], vec![4]]
        );
        assert_eq!(segments.last().unwrap().end_time, 2.5);
    }

    #[test]
    fn labels_against_key() {
        let segments = segment(&block_chord(&[55, 59, 62, 65], 0.0, 1.0));
        let span = label_segment(&segments[0], &Key::major(0));
        assert_eq!(span.symbol, "G7");
        assert_eq!(span.roman_numeral.unwrap().to_string(), "V7");
        assert_eq!(span.function, Some(HarmonicFunction::Dominant));
        assert_eq!(span.confidence, 1.0);
    }

    #[test]
    fn unmatched_sets_are_unclassified() {
        let segments = segment(&block_chord(&[60, 61, 62], 0.0, 1.0));
        let span = label_segment(&segments[0], &Key::major(0));
        assert!(!span.is_classified());
        assert_eq!(span.symbol, UNCLASSIFIED);
        assert_eq!(span.roman_numeral, None);
        assert_eq!(span.confidence, 0.0);
    }

    #[test]
    fn relabel_moves_numeral_to_new_key() {
        let segments = segment(&block_chord(&[62, 66, 69], 0.0, 1.0));
        let span = label_segment(&segments[0], &Key::major(0));
        assert_eq!(span.roman_numeral.unwrap().to_string(), "II");
        let in_g = relabel(&span, &Key::major(7));
        assert_eq!(in_g.roman_numeral.unwrap().to_string(), "V");
        assert_eq!(in_g.key, Key::major(7));
    }

    #[test]
    fn symbol_spans_skip_matching() {
        let chord = crate::symbol::parse_chord_symbol("Dm7").unwrap();
        let span = symbol_span(0.0, 1.0, &chord, 50, &Key::major(0));
        assert_eq!(span.symbol, "Dm7");
        assert_eq!(span.pitch_classes, vec![0, 2, 5, 9]);
        assert_eq!(span.roman_numeral.unwrap().to_string(), "ii7");
        assert_eq!(span.function, Some(HarmonicFunction::Predominant));
    }

    #[test]
    fn stream_merges_repeats_and_skips_unclassified() {
        let key = Key::major(0);
        let mut notes = block_chord(&[60, 64, 67], 0.0, 1.0);
        notes.extend(block_chord(&[48, 64, 67], 1.0, 1.0)); // same pitch classes, new bass
        notes.extend(block_chord(&[60, 61, 62], 2.0, 1.0)); // cluster
        notes.extend(block_chord(&[64, 67, 72], 3.0, 1.0)); // C again
        notes.extend(block_chord(&[55, 59, 62], 4.0, 1.0));
        let spans: Vec<ChordSpan> = segment(&notes).iter().map(|s| label_segment(s, &key)).collect();
        let stream = harmonic_stream(&spans);
        let symbols: Vec<&str> = stream.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["C", "C", "G"]);
        assert_eq!(stream[0].end_time, 2.0);
        assert_eq!(stream[0].bass_pitch, Some(48));
        assert_eq!(stream[1].start_time, 3.0);
        assert_eq!(stream[1].bass_pitch, Some(64));
    }

    #[test]
    fn silence_separates_repeated_chords() {
        let key = Key::major(0);
        let mut notes = block_chord(&[60, 64, 67], 0.0, 1.0);
        notes.extend(block_chord(&[60, 64, 67], 2.0, 1.0));
        notes.extend(block_chord(&[55, 59, 62], 3.0, 1.0));
        notes.extend(block_chord(&[55, 59, 62], 4.0, 1.0));
        let spans: Vec<ChordSpan> = segment(&notes).iter().map(|s| label_segment(s, &key)).collect();
        let stream = harmonic_stream(&spans);
        let bounds: Vec<(&str, f64, f64)> = stream
            .iter()
            .map(|s| (s.symbol.as_str(), s.start_time, s.end_time))
            .collect();
        assert_eq!(bounds, vec![("C", 0.0, 1.0), ("C", 2.0, 3.0), ("G", 3.0, 5.0)]);
    }
}
