use crate::chord_templates::{chord_pitch_classes, match_chord};
use crate::chords::TIME_EPSILON;
use crate::modulation::key_at_time;
use crate::types::{Key, ModulationEvent, NonChordTone, NonChordToneKind, NoteEvent};

/// Notes that embellish the harmony sounding under them.
///
/// A note is examined when another note sounding at its onset started
/// earlier or keeps sounding after it ends. Notes struck and released
/// together with the whole harmony belong to the chord. The other notes
/// sounding at the onset are matched against the chord templates, and a
/// note whose pitch class lies outside the matched chord is reported.
///
/// Results are ordered by onset, then pitch.
pub fn find_non_chord_tones(
    notes: &[NoteEvent],
    key: Key,
    modulations: &[ModulationEvent],
) -> Vec<NonChordTone> {
    let mut ordered: Vec<&NoteEvent> = notes.iter().collect();
    ordered.sort_by(|a, b| {
        a.start_time
            .total_cmp(&b.start_time)
            .then(a.pitch.cmp(&b.pitch))
    });

    let mut found = Vec::new();
    for (index, note) in ordered.iter().enumerate() {
        let onset = note.start_time;
        let under: Vec<&NoteEvent> = ordered
            .iter()
            .enumerate()
            .take_while(|(_, other)| other.start_time <= onset + TIME_EPSILON)
            .filter(|(j, other)| *j != index && other.end_time() > onset + TIME_EPSILON)
            .map(|(_, other)| *other)
            .collect();

        let embellishing = under.iter().any(|other| {
            other.start_time < onset - TIME_EPSILON
                || other.end_time() > note.end_time() + TIME_EPSILON
        });
        if !embellishing {
            continue;
        }

        let mask = under.iter().fold(0u16, |mask, n| mask | 1 << n.pitch_class());
        let pitch_classes: Vec<u8> = (0..12u8).filter(|pc| mask & (1 << pc) != 0).collect();
        let bass = under.iter().map(|n| n.pitch).min().map(|p| p % 12);
        let Some(chord) = match_chord(&pitch_classes, bass) else {
            continue;
        };
        if chord_pitch_classes(chord.root, chord.quality).contains(&note.pitch_class()) {
            continue;
        }

        let use_flats = key_at_time(key, modulations, onset).uses_flats();
        found.push(NonChordTone {
            pitch: note.pitch,
            time: onset,
            kind: classify(note, &ordered, index),
            chord: chord.symbol(use_flats),
        });
    }

    found
}

/// Passing or neighbor motion through the note's own line.
///
/// The line is followed by pitch proximity: the previous note is the one
/// released last before the onset, the next is the first struck after the
/// release, ties going to the nearest pitch.
fn classify(note: &NoteEvent, ordered: &[&NoteEvent], index: usize) -> NonChordToneKind {
    let previous = ordered
        .iter()
        .enumerate()
        .filter(|(j, other)| *j != index && other.end_time() <= note.start_time + TIME_EPSILON)
        .map(|(_, other)| *other)
        .max_by(|a, b| {
            a.end_time()
                .total_cmp(&b.end_time())
                .then(distance(b, note).cmp(&distance(a, note)))
        });
    let next = ordered
        .iter()
        .enumerate()
        .filter(|(j, other)| *j != index && other.start_time >= note.end_time() - TIME_EPSILON)
        .map(|(_, other)| *other)
        .min_by(|a, b| {
            a.start_time
                .total_cmp(&b.start_time)
                .then(distance(a, note).cmp(&distance(b, note)))
        });

    let (Some(previous), Some(next)) = (previous, next) else {
        return NonChordToneKind::Other;
    };

    let approach = note.pitch as i16 - previous.pitch as i16;
    let departure = next.pitch as i16 - note.pitch as i16;
    let is_step = |interval: i16| (1..=2).contains(&interval.abs());

    if !is_step(approach) || !is_step(departure) {
        NonChordToneKind::Other
    } else if approach.signum() == departure.signum() {
        NonChordToneKind::PassingTone
    } else if previous.pitch == next.pitch {
        NonChordToneKind::NeighborTone
    } else {
        NonChordToneKind::Other
    }
}

fn distance(a: &NoteEvent, b: &NoteEvent) -> u8 {
    a.pitch.abs_diff(b.pitch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn make_note(pitch: u8, start: f64, duration: f64) -> NoteEvent {
        NoteEvent {
            pitch,
            start_time: start,
            duration,
        }
    }

    /// C major held under a one-beat-per-note melody.
    fn over_c_major(melody: &[u8]) -> Vec<NoteEvent> {
        let length = melody.len() as f64;
        let mut notes: Vec<NoteEvent> = [48, 52, 55]
            .iter()
            .map(|&p| make_note(p, 0.0, length))
            .collect();
        notes.extend(
            melody
                .iter()
                .enumerate()
                .map(|(i, &p)| make_note(p, i as f64, 1.0)),
        );
        notes
    }

    fn kinds(notes: &[NoteEvent]) -> Vec<(u8, NonChordToneKind)> {
        find_non_chord_tones(notes, Key::major(0), &[])
            .into_iter()
            .map(|t| (t.pitch, t.kind))
            .collect()
    }

    #[test]
    fn stepwise_through_is_passing() {
        let found = find_non_chord_tones(&over_c_major(&[72, 74, 76]), Key::major(0), &[]);
        assert_eq!(
            found,
            vec![NonChordTone {
                pitch: 74,
                time: 1.0,
                kind: NonChordToneKind::PassingTone,
                chord: "C".to_string(),
            }]
        );
    }

    #[test]
    fn step_and_return_is_neighbor() {
        assert_eq!(
            kinds(&over_c_major(&[72, 74, 72])),
            vec![(74, NonChordToneKind::NeighborTone)]
        );
        assert_eq!(
            kinds(&over_c_major(&[67, 65, 67])),
            vec![(65, NonChordToneKind::NeighborTone)]
        );
    }

    #[test]
    fn leap_into_dissonance_is_other() {
        assert_eq!(
            kinds(&over_c_major(&[72, 77, 76])),
            vec![(77, NonChordToneKind::Other)]
        );
    }

    #[test]
    fn chord_tones_are_not_reported() {
        assert!(kinds(&over_c_major(&[72, 76, 79, 72])).is_empty());
    }

    #[test]
    fn block_chords_have_no_embellishments() {
        let notes: Vec<NoteEvent> = [48, 52, 55, 58, 62]
            .iter()
            .map(|&p| make_note(p, 0.0, 1.0))
            .collect();
        assert!(kinds(&notes).is_empty());
        assert!(kinds(&[]).is_empty());
    }

    #[test]
    fn unharmonized_notes_are_skipped() {
        let notes = vec![make_note(60, 0.0, 1.0), make_note(62, 1.0, 1.0)];
        assert!(kinds(&notes).is_empty());
    }
}
