use crate::types::ChordQuality;

/// A chord template: quality plus interval set from the root, as a bitmask over 12 pitch classes.
pub struct ChordTemplate {
    pub quality: ChordQuality,
    pub intervals: u16, // bit i set means interval i is in the template
}

impl ChordTemplate {
    const fn new(quality: ChordQuality, intervals: &[u8]) -> Self {
        let mut mask = 0u16;
        let mut i = 0;
        while i < intervals.len() {
            mask |= 1 << intervals[i];
            i += 1;
        }
        Self {
            quality,
            intervals: mask,
        }
    }

    pub fn size(&self) -> u32 {
        self.intervals.count_ones()
    }
}

/// All recognized chord templates, ordered by specificity (earlier wins exact ties).
pub static TEMPLATES: &[ChordTemplate] = &[
    // Seventh and sixth chords
    ChordTemplate::new(ChordQuality::Dominant7, &[0, 4, 7, 10]),
    ChordTemplate::new(ChordQuality::Major7, &[0, 4, 7, 11]),
    ChordTemplate::new(ChordQuality::Minor7, &[0, 3, 7, 10]),
    ChordTemplate::new(ChordQuality::MinorMajor7, &[0, 3, 7, 11]),
    ChordTemplate::new(ChordQuality::Diminished7, &[0, 3, 6, 9]),
    ChordTemplate::new(ChordQuality::HalfDiminished7, &[0, 3, 6, 10]),
    ChordTemplate::new(ChordQuality::Major6, &[0, 4, 7, 9]),
    ChordTemplate::new(ChordQuality::Minor6, &[0, 3, 7, 9]),
    ChordTemplate::new(ChordQuality::Add9, &[0, 2, 4, 7]),
    // Triads
    ChordTemplate::new(ChordQuality::Major, &[0, 4, 7]),
    ChordTemplate::new(ChordQuality::Minor, &[0, 3, 7]),
    ChordTemplate::new(ChordQuality::Diminished, &[0, 3, 6]),
    ChordTemplate::new(ChordQuality::Augmented, &[0, 4, 8]),
    ChordTemplate::new(ChordQuality::Suspended4, &[0, 5, 7]),
    ChordTemplate::new(ChordQuality::Suspended2, &[0, 2, 7]),
    // Dyad
    ChordTemplate::new(ChordQuality::Power, &[0, 7]),
];

const NOTE_NAMES_SHARP: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const NOTE_NAMES_FLAT: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

pub fn note_name(pitch_class: u8, use_flats: bool) -> &'static str {
    let idx = (pitch_class % 12) as usize;
    if use_flats {
        NOTE_NAMES_FLAT[idx]
    } else {
        NOTE_NAMES_SHARP[idx]
    }
}

pub fn template_for(quality: ChordQuality) -> Option<&'static ChordTemplate> {
    TEMPLATES.iter().find(|t| t.quality == quality)
}

/// Pitch classes of `quality` built on `root`, ascending.
pub fn chord_pitch_classes(root: u8, quality: ChordQuality) -> Vec<u8> {
    let Some(template) = template_for(quality) else {
        return Vec::new();
    };
    let mut pcs: Vec<u8> = (0..12u8)
        .filter(|i| template.intervals & (1 << i) != 0)
        .map(|i| (root + i) % 12)
        .collect();
    pcs.sort_unstable();
    pcs
}

/// Convert a set of pitch classes to an interval bitmask relative to a root.
fn to_interval_mask(pitch_classes: &[u8], root: u8) -> u16 {
    let mut mask = 0u16;
    for &pc in pitch_classes {
        let interval = (pc % 12 + 12 - root) % 12;
        mask |= 1 << interval;
    }
    mask
}

/// Best template match for a pitch-class set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChordMatch {
    pub root: u8,
    pub quality: ChordQuality,
    /// Tones present in both the input and the template
    pub shared: u32,
    /// Tones present in exactly one of input and template
    pub symmetric_difference: u32,
}

impl ChordMatch {
    /// `shared / (shared + symmetric_difference)`, 1.0 for an exact match.
    pub fn confidence(&self) -> f64 {
        self.shared as f64 / (self.shared + self.symmetric_difference) as f64
    }

    pub fn symbol(&self, use_flats: bool) -> String {
        format!("{}{}", note_name(self.root, use_flats), self.quality.suffix())
    }
}

/// Match a set of pitch classes against every template under all 12 transpositions.
///
/// The best candidate has the smallest symmetric difference, then the most
/// shared tones, then a root equal to `bass_pitch_class`. Remaining ties keep
/// the first candidate found (lowest root, then template order). A candidate
/// only counts if it shares at least two tones and shares more than it misses.
pub fn match_chord(pitch_classes: &[u8], bass_pitch_class: Option<u8>) -> Option<ChordMatch> {
    if pitch_classes.len() < 2 {
        return None;
    }

    let bass = bass_pitch_class.map(|b| b % 12);
    let mut best: Option<(ChordMatch, bool)> = None;

    for root in 0..12u8 {
        let intervals = to_interval_mask(pitch_classes, root);

        for template in TEMPLATES {
            let shared = (intervals & template.intervals).count_ones();
            let symmetric_difference = (intervals ^ template.intervals).count_ones();
            if shared < 2 || shared <= symmetric_difference {
                continue;
            }

            let on_bass = bass == Some(root);
            let candidate = ChordMatch {
                root,
                quality: template.quality,
                shared,
                symmetric_difference,
            };

            let better = match &best {
                None => true,
                Some((current, current_on_bass)) => {
                    (candidate.symmetric_difference, std::cmp::Reverse(candidate.shared), !on_bass)
                        < (
                            current.symmetric_difference,
                            std::cmp::Reverse(current.shared),
                            !current_on_bass,
                        )
                }
            };

            if better {
                best = Some((candidate, on_bass));
            }
        }
    }

    best.map(|(m, _)| m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_major_triad() {
        let result = match_chord(&[0, 4, 7], None).unwrap();
        assert_eq!(result.root, 0);
        assert_eq!(result.symbol(false), "C");
        assert_eq!(result.quality, ChordQuality::Major);
        assert_eq!(result.confidence(), 1.0);
    }

    #[test]
    fn d_minor_triad() {
        let result = match_chord(&[2, 5, 9], None).unwrap();
        assert_eq!(result.root, 2);
        assert_eq!(result.symbol(false), "Dm");
        assert_eq!(result.quality, ChordQuality::Minor);
    }

    #[test]
    fn g_dominant_7th() {
        let result = match_chord(&[7, 11, 2, 5], None).unwrap();
        assert_eq!(result.root, 7);
        assert_eq!(result.symbol(false), "G7");
        assert_eq!(result.quality, ChordQuality::Dominant7);
    }

    #[test]
    fn bass_breaks_inversion_ties() {
        // C E G A is both C6 and Am7
        let without_bass = match_chord(&[0, 4, 7, 9], None).unwrap();
        assert_eq!(without_bass.root, 0);
        assert_eq!(without_bass.quality, ChordQuality::Major6);

        let on_a = match_chord(&[0, 4, 7, 9], Some(9)).unwrap();
        assert_eq!(on_a.root, 9);
        assert_eq!(on_a.quality, ChordQuality::Minor7);
    }

    #[test]
    fn incomplete_chord_scores_partial_confidence() {
        // C E G Bb D: dominant 7th plus an extra ninth
        let result = match_chord(&[0, 2, 4, 7, 10], None).unwrap();
        assert_eq!(result.quality, ChordQuality::Dominant7);
        assert_eq!(result.root, 0);
        assert_eq!(result.confidence(), 0.8);
    }

    #[test]
    fn flat_spelling() {
        let result = match_chord(&[1, 5, 8], None).unwrap();
        assert_eq!(result.symbol(true), "Db");
    }

    #[test]
    fn single_note_no_match() {
        assert!(match_chord(&[0], None).is_none());
        assert!(match_chord(&[], None).is_none());
    }

    #[test]
    fn cluster_no_match() {
        assert!(match_chord(&[0, 1, 2, 3, 4, 5], None).is_none());
    }

    #[test]
    fn power_chord() {
        let result = match_chord(&[0, 7], None).unwrap();
        assert_eq!(result.symbol(false), "C5");
        assert_eq!(result.quality, ChordQuality::Power);
    }

    #[test]
    fn reverse_lookup() {
        assert_eq!(chord_pitch_classes(7, ChordQuality::Dominant7), vec![2, 5, 7, 11]);
        assert_eq!(chord_pitch_classes(9, ChordQuality::Minor), vec![0, 4, 9]);
    }
}
