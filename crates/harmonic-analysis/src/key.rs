use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use winnow::combinator::{alt, opt};
use winnow::prelude::*;
use winnow::token::one_of;

use crate::chord_templates::note_name;
use crate::profile::PitchClassProfile;
use crate::types::{ChordQuality, Key, KeyCandidate, KeyDetection, KeyMode, KeyRelationship, NoteEvent};
use crate::Error;

type PResult<T> = winnow::ModalResult<T>;

/// Krumhansl-Kessler major key profile (duration-weighted perception studies).
const MAJOR_PROFILE: [f64; 12] = [6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88];

/// Krumhansl-Kessler minor key profile.
const MINOR_PROFILE: [f64; 12] = [6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17];

/// Signed accidental count of each major key by root pitch class
/// (positive = sharps, negative = flats). Gb is preferred over F#.
const MAJOR_ACCIDENTALS: [i8; 12] = [0, -5, 2, -3, 4, -1, -6, 1, -4, 3, -2, 5];

const MAJOR_SCALE: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];
const NATURAL_MINOR_SCALE: [u8; 7] = [0, 2, 3, 5, 7, 8, 10];

/// Key-signature facts for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySignature {
    /// Positive = sharps, negative = flats
    pub accidentals: i8,
    pub uses_flats: bool,
    /// Scale pitch classes starting from the tonic
    pub diatonic_pitch_classes: Vec<u8>,
}

impl Key {
    pub fn new(root_pitch_class: u8, mode: KeyMode) -> Self {
        Key {
            root_pitch_class: root_pitch_class % 12,
            mode,
        }
    }

    pub fn major(root_pitch_class: u8) -> Self {
        Self::new(root_pitch_class, KeyMode::Major)
    }

    pub fn minor(root_pitch_class: u8) -> Self {
        Self::new(root_pitch_class, KeyMode::Minor)
    }

    pub fn accidentals(&self) -> i8 {
        match self.mode {
            KeyMode::Major => MAJOR_ACCIDENTALS[self.root_pitch_class as usize % 12],
            // Same signature as the relative major, a minor third up
            KeyMode::Minor => MAJOR_ACCIDENTALS[(self.root_pitch_class as usize + 3) % 12],
        }
    }

    pub fn uses_flats(&self) -> bool {
        self.accidentals() < 0
    }

    pub fn signature(&self) -> KeySignature {
        let scale = match self.mode {
            KeyMode::Major => &MAJOR_SCALE,
            KeyMode::Minor => &NATURAL_MINOR_SCALE,
        };
        KeySignature {
            accidentals: self.accidentals(),
            uses_flats: self.uses_flats(),
            diatonic_pitch_classes: scale
                .iter()
                .map(|step| (self.root_pitch_class + step) % 12)
                .collect(),
        }
    }

    pub fn root_name(&self) -> &'static str {
        note_name(self.root_pitch_class, self.uses_flats())
    }

    /// Conventional key name: "C", "Bb", "F#m".
    pub fn name(&self) -> String {
        match self.mode {
            KeyMode::Major => self.root_name().to_string(),
            KeyMode::Minor => format!("{}m", self.root_name()),
        }
    }

    pub fn relative(&self) -> Key {
        match self.mode {
            KeyMode::Major => Key::minor((self.root_pitch_class + 9) % 12),
            KeyMode::Minor => Key::major((self.root_pitch_class + 3) % 12),
        }
    }

    pub fn parallel(&self) -> Key {
        match self.mode {
            KeyMode::Major => Key::minor(self.root_pitch_class),
            KeyMode::Minor => Key::major(self.root_pitch_class),
        }
    }

    /// Steps between the two key signatures around the circle of fifths.
    pub fn fifths_distance(&self, other: &Key) -> u8 {
        let d = (self.accidentals() - other.accidentals()).unsigned_abs() % 12;
        d.min(12 - d)
    }

    pub fn relationship(&self, other: &Key) -> KeyRelationship {
        if self == other {
            return KeyRelationship::Same;
        }
        if self.root_pitch_class == other.root_pitch_class {
            return KeyRelationship::Parallel;
        }
        match self.fifths_distance(other) {
            0 => KeyRelationship::Relative,
            1 => KeyRelationship::CloselyRelated,
            2..=3 => KeyRelationship::ModeratelyRelated,
            _ if self.is_third_apart(other) => KeyRelationship::ChromaticMediant,
            _ => KeyRelationship::Distant,
        }
    }

    /// Tonics a major or minor third apart, in either direction.
    fn is_third_apart(&self, other: &Key) -> bool {
        let interval = (other.root_pitch_class + 12 - self.root_pitch_class) % 12;
        matches!(interval, 3 | 4 | 8 | 9)
    }

    /// Triads stacked in thirds on each scale degree, as (root, quality).
    pub fn diatonic_triads(&self) -> Vec<(u8, ChordQuality)> {
        let scale = self.signature().diatonic_pitch_classes;
        (0..scale.len())
            .map(|degree| {
                let root = scale[degree];
                let third = (scale[(degree + 2) % 7] + 12 - root) % 12;
                let fifth = (scale[(degree + 4) % 7] + 12 - root) % 12;
                let quality = match (third, fifth) {
                    (4, 7) => ChordQuality::Major,
                    (3, 7) => ChordQuality::Minor,
                    (3, 6) => ChordQuality::Diminished,
                    _ => ChordQuality::Augmented,
                };
                (root, quality)
            })
            .collect()
    }

    /// Scale pitch classes shared with `other`, ascending.
    pub fn common_tones(&self, other: &Key) -> Vec<u8> {
        let theirs = other.signature().diatonic_pitch_classes;
        let mut shared: Vec<u8> = self
            .signature()
            .diatonic_pitch_classes
            .into_iter()
            .filter(|pc| theirs.contains(pc))
            .collect();
        shared.sort_unstable();
        shared
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.name()
    }
}

impl TryFrom<String> for Key {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for Key {
    type Err = Error;

    /// Parse a key context such as "C", "Am", "F#", "Bb minor", "ebm".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_key(s).ok_or_else(|| Error::UnrecognizedKey(s.to_string()))
    }
}

fn parse_key(text: &str) -> Option<Key> {
    let mut input = text.trim();
    let root = pitch_class.parse_next(&mut input).ok()?;

    let mode = match input.trim() {
        "" | "M" => KeyMode::Major,
        "m" | "-" => KeyMode::Minor,
        other => match other.to_ascii_lowercase().as_str() {
            "maj" | "major" => KeyMode::Major,
            "min" | "minor" => KeyMode::Minor,
            _ => return None,
        },
    };

    Some(Key::new(root, mode))
}

/// Note letter (either case) with optional sharp/flat, as a pitch class.
pub(crate) fn pitch_class(input: &mut &str) -> PResult<u8> {
    (note_letter, opt(accidental))
        .map(|(letter, accidental)| (letter as i8 + accidental.unwrap_or(0)).rem_euclid(12) as u8)
        .parse_next(input)
}

fn note_letter(input: &mut &str) -> PResult<u8> {
    one_of(['C', 'D', 'E', 'F', 'G', 'A', 'B', 'c', 'd', 'e', 'f', 'g', 'a', 'b'])
        .map(|c: char| match c.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            _ => 11,
        })
        .parse_next(input)
}

fn accidental(input: &mut &str) -> PResult<i8> {
    alt(('#'.value(1), '♯'.value(1), 'b'.value(-1), '♭'.value(-1))).parse_next(input)
}

/// Rank all 24 major/minor keys against a pitch-class profile.
///
/// Uses the Krumhansl-Schmuckler algorithm: the profile is rotated so each
/// candidate root sits at index 0, then Pearson-correlated with the major
/// and minor templates. Confidence is the correlation mapped from [-1, 1]
/// onto [0, 1]. Ties prefer major over minor, then the lower root.
///
/// Profiles with fewer than two distinct pitch classes (or no variation
/// at all) are underdetermined and rank nothing.
pub fn rank_keys(profile: &PitchClassProfile) -> Vec<KeyCandidate> {
    if is_underdetermined(profile) {
        return Vec::new();
    }

    // Pearson correlation is scale-invariant, so raw weights are used directly.
    let histogram = profile.weights();
    let mut scored: Vec<(f64, Key)> = Vec::with_capacity(24);

    for root in 0..12u8 {
        let mut rotated = [0.0; 12];
        for (i, slot) in rotated.iter_mut().enumerate() {
            *slot = histogram[(i + root as usize) % 12];
        }

        scored.push((pearson(&rotated, &MAJOR_PROFILE), Key::major(root)));
        scored.push((pearson(&rotated, &MINOR_PROFILE), Key::minor(root)));
    }

    scored.sort_by(|(score_a, key_a), (score_b, key_b)| {
        score_b
            .total_cmp(score_a)
            .then(key_a.mode.cmp(&key_b.mode))
            .then(key_a.root_pitch_class.cmp(&key_b.root_pitch_class))
    });

    scored
        .into_iter()
        .map(|(score, key)| candidate(key, correlation_confidence(score)))
        .collect()
}

/// Most likely key plus up to `alternatives` runners-up.
///
/// Underdetermined input yields C major with confidence 0.0 and no alternatives.
pub fn detect_key(profile: &PitchClassProfile, alternatives: usize) -> KeyDetection {
    let mut ranked = rank_keys(profile).into_iter();
    match ranked.next() {
        Some(most_likely) => KeyDetection {
            most_likely,
            alternatives: ranked.take(alternatives).collect(),
        },
        None => KeyDetection::default(),
    }
}

/// Profile `notes` by duration and detect their key.
pub fn detect_key_from_notes(notes: &[NoteEvent], alternatives: usize) -> KeyDetection {
    detect_key(&PitchClassProfile::from_notes(notes), alternatives)
}

pub fn candidate(key: Key, confidence: f64) -> KeyCandidate {
    KeyCandidate {
        root: key.root_name().to_string(),
        root_pitch_class: key.root_pitch_class,
        mode: key.mode,
        confidence,
    }
}

fn is_underdetermined(profile: &PitchClassProfile) -> bool {
    if profile.distinct_pitch_classes() < 2 {
        return true;
    }
    let weights = profile.weights();
    let max = weights.iter().cloned().fold(f64::MIN, f64::max);
    let min = weights.iter().cloned().fold(f64::MAX, f64::min);
    max - min <= max.abs() * 1e-12
}

fn correlation_confidence(r: f64) -> f64 {
    let confidence = ((r + 1.0) / 2.0).clamp(0.0, 1.0);
    (confidence * 10000.0).round() / 10000.0
}

/// Pearson correlation coefficient between two 12-element arrays.
fn pearson(x: &[f64; 12], y: &[f64; 12]) -> f64 {
    let x_mean: f64 = x.iter().sum::<f64>() / 12.0;
    let y_mean: f64 = y.iter().sum::<f64>() / 12.0;

    let mut num = 0.0;
    let mut x_sq = 0.0;
    let mut y_sq = 0.0;

    for i in 0..12 {
        let xd = x[i] - x_mean;
        let yd = y[i] - y_mean;
        num += xd * yd;
        x_sq += xd * xd;
        y_sq += yd * yd;
    }

    let denom = (x_sq * y_sq).sqrt();
    if denom < 1e-10 {
        return 0.0;
    }
    num / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale_notes(pitches: &[u8]) -> Vec<NoteEvent> {
        pitches
            .iter()
            .enumerate()
            .map(|(i, &pitch)| NoteEvent {
                pitch,
                start_time: i as f64 * 0.5,
                duration: 0.5,
            })
            .collect()
    }

    #[test]
    fn empty_notes_returns_c_major() {
        let result = detect_key_from_notes(&[], 5);
        assert_eq!(result.most_likely.root, "C");
        assert_eq!(result.most_likely.mode, KeyMode::Major);
        assert_eq!(result.most_likely.confidence, 0.0);
        assert!(result.alternatives.is_empty());
    }

    #[test]
    fn single_pitch_class_is_underdetermined() {
        let result = detect_key_from_notes(&scale_notes(&[62, 74, 50]), 5);
        assert_eq!(result, KeyDetection::default());
    }

    #[test]
    fn chromatic_cluster_is_underdetermined() {
        let pitches: Vec<u8> = (60..72).collect();
        let result = detect_key_from_notes(&scale_notes(&pitches), 5);
        assert!(result.is_degenerate());
    }

    #[test]
    fn c_major_scale_detected() {
        let result = detect_key_from_notes(&scale_notes(&[60, 62, 64, 65, 67, 69, 71, 72]), 5);
        assert_eq!(result.most_likely.root, "C");
        assert_eq!(result.most_likely.mode, KeyMode::Major);
        assert!(
            result.most_likely.confidence > 0.85,
            "confidence {} should be > 0.85",
            result.most_likely.confidence
        );
        assert_eq!(result.alternatives.len(), 5);
    }

    #[test]
    fn ranking_is_descending_and_bounded() {
        let ranked = rank_keys(&PitchClassProfile::from_notes(&scale_notes(&[
            57, 59, 60, 62, 64, 65, 67, 69,
        ])));
        assert_eq!(ranked.len(), 24);
        for pair in ranked.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        assert!(ranked.iter().all(|c| (0.0..=1.0).contains(&c.confidence)));
    }

    #[test]
    fn flat_key_spelling() {
        // Db major scale: Db Eb F Gb Ab Bb C
        let result = detect_key_from_notes(&scale_notes(&[61, 63, 65, 66, 68, 70, 72, 61]), 0);
        assert_eq!(result.most_likely.root_pitch_class, 1);
        assert_eq!(result.most_likely.root, "Db");
    }

    #[test]
    fn pearson_identical_arrays() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0];
        let r = pearson(&a, &a);
        assert!((r - 1.0).abs() < 1e-10, "self-correlation should be 1.0, got {}", r);
    }

    #[test]
    fn parses_key_contexts() {
        assert_eq!("C".parse::<Key>().unwrap(), Key::major(0));
        assert_eq!("Am".parse::<Key>().unwrap(), Key::minor(9));
        assert_eq!("F#".parse::<Key>().unwrap(), Key::major(6));
        assert_eq!("Bb".parse::<Key>().unwrap(), Key::major(10));
        assert_eq!("ebm".parse::<Key>().unwrap(), Key::minor(3));
        assert_eq!("G minor".parse::<Key>().unwrap(), Key::minor(7));
        assert_eq!(" D major ".parse::<Key>().unwrap(), Key::major(2));
        assert_eq!("Cb".parse::<Key>().unwrap(), Key::major(11));
        assert!("H".parse::<Key>().is_err());
        assert!("C dorian".parse::<Key>().is_err());
        assert!("".parse::<Key>().is_err());
    }

    #[test]
    fn key_names_follow_signature_spelling() {
        assert_eq!(Key::major(10).name(), "Bb");
        assert_eq!(Key::minor(6).name(), "F#m");
        assert_eq!(Key::minor(3).name(), "Ebm");
        assert_eq!(Key::minor(8).name(), "G#m");
        assert_eq!(Key::major(6).name(), "Gb");
    }

    #[test]
    fn signatures() {
        let g = Key::major(7).signature();
        assert_eq!(g.accidentals, 1);
        assert_eq!(g.diatonic_pitch_classes, vec![7, 9, 11, 0, 2, 4, 6]);

        let dm = Key::minor(2).signature();
        assert_eq!(dm.accidentals, -1);
        assert!(dm.uses_flats);
        assert_eq!(dm.diatonic_pitch_classes, vec![2, 4, 5, 7, 9, 10, 0]);
    }

    #[test]
    fn diatonic_triads_and_common_tones() {
        let triads = Key::major(0).diatonic_triads();
        assert_eq!(triads[0], (0, ChordQuality::Major));
        assert_eq!(triads[1], (2, ChordQuality::Minor));
        assert_eq!(triads[6], (11, ChordQuality::Diminished));

        let am = Key::minor(9).diatonic_triads();
        assert_eq!(am[0], (9, ChordQuality::Minor));
        assert_eq!(am[2], (0, ChordQuality::Major));

        assert_eq!(Key::major(0).common_tones(&Key::major(7)), vec![0, 2, 4, 7, 9, 11]);
        assert_eq!(Key::major(0).common_tones(&Key::minor(9)).len(), 7);
        assert_eq!(Key::major(0).common_tones(&Key::major(6)), vec![5, 11]);
    }

    #[test]
    fn relationships() {
        let c = Key::major(0);
        assert_eq!(c.relationship(&c), KeyRelationship::Same);
        assert_eq!(c.relationship(&Key::minor(9)), KeyRelationship::Relative);
        assert_eq!(c.relationship(&Key::minor(0)), KeyRelationship::Parallel);
        assert_eq!(c.relationship(&Key::major(7)), KeyRelationship::CloselyRelated);
        assert_eq!(c.relationship(&Key::major(9)), KeyRelationship::ModeratelyRelated);
        assert_eq!(c.relationship(&Key::major(6)), KeyRelationship::Distant);
        assert_eq!(Key::major(6).relationship(&Key::major(11)), KeyRelationship::CloselyRelated);
        assert_eq!(c.relationship(&Key::major(4)), KeyRelationship::ChromaticMediant);
        assert_eq!(c.relationship(&Key::major(8)), KeyRelationship::ChromaticMediant);
        // A major is only three steps away, so it stays moderately related
        assert_eq!(c.relationship(&Key::major(9)), KeyRelationship::ModeratelyRelated);
        assert_eq!(c.relative(), Key::minor(9));
        assert_eq!(Key::minor(9).relative(), c);
        assert_eq!(c.parallel(), Key::minor(0));
    }

    #[test]
    fn key_serializes_as_name() {
        let json = serde_json::to_string(&Key::minor(6)).unwrap();
        assert_eq!(json, "\"F#m\"");
        let back: Key = serde_json::from_str("\"Bb\"").unwrap();
        assert_eq!(back, Key::major(10));
    }
}
