use crate::types::{CadencePoint, CadenceType, ChordQuality, RomanNumeral};

/// Phrase ends every `phrase_length` chords, plus the end of the stream.
pub fn default_boundaries(len: usize, phrase_length: usize) -> Vec<usize> {
    let step = phrase_length.max(1);
    let mut boundaries: Vec<usize> = (1..=len / step).map(|i| i * step).collect();
    if len > 0 && boundaries.last() != Some(&len) {
        boundaries.push(len);
    }
    boundaries
}

/// Keep boundaries that close at least two chords, ascending and unique.
pub fn sanitize_boundaries(boundaries: &[usize], len: usize) -> Vec<usize> {
    let mut kept: Vec<usize> = boundaries
        .iter()
        .copied()
        .filter(|b| *b >= 2 && *b <= len)
        .collect();
    kept.sort_unstable();
    kept.dedup();
    kept
}

fn is_dominant(numeral: &RomanNumeral) -> bool {
    numeral.degree == 5
        && numeral.is_diatonic()
        && matches!(numeral.quality, ChordQuality::Major | ChordQuality::Dominant7)
}

fn is_tonic(numeral: &RomanNumeral) -> bool {
    numeral.degree == 1
        && numeral.is_diatonic()
        && matches!(
            numeral.quality,
            ChordQuality::Major
                | ChordQuality::Minor
                | ChordQuality::Major7
                | ChordQuality::Minor7
                | ChordQuality::MinorMajor7
                | ChordQuality::Major6
                | ChordQuality::Minor6
                | ChordQuality::Add9
                | ChordQuality::Power
        )
}

fn is_submediant(numeral: &RomanNumeral) -> bool {
    numeral.degree == 6
        && numeral.is_diatonic()
        && matches!(
            numeral.quality,
            ChordQuality::Major | ChordQuality::Minor | ChordQuality::Minor7 | ChordQuality::Major7
        )
}

fn is_subdominant(numeral: &RomanNumeral) -> bool {
    numeral.degree == 4
        && numeral.is_diatonic()
        && matches!(
            numeral.quality,
            ChordQuality::Major
                | ChordQuality::Minor
                | ChordQuality::Major7
                | ChordQuality::Minor7
                | ChordQuality::Major6
                | ChordQuality::Minor6
                | ChordQuality::Add9
        )
}

/// Classify a two-chord progression. Rules are tried in priority order.
pub fn classify_cadence(from: &RomanNumeral, to: &RomanNumeral) -> Option<CadenceType> {
    if is_dominant(from) && is_tonic(to) {
        Some(CadenceType::Authentic)
    } else if is_dominant(from) && is_submediant(to) {
        Some(CadenceType::Deceptive)
    } else if (is_subdominant(from) || is_tonic(from)) && is_dominant(to) {
        Some(CadenceType::Half)
    } else if is_subdominant(from) && is_tonic(to) {
        Some(CadenceType::Plagal)
    } else {
        None
    }
}

/// Find cadences at the given phrase boundaries.
///
/// A boundary `b` closes the phrase ending just before index `b`; the
/// chords at `b - 2` and `b - 1` are checked. Boundaries outside the
/// stream or closing fewer than two chords are ignored.
pub fn detect_cadences(numerals: &[RomanNumeral], boundaries: &[usize]) -> Vec<CadencePoint> {
    sanitize_boundaries(boundaries, numerals.len())
        .into_iter()
        .filter_map(|boundary| {
            let (from, to) = (numerals[boundary - 2], numerals[boundary - 1]);
            classify_cadence(&from, &to).map(|cadence_type| CadencePoint {
                position: boundary - 1,
                cadence_type,
                chords: [from, to],
                strength: cadence_type.strength(),
            })
        })
        .collect()
}
