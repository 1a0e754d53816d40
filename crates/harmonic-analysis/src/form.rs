use std::collections::HashMap;

use crate::cadence::sanitize_boundaries;
use crate::types::{FormReport, Key, ModulationEvent, MusicalForm, RepeatedPattern, RomanNumeral};

/// Repeated contiguous subsequences of at least two chords, longest first.
///
/// Lengths are searched from `min(len / 2, max_len)` down to 2. Occurrences
/// are counted greedily without overlap, and a pattern needs two of them.
/// Shorter patterns whose every occurrence sits inside an occurrence of an
/// already accepted longer pattern add nothing and are dropped.
pub fn find_repeated_patterns(
    sequence: &[RomanNumeral],
    max_len: usize,
    max_patterns: usize,
) -> Vec<RepeatedPattern> {
    let top = (sequence.len() / 2).min(max_len);
    let mut accepted: Vec<RepeatedPattern> = Vec::new();

    for length in (2..=top).rev() {
        // Starts grouped by content, in order of first appearance
        let mut order: Vec<&[RomanNumeral]> = Vec::new();
        let mut starts: HashMap<&[RomanNumeral], Vec<usize>> = HashMap::new();
        for (start, window) in sequence.windows(length).enumerate() {
            starts
                .entry(window)
                .or_insert_with(|| {
                    order.push(window);
                    Vec::new()
                })
                .push(start);
        }

        for window in order {
            let positions = non_overlapping(&starts[window], length);
            if positions.len() < 2 || is_covered(&positions, length, &accepted) {
                continue;
            }
            accepted.push(RepeatedPattern {
                pattern: window.to_vec(),
                length,
                positions,
            });
        }
    }

    accepted.sort_by(|a, b| b.length.cmp(&a.length).then(a.positions[0].cmp(&b.positions[0])));
    accepted.truncate(max_patterns);
    accepted
}

fn non_overlapping(starts: &[usize], length: usize) -> Vec<usize> {
    let mut kept = Vec::new();
    let mut next_free = 0;
    for &start in starts {
        if start >= next_free {
            kept.push(start);
            next_free = start + length;
        }
    }
    kept
}

fn is_covered(positions: &[usize], length: usize, accepted: &[RepeatedPattern]) -> bool {
    positions.iter().all(|&p| {
        accepted.iter().any(|outer| {
            outer
                .positions
                .iter()
                .any(|&q| q <= p && p + length <= q + outer.length)
        })
    })
}

fn section_name(index: usize) -> String {
    if index < 26 {
        ((b'A' + index as u8) as char).to_string()
    } else {
        format!("S{index}")
    }
}

/// Letter labels for consecutive chunks of `unit` chords, equal chunks sharing a letter.
pub fn label_sections(sequence: &[RomanNumeral], unit: usize) -> Vec<String> {
    let mut distinct: Vec<&[RomanNumeral]> = Vec::new();
    sequence
        .chunks(unit.max(1))
        .map(|chunk| {
            let index = match distinct.iter().position(|d| *d == chunk) {
                Some(index) => index,
                None => {
                    distinct.push(chunk);
                    distinct.len() - 1
                }
            };
            section_name(index)
        })
        .collect()
}

fn classify(
    len: usize,
    patterns: &[RepeatedPattern],
    sections: &[String],
    unit: usize,
    phrase_length: usize,
) -> MusicalForm {
    if len == 0 || (patterns.is_empty() && len <= phrase_length) {
        return MusicalForm::Phrase;
    }

    match sections.len() {
        0 | 1 => MusicalForm::Phrase,
        2 => {
            if sections[0] == sections[1] {
                MusicalForm::BinaryForm
            } else if patterns.iter().any(|p| {
                p.positions.iter().any(|&x| x < unit) && p.positions.iter().any(|&x| x >= unit)
            }) {
                // Related openings with different continuations
                MusicalForm::Period
            } else {
                MusicalForm::ExtendedForm
            }
        }
        _ => {
            let mut labels: Vec<&String> = sections.iter().collect();
            labels.sort();
            labels.dedup();
            if labels.len() == sections.len() {
                return MusicalForm::ExtendedForm;
            }
            let groups = 1 + sections.windows(2).filter(|w| w[0] != w[1]).count();
            if labels.len() == 2 && groups == 2 {
                MusicalForm::BinaryForm
            } else {
                MusicalForm::SongForm
            }
        }
    }
}

/// Phrase lengths between consecutive boundaries, closing at the end of the sequence.
pub fn phrase_lengths(boundaries: &[usize], len: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let mut ends = sanitize_boundaries(boundaries, len);
    if ends.last() != Some(&len) {
        ends.push(len);
    }
    let mut previous = 0;
    ends.into_iter()
        .map(|end| {
            let length = end - previous;
            previous = end;
            length
        })
        .collect()
}

/// Infer phrasing and form from a Roman-numeral sequence.
pub fn analyze_form(
    sequence: &[RomanNumeral],
    boundaries: &[usize],
    initial_key: Key,
    modulations: &[ModulationEvent],
    phrase_length: usize,
    max_pattern_length: usize,
    max_patterns: usize,
) -> FormReport {
    let patterns = find_repeated_patterns(sequence, max_pattern_length, max_patterns);
    let unit = patterns
        .first()
        .map_or(0, |p| p.length)
        .max(phrase_length)
        .max(1);
    let sections = label_sections(sequence, unit);
    let suggested_form = classify(sequence.len(), &patterns, &sections, unit, phrase_length);

    FormReport {
        total_length: sequence.len(),
        suggested_form,
        phrase_lengths: phrase_lengths(boundaries, sequence.len()),
        sections,
        key_centers: std::iter::once(initial_key)
            .chain(modulations.iter().map(|m| m.to_key))
            .collect(),
        repeated_patterns: patterns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numerals(text: &str) -> Vec<RomanNumeral> {
        text.split_whitespace().map(|n| n.parse().unwrap()).collect()
    }

    fn form_of(text: &str) -> FormReport {
        let sequence = numerals(text);
        let boundaries: Vec<usize> = (1..=sequence.len() / 4).map(|i| i * 4).collect();
        analyze_form(&sequence, &boundaries, Key::major(0), &[], 4, 32, 5)
    }

    #[test]
    fn empty_sequence_is_a_phrase() {
        let report = form_of("");
        assert_eq!(report.suggested_form, MusicalForm::Phrase);
        assert_eq!(report.total_length, 0);
        assert!(report.sections.is_empty());
        assert!(report.phrase_lengths.is_empty());
        assert_eq!(report.key_centers, vec![Key::major(0)]);
    }

    #[test]
    fn short_sequence_is_a_phrase() {
        let report = form_of("I IV V I");
        assert_eq!(report.suggested_form, MusicalForm::Phrase);
        assert!(report.repeated_patterns.is_empty());
        assert_eq!(report.phrase_lengths, vec![4]);
    }

    #[test]
    fn finds_longest_repeat_and_drops_nested_ones() {
        let patterns = find_repeated_patterns(&numerals("I IV V I I IV V I"), 32, 5);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].length, 4);
        assert_eq!(patterns[0].positions, vec![0, 4]);
        assert_eq!(patterns[0].repetitions(), 2);
    }

    #[test]
    fn occurrences_do_not_overlap() {
        let patterns = find_repeated_patterns(&numerals("I V I V I V"), 32, 5);
        assert_eq!(patterns[0].length, 2);
        assert_eq!(patterns[0].positions, vec![0, 2, 4]);
        // "V I" straddles the "I V" occurrences, so it is reported too
        assert!(patterns.iter().any(|p| p.pattern == numerals("V I")));
    }

    #[test]
    fn repeated_halves_are_binary() {
        let report = form_of("I vi IV V I vi IV V");
        assert_eq!(report.sections, vec!["A", "A"]);
        assert_eq!(report.suggested_form, MusicalForm::BinaryForm);
    }

    #[test]
    fn shared_opening_is_a_period() {
        // antecedent ends on V, consequent on I
        let report = form_of("I IV ii V I IV V I");
        assert_eq!(report.sections, vec!["A", "B"]);
        assert_eq!(report.suggested_form, MusicalForm::Period);
    }

    #[test]
    fn unrelated_halves_are_extended() {
        let report = form_of("I IV ii V vi iii IV I");
        assert_eq!(report.suggested_form, MusicalForm::ExtendedForm);
    }

    #[test]
    fn returning_section_is_song_form() {
        let report = form_of("I vi IV V ii V I I I vi IV V");
        assert_eq!(report.sections, vec!["A", "B", "A"]);
        assert_eq!(report.suggested_form, MusicalForm::SongForm);
    }

    #[test]
    fn eight_and_four_chord_blocks() {
        let a = "I vi IV V I vi ii V";
        let b = "IV V I I";
        let report = form_of(&format!("{a} {a} {b} {b}"));
        assert_eq!(report.total_length, 24);
        assert!(!report.repeated_patterns.is_empty());
        assert_eq!(report.repeated_patterns[0].length, 8);
        assert_eq!(report.sections, vec!["A", "A", "B"]);
        assert_eq!(report.suggested_form, MusicalForm::BinaryForm);
        assert_eq!(report.phrase_lengths, vec![4, 4, 4, 4, 4, 4]);
    }

    #[test]
    fn section_names_past_z() {
        assert_eq!(section_name(0), "A");
        assert_eq!(section_name(25), "Z");
        assert_eq!(section_name(26), "S26");
    }

    #[test]
    fn phrase_lengths_close_at_the_end() {
        assert_eq!(phrase_lengths(&[4, 8], 10), vec![4, 4, 2]);
        assert_eq!(phrase_lengths(&[0, 1, 3, 3, 50], 6), vec![3, 3]);
    }
}
