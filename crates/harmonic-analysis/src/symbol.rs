//! Chord-symbol parsing: `C`, `F#m7b5`, `Bbmaj7`, `Gsus4`, `C/E`.

use winnow::combinator::{opt, preceded};
use winnow::prelude::*;
use winnow::token::take_till;

use crate::chord_templates::{chord_pitch_classes, note_name};
use crate::key::pitch_class;
use crate::types::ChordQuality;

type PResult<T> = winnow::ModalResult<T>;

/// Quality suffixes accepted after the root, including common aliases.
static QUALITY_ALIASES: &[(&str, ChordQuality)] = &[
    ("", ChordQuality::Major),
    ("M", ChordQuality::Major),
    ("maj", ChordQuality::Major),
    ("m", ChordQuality::Minor),
    ("min", ChordQuality::Minor),
    ("-", ChordQuality::Minor),
    ("dim", ChordQuality::Diminished),
    ("°", ChordQuality::Diminished),
    ("o", ChordQuality::Diminished),
    ("aug", ChordQuality::Augmented),
    ("+", ChordQuality::Augmented),
    ("7", ChordQuality::Dominant7),
    ("dom7", ChordQuality::Dominant7),
    ("maj7", ChordQuality::Major7),
    ("M7", ChordQuality::Major7),
    ("Δ7", ChordQuality::Major7),
    ("Δ", ChordQuality::Major7),
    ("m7", ChordQuality::Minor7),
    ("min7", ChordQuality::Minor7),
    ("-7", ChordQuality::Minor7),
    ("m(maj7)", ChordQuality::MinorMajor7),
    ("mMaj7", ChordQuality::MinorMajor7),
    ("mM7", ChordQuality::MinorMajor7),
    ("minmaj7", ChordQuality::MinorMajor7),
    ("dim7", ChordQuality::Diminished7),
    ("°7", ChordQuality::Diminished7),
    ("o7", ChordQuality::Diminished7),
    ("m7b5", ChordQuality::HalfDiminished7),
    ("ø", ChordQuality::HalfDiminished7),
    ("ø7", ChordQuality::HalfDiminished7),
    ("6", ChordQuality::Major6),
    ("m6", ChordQuality::Minor6),
    ("add9", ChordQuality::Add9),
    ("sus4", ChordQuality::Suspended4),
    ("sus", ChordQuality::Suspended4),
    ("sus2", ChordQuality::Suspended2),
    ("5", ChordQuality::Power),
];

/// A parsed chord symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChordSymbol {
    pub root: u8,
    pub quality: ChordQuality,
    /// Slash bass pitch class, if one was written
    pub bass: Option<u8>,
}

impl ChordSymbol {
    pub fn pitch_classes(&self) -> Vec<u8> {
        let mut pcs = chord_pitch_classes(self.root, self.quality);
        if let Some(bass) = self.bass {
            if !pcs.contains(&bass) {
                pcs.push(bass);
                pcs.sort_unstable();
            }
        }
        pcs
    }

    /// Pitch class that sounds lowest: the slash bass or the root.
    pub fn bass_pitch_class(&self) -> u8 {
        self.bass.unwrap_or(self.root)
    }

    /// Canonical spelling, e.g. "Bbmaj7" or "C/E".
    pub fn name(&self, use_flats: bool) -> String {
        let mut name = format!("{}{}", note_name(self.root, use_flats), self.quality.suffix());
        if let Some(bass) = self.bass {
            name.push('/');
            name.push_str(note_name(bass, use_flats));
        }
        name
    }
}

/// Parse a chord symbol. Returns `None` for anything outside the alias table.
pub fn parse_chord_symbol(text: &str) -> Option<ChordSymbol> {
    let mut input = text.trim();
    // Roots are written in upper case; "b" alone is a flat sign, not a chord.
    if !input.starts_with(|c: char| c.is_ascii_uppercase()) {
        return None;
    }

    let (root, suffix, bass) = chord_symbol.parse_next(&mut input).ok()?;
    if !input.is_empty() {
        return None;
    }

    let quality = QUALITY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == suffix)
        .map(|(_, quality)| *quality)?;

    Some(ChordSymbol {
        root,
        quality,
        bass: bass.filter(|b| *b != root),
    })
}

fn chord_symbol<'s>(input: &mut &'s str) -> PResult<(u8, &'s str, Option<u8>)> {
    let root = pitch_class.parse_next(input)?;
    let suffix = take_till(0.., '/').parse_next(input)?;
    let bass = opt(preceded('/', pitch_class)).parse_next(input)?;
    Ok((root, suffix, bass))
}
