use std::fmt;
use std::str::FromStr;

use winnow::combinator::{alt, opt};
use winnow::prelude::*;
use winnow::token::{rest, take_while};

use crate::types::{ChordQuality, HarmonicFunction, Key, KeyMode, RomanNumeral};
use crate::Error;

type PResult<T> = winnow::ModalResult<T>;

/// (alteration, degree) for each semitone above a major tonic.
const MAJOR_DEGREES: [(i8, u8); 12] = [
    (0, 1),
    (-1, 2),
    (0, 2),
    (-1, 3),
    (0, 3),
    (0, 4),
    (1, 4),
    (0, 5),
    (-1, 6),
    (0, 6),
    (-1, 7),
    (0, 7),
];

/// (alteration, degree) for each semitone above a minor tonic, on a
/// harmonic-minor basis so the leading-tone chord is diatonic VII.
const MINOR_DEGREES: [(i8, u8); 12] = [
    (0, 1),
    (-1, 2),
    (0, 2),
    (0, 3),
    (1, 3),
    (0, 4),
    (1, 4),
    (0, 5),
    (0, 6),
    (1, 6),
    (-1, 7),
    (0, 7),
];

const NUMERALS: [&str; 7] = ["I", "II", "III", "IV", "V", "VI", "VII"];

impl RomanNumeral {
    /// Label a chord rooted on `root` against `key`.
    pub fn for_chord(root: u8, quality: ChordQuality, key: &Key) -> Self {
        let interval = ((root % 12) + 12 - key.root_pitch_class % 12) % 12;
        let (alteration, degree) = match key.mode {
            KeyMode::Major => MAJOR_DEGREES[interval as usize],
            KeyMode::Minor => MINOR_DEGREES[interval as usize],
        };
        RomanNumeral {
            alteration,
            degree,
            quality,
        }
    }

    pub fn is_diatonic(&self) -> bool {
        self.alteration == 0
    }

    pub fn function(&self) -> HarmonicFunction {
        if !self.is_diatonic() {
            return HarmonicFunction::Chromatic;
        }
        match self.degree {
            1 | 3 | 6 => HarmonicFunction::Tonic,
            2 | 4 => HarmonicFunction::Predominant,
            _ => HarmonicFunction::Dominant,
        }
    }
}

fn numeral_suffix(quality: ChordQuality) -> &'static str {
    match quality {
        ChordQuality::Major | ChordQuality::Minor => "",
        ChordQuality::Diminished => "°",
        ChordQuality::Augmented => "+",
        ChordQuality::Suspended4 => "sus4",
        ChordQuality::Suspended2 => "sus2",
        ChordQuality::Dominant7 | ChordQuality::Minor7 => "7",
        ChordQuality::Major7 | ChordQuality::MinorMajor7 => "maj7",
        ChordQuality::Diminished7 => "°7",
        ChordQuality::HalfDiminished7 => "ø7",
        ChordQuality::Major6 | ChordQuality::Minor6 => "6",
        ChordQuality::Add9 => "add9",
        ChordQuality::Power => "5",
    }
}

fn quality_from_suffix(lowercase: bool, suffix: &str) -> Option<ChordQuality> {
    let quality = if lowercase {
        match suffix {
            "" => ChordQuality::Minor,
            "°" | "o" | "dim" => ChordQuality::Diminished,
            "7" => ChordQuality::Minor7,
            "maj7" => ChordQuality::MinorMajor7,
            "°7" | "o7" | "dim7" => ChordQuality::Diminished7,
            "ø" | "ø7" => ChordQuality::HalfDiminished7,
            "6" => ChordQuality::Minor6,
            _ => return None,
        }
    } else {
        match suffix {
            "" => ChordQuality::Major,
            "+" => ChordQuality::Augmented,
            "sus4" => ChordQuality::Suspended4,
            "sus2" => ChordQuality::Suspended2,
            "7" => ChordQuality::Dominant7,
            "maj7" => ChordQuality::Major7,
            "6" => ChordQuality::Major6,
            "add9" => ChordQuality::Add9,
            "5" => ChordQuality::Power,
            _ => return None,
        }
    };
    Some(quality)
}

impl fmt::Display for RomanNumeral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.alteration {
            a if a < 0 => f.write_str("b")?,
            a if a > 0 => f.write_str("#")?,
            _ => {}
        }
        let numeral = NUMERALS[(self.degree.clamp(1, 7) - 1) as usize];
        if self.quality.is_minor_family() {
            f.write_str(&numeral.to_ascii_lowercase())?;
        } else {
            f.write_str(numeral)?;
        }
        f.write_str(numeral_suffix(self.quality))
    }
}

fn alteration(input: &mut &str) -> PResult<i8> {
    alt(('b'.value(-1), '♭'.value(-1), '#'.value(1), '♯'.value(1))).parse_next(input)
}

fn numeral_parts<'s>(input: &mut &'s str) -> PResult<(Option<i8>, &'s str, &'s str)> {
    let alteration = opt(alteration).parse_next(input)?;
    let numeral = take_while(1..=3, ['I', 'V', 'i', 'v']).parse_next(input)?;
    let suffix = rest.parse_next(input)?;
    Ok((alteration, numeral, suffix))
}

fn parse_numeral(text: &str) -> Option<RomanNumeral> {
    let mut input = text.trim();
    let (alteration, numeral, suffix) = numeral_parts.parse_next(&mut input).ok()?;

    let lowercase = numeral.chars().all(|c| c.is_ascii_lowercase());
    if !lowercase && !numeral.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }
    let upper = numeral.to_ascii_uppercase();
    let degree = NUMERALS.iter().position(|n| *n == upper)? as u8 + 1;

    Some(RomanNumeral {
        alteration: alteration.unwrap_or(0),
        degree,
        quality: quality_from_suffix(lowercase, suffix)?,
    })
}

impl FromStr for RomanNumeral {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_numeral(s).ok_or_else(|| Error::UnrecognizedNumeral(s.to_string()))
    }
}

impl From<RomanNumeral> for String {
    fn from(numeral: RomanNumeral) -> Self {
        numeral.to_string()
    }
}

impl TryFrom<String> for RomanNumeral {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(root: u8, quality: ChordQuality, key: Key) -> String {
        RomanNumeral::for_chord(root, quality, &key).to_string()
    }

    #[test]
    fn diatonic_sevenths_in_c() {
        let c = Key::major(0);
        assert_eq!(label(2, ChordQuality::Minor7, c), "ii7");
        assert_eq!(label(7, ChordQuality::Dominant7, c), "V7");
        assert_eq!(label(0, ChordQuality::Major7, c), "Imaj7");
        assert_eq!(label(11, ChordQuality::HalfDiminished7, c), "viiø7");
        assert_eq!(label(11, ChordQuality::Diminished, c), "vii°");
    }

    #[test]
    fn chromatic_degrees() {
        let c = Key::major(0);
        assert_eq!(label(10, ChordQuality::Major, c), "bVII");
        assert_eq!(label(8, ChordQuality::Major, c), "bVI");
        assert_eq!(label(6, ChordQuality::Diminished7, c), "#iv°7");
        assert_eq!(label(1, ChordQuality::Major, c), "bII");
    }

    #[test]
    fn minor_key_degrees() {
        let a_minor = Key::minor(9);
        assert_eq!(label(9, ChordQuality::Minor, a_minor), "i");
        assert_eq!(label(4, ChordQuality::Major, a_minor), "V");
        assert_eq!(label(0, ChordQuality::Major, a_minor), "III");
        assert_eq!(label(5, ChordQuality::Major, a_minor), "VI");
        assert_eq!(label(8, ChordQuality::Diminished7, a_minor), "vii°7");
        assert_eq!(label(11, ChordQuality::Diminished, a_minor), "ii°");
    }

    #[test]
    fn functions() {
        let c = Key::major(0);
        let func = |root, quality| RomanNumeral::for_chord(root, quality, &c).function();
        assert_eq!(func(0, ChordQuality::Major), HarmonicFunction::Tonic);
        assert_eq!(func(9, ChordQuality::Minor), HarmonicFunction::Tonic);
        assert_eq!(func(5, ChordQuality::Major), HarmonicFunction::Predominant);
        assert_eq!(func(2, ChordQuality::Minor7), HarmonicFunction::Predominant);
        assert_eq!(func(7, ChordQuality::Dominant7), HarmonicFunction::Dominant);
        assert_eq!(func(10, ChordQuality::Major), HarmonicFunction::Chromatic);
    }

    #[test]
    fn parses_display_forms() {
        for text in ["I", "ii7", "V7", "Imaj7", "viiø7", "vii°", "bVII", "#iv°7", "IV6", "i", "imaj7", "III+", "Vsus4", "I5"] {
            let numeral: RomanNumeral = text.parse().unwrap();
            assert_eq!(numeral.to_string(), text);
        }
        let dim: RomanNumeral = "viio".parse().unwrap();
        assert_eq!(dim.quality, ChordQuality::Diminished);
    }

    #[test]
    fn rejects_malformed_numerals() {
        assert!("".parse::<RomanNumeral>().is_err());
        assert!("Vi".parse::<RomanNumeral>().is_err());
        assert!("IIII".parse::<RomanNumeral>().is_err());
        assert!("v+".parse::<RomanNumeral>().is_err());
        assert!("X".parse::<RomanNumeral>().is_err());
    }

    #[test]
    fn serializes_as_string() {
        let numeral = RomanNumeral::for_chord(7, ChordQuality::Dominant7, &Key::major(0));
        assert_eq!(serde_json::to_string(&numeral).unwrap(), "\"V7\"");
        let back: RomanNumeral = serde_json::from_str("\"ii7\"").unwrap();
        assert_eq!(back.degree, 2);
        assert_eq!(back.quality, ChordQuality::Minor7);
    }
}
