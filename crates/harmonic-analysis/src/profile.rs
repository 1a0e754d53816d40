use serde::{Deserialize, Serialize};

use crate::types::{ChordSpan, NoteEvent};

/// Duration-weighted 12-bin pitch-class histogram (C=0 … B=11).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PitchClassProfile {
    weights: [f64; 12],
}

impl PitchClassProfile {
    pub fn new(weights: [f64; 12]) -> Self {
        Self { weights }
    }

    /// Accumulate each note's duration into its pitch-class bin.
    pub fn from_notes(notes: &[NoteEvent]) -> Self {
        let mut weights = [0.0_f64; 12];
        for note in notes {
            weights[note.pitch_class() as usize] += note.duration.max(0.0);
        }
        Self { weights }
    }

    /// Accumulate `(pitch_class, weight)` pairs.
    pub fn from_weighted<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u8, f64)>,
    {
        let mut weights = [0.0_f64; 12];
        for (pc, weight) in pairs {
            weights[(pc % 12) as usize] += weight.max(0.0);
        }
        Self { weights }
    }

    /// Each chord contributes its span duration to every sounding pitch class.
    pub fn from_chords(chords: &[ChordSpan]) -> Self {
        Self::from_weighted(chords.iter().flat_map(|chord| {
            let weight = chord.duration().max(f64::EPSILON);
            chord.pitch_classes.iter().map(move |&pc| (pc, weight))
        }))
    }

    pub fn weights(&self) -> &[f64; 12] {
        &self.weights
    }

    pub fn weight(&self, pitch_class: u8) -> f64 {
        self.weights[(pitch_class % 12) as usize]
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Number of pitch classes with non-zero weight.
    pub fn distinct_pitch_classes(&self) -> usize {
        self.weights.iter().filter(|w| **w > 0.0).count()
    }

    /// Weights scaled to sum to 1. An empty profile stays all zeros.
    pub fn normalized(&self) -> [f64; 12] {
        let total = self.total();
        if total <= 0.0 {
            return [0.0; 12];
        }
        let mut out = self.weights;
        for w in &mut out {
            *w /= total;
        }
        out
    }

    /// Transpose up by `semitones`: the weight at pitch class `p` moves to `p + semitones`.
    pub fn transposed(&self, semitones: u8) -> Self {
        let shift = (semitones % 12) as usize;
        let mut weights = [0.0; 12];
        for (pc, w) in self.weights.iter().enumerate() {
            weights[(pc + shift) % 12] = *w;
        }
        Self { weights }
    }
}
