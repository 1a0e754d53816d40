//! Note input documents.

use anyhow::{Context, Result};
use harmonic_analysis::{notes_from_parallel, NoteEvent};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

/// Accepted JSON shapes for note input.
///
/// ```json
/// [{"pitch": 60, "start_time": 0.0, "duration": 1.0}]
/// {"notes": [{"pitch": 60, "start_time": 0.0, "duration": 1.0}]}
/// {"pitches": [60, 64], "starts": [0.0, 0.0], "durations": [1.0, 1.0]}
/// ```
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum NoteDocument {
    Events(Vec<NoteEvent>),
    Wrapped {
        notes: Vec<NoteEvent>,
    },
    Parallel {
        pitches: Vec<i64>,
        starts: Vec<f64>,
        durations: Vec<f64>,
    },
}

impl NoteDocument {
    pub fn into_notes(self) -> harmonic_analysis::Result<Vec<NoteEvent>> {
        match self {
            NoteDocument::Events(notes) | NoteDocument::Wrapped { notes } => Ok(notes),
            NoteDocument::Parallel {
                pitches,
                starts,
                durations,
            } => notes_from_parallel(&pitches, &starts, &durations),
        }
    }
}

/// Parse a note document. Shape errors carry the offending note index.
pub fn parse_notes(text: &str) -> Result<Vec<NoteEvent>> {
    let document: NoteDocument = serde_json::from_str(text).context(
        "expected a note array, {\"notes\": [...]}, or {\"pitches\", \"starts\", \"durations\"} arrays",
    )?;
    Ok(document.into_notes()?)
}

/// Read notes from a file, or from stdin when `source` is `-`.
pub fn read_notes(source: &Path) -> Result<Vec<NoteEvent>> {
    let text = if source == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read notes from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read notes from {}", source.display()))?
    };
    parse_notes(&text)
}
