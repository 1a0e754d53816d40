use crate::types::{ChordSpan, LeapRecord, VoiceLeadingQuality, VoiceLeadingReport, VoicePoint};

const STEP_MAX: u16 = 2;
const SKIP_MAX: u16 = 4;

const SMOOTH_SCORE: f64 = 80.0;
const MODERATE_SCORE: f64 = 50.0;

/// Bass line of a harmonic stream: the lowest pitch of each chord.
pub fn bass_line(stream: &[ChordSpan]) -> Vec<VoicePoint> {
    stream
        .iter()
        .enumerate()
        .filter_map(|(position, chord)| chord.bass_pitch.map(|pitch| VoicePoint { pitch, position }))
        .collect()
}

/// Score the melodic smoothness of one voice.
///
/// Transitions of up to 2 semitones are steps, 3 to 4 are skips, anything
/// wider is a leap, and leaps of `large_leap_threshold` semitones or more
/// are recorded individually and lower the score.
pub fn analyze_voice_leading(points: &[VoicePoint], large_leap_threshold: u8) -> VoiceLeadingReport {
    if points.len() < 2 {
        return VoiceLeadingReport::default();
    }

    let threshold = large_leap_threshold.max(1) as u16;
    let mut report = VoiceLeadingReport {
        total_transitions: points.len() - 1,
        ..VoiceLeadingReport::default()
    };

    for pair in points.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let interval = to.pitch as i16 - from.pitch as i16;
        let size = interval.unsigned_abs();

        if size >= threshold {
            report.large_leaps.push(LeapRecord {
                from_pitch: from.pitch,
                to_pitch: to.pitch,
                interval_semitones: interval,
                position: from.position,
            });
        } else if size <= STEP_MAX {
            report.steps += 1;
        } else if size <= SKIP_MAX {
            report.skips += 1;
        } else {
            report.leaps += 1;
        }
    }

    let ratio = report.large_leaps.len() as f64 / report.total_transitions as f64;
    report.smoothness_score = (100.0 * (1.0 - ratio)).max(0.0);
    report.quality = if report.smoothness_score >= SMOOTH_SCORE {
        VoiceLeadingQuality::Smooth
    } else if report.smoothness_score >= MODERATE_SCORE {
        VoiceLeadingQuality::Moderate
    } else {
        VoiceLeadingQuality::Choppy
    };
    report.suggestions = suggestions(&report);

    report
}

fn suggestions(report: &VoiceLeadingReport) -> Vec<String> {
    let mut out: Vec<String> = report
        .large_leaps
        .iter()
        .map(|leap| {
            let direction = if leap.interval_semitones > 0 { "up" } else { "down" };
            format!(
                "Leap of {} semitones {} after position {}: an inversion or passing tone would move the bass by step",
                leap.interval_semitones.unsigned_abs(),
                direction,
                leap.position
            )
        })
        .collect();

    if report.quality == VoiceLeadingQuality::Choppy {
        out.push("Most transitions are large leaps; favor common tones and stepwise bass motion".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn line(pitches: &[u8]) -> Vec<VoicePoint> {
        pitches
            .iter()
            .enumerate()
            .map(|(position, &pitch)| VoicePoint { pitch, position })
            .collect()
    }

    #[test]
    fn too_few_points_is_insufficient() {
        for points in [line(&[]), line(&[60])] {
            let report = analyze_voice_leading(&points, 7);
            assert_eq!(report.quality, VoiceLeadingQuality::InsufficientData);
            assert!(report.large_leaps.is_empty());
            assert_eq!(report.smoothness_score, 100.0);
        }
    }

    #[test]
    fn stepwise_line_is_smooth() {
        let report = analyze_voice_leading(&line(&[60, 62, 64, 65, 67, 65, 64, 62, 60]), 7);
        assert_eq!(report.quality, VoiceLeadingQuality::Smooth);
        assert_eq!(report.smoothness_score, 100.0);
        assert_eq!(report.steps, 8);
        assert!(report.large_leaps.is_empty());
        assert!(report.suggestions.is_empty());
    }

    #[test]
    fn tritone_boundary_depends_on_threshold() {
        // C2 -> F#2
        let points = line(&[36, 42]);
        let default = analyze_voice_leading(&points, 7);
        assert!(default.large_leaps.is_empty());
        assert_eq!(default.leaps, 1);

        let strict = analyze_voice_leading(&points, 5);
        assert_eq!(
            strict.large_leaps,
            vec![LeapRecord {
                from_pitch: 36,
                to_pitch: 42,
                interval_semitones: 6,
                position: 0,
            }]
        );
        assert_eq!(strict.quality, VoiceLeadingQuality::Choppy);
    }

    #[test]
    fn score_and_buckets() {
        // one large leap out of four transitions
        let report = analyze_voice_leading(&line(&[48, 50, 52, 60, 59]), 7);
        assert_eq!(report.smoothness_score, 75.0);
        assert_eq!(report.quality, VoiceLeadingQuality::Moderate);
        assert_eq!(report.large_leaps[0].position, 2);
        assert_eq!(report.large_leaps[0].interval_semitones, 8);
        assert_eq!(report.suggestions.len(), 1);

        let report = analyze_voice_leading(&line(&[48, 60, 48, 60]), 7);
        assert_eq!(report.smoothness_score, 0.0);
        assert_eq!(report.quality, VoiceLeadingQuality::Choppy);
        assert_eq!(report.large_leaps[1].interval_semitones, -12);
        assert_eq!(report.suggestions.len(), 4);
    }

    #[test]
    fn motion_counts() {
        let report = analyze_voice_leading(&line(&[60, 61, 64, 69, 69]), 7);
        assert_eq!((report.steps, report.skips, report.leaps), (2, 1, 1));
        assert_eq!(report.total_transitions, 4);
    }

    #[test]
    fn positions_are_carried_through() {
        let points = vec![
            VoicePoint { pitch: 48, position: 3 },
            VoicePoint { pitch: 60, position: 7 },
        ];
        let report = analyze_voice_leading(&points, 7);
        assert_eq!(report.large_leaps[0].position, 3);
    }
}
