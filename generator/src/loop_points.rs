//! Loop boundary computation from editor labels and track lengths.

use crate::ipc::protocol::{Label, LabelTrack, TrackInfo};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum LoopError {
    #[error("No end label and no wave track reports its length")]
    UnknownLength,
    #[error("Loop end (sample {end}) is not after loop start (sample {start})")]
    EmptyLoop { start: u64, end: u64 },
}

/// Loop region in samples at the project rate. `start < end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopBounds {
    pub start: u64,
    pub end: u64,
}

impl LoopBounds {
    /// Loop end expressed in seconds, used as the export range end.
    pub fn end_seconds(&self, rate: u32) -> f64 {
        self.end as f64 / rate as f64
    }
}

/// How labels are mapped to the loop start and end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelResolution {
    /// Labels named `start`/`s` and `end`/`e` win wherever they appear.
    /// Without them, the first unmarked label is the start and the first
    /// other unmarked label placed after the start is the end.
    #[default]
    Named,
    /// Single pass in encounter order. A label only fills the end when it did
    /// not fill the start, so `end` placed before `start` is taken as the start.
    Sequential,
}

fn is_start_marker(name: &str) -> bool {
    matches!(name.to_lowercase().as_str(), "start" | "s")
}

fn is_end_marker(name: &str) -> bool {
    matches!(name.to_lowercase().as_str(), "end" | "e")
}

/// Compute the loop bounds for one session.
///
/// When no end is resolved, the loop ends one sample before the end of the
/// longest wave track. Bounds that would not describe a loop are an error.
pub fn compute_loop_bounds(
    label_tracks: &[LabelTrack],
    wave_tracks: &[TrackInfo],
    rate: u32,
    resolution: LabelResolution,
) -> Result<LoopBounds, LoopError> {
    let labels: Vec<&Label> = label_tracks
        .iter()
        .flat_map(|track| track.labels.iter())
        .collect();
    let rate = rate as f64;

    let named = resolve_named(&labels, rate);
    let sequential = resolve_sequential(&labels, rate);
    if named != sequential {
        warn!(
            "[LOOP] Label order is ambiguous: named markers give {:?}, encounter order gives {:?}; using {:?}",
            named, sequential, resolution
        );
    }

    let (start, mut end) = match resolution {
        LabelResolution::Named => named,
        LabelResolution::Sequential => sequential,
    };

    if end == 0.0 {
        let longest = wave_tracks
            .iter()
            .filter_map(|track| track.end)
            .fold(0.0_f64, f64::max);
        if longest <= 0.0 {
            return Err(LoopError::UnknownLength);
        }
        end = longest * rate - 1.0;
        debug!("[LOOP] No end label, using longest track end {}s", longest);
    }

    let bounds = LoopBounds {
        start: to_sample(start),
        end: to_sample(end),
    };
    if bounds.end <= bounds.start {
        return Err(LoopError::EmptyLoop {
            start: bounds.start,
            end: bounds.end,
        });
    }
    Ok(bounds)
}

fn to_sample(position: f64) -> u64 {
    position.floor().max(0.0) as u64
}

fn resolve_sequential(labels: &[&Label], rate: f64) -> (f64, f64) {
    let mut start = 0.0;
    let mut end = 0.0;

    for label in labels {
        if is_start_marker(&label.name) || start == 0.0 {
            start = label.time * rate;
        } else if is_end_marker(&label.name) || end == 0.0 {
            end = label.time * rate;
        }
    }

    (start, end)
}

fn resolve_named(labels: &[&Label], rate: f64) -> (f64, f64) {
    let explicit_start = labels.iter().rev().find(|l| is_start_marker(&l.name));
    let explicit_end = labels.iter().rev().find(|l| is_end_marker(&l.name));

    let unmarked: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, l)| !is_start_marker(&l.name) && !is_end_marker(&l.name))
        .map(|(i, _)| i)
        .collect();

    let (start, start_fallback) = match explicit_start {
        Some(label) => (label.time * rate, None),
        None => match unmarked.first() {
            Some(&i) => (labels[i].time * rate, Some(i)),
            None => (0.0, None),
        },
    };

    // An unmarked label before the start cannot close the loop
    let end = match explicit_end {
        Some(label) => label.time * rate,
        None => unmarked
            .iter()
            .filter(|&&i| Some(i) != start_fallback)
            .map(|&i| labels[i].time * rate)
            .find(|&time| time > start)
            .unwrap_or(0.0),
    };

    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::protocol::TrackKind;

    const RATE: u32 = 32000;

    fn wave(end: Option<f64>) -> TrackInfo {
        TrackInfo {
            kind: TrackKind::Wave,
            name: None,
            start: Some(0.0),
            end,
            mute: None,
            channels: Some(2),
        }
    }

    fn labels(entries: &[(f64, &str)]) -> Vec<LabelTrack> {
        vec![LabelTrack {
            track_index: 2,
            labels: entries
                .iter()
                .map(|(time, name)| Label::new(*time, name))
                .collect(),
        }]
    }

    fn bounds(entries: &[(f64, &str)], resolution: LabelResolution) -> Result<LoopBounds, LoopError> {
        compute_loop_bounds(
            &labels(entries),
            &[wave(Some(10.0)), wave(Some(12.0))],
            RATE,
            resolution,
        )
    }

    fn both(entries: &[(f64, &str)]) -> LoopBounds {
        let named = bounds(entries, LabelResolution::Named).unwrap();
        let sequential = bounds(entries, LabelResolution::Sequential).unwrap();
        assert_eq!(named, sequential);
        assert!(named.start < named.end);
        named
    }

    #[test]
    fn explicit_markers() {
        let result = both(&[(2.0, "start"), (11.0, "end")]);
        assert_eq!(result, LoopBounds { start: 64000, end: 352000 });
    }

    #[test]
    fn explicit_markers_ignore_order_and_other_labels() {
        let entries = [(5.0, "verse"), (11.0, "E"), (3.0, "chorus"), (2.0, "S"), (7.0, "x")];
        let result = bounds(&entries, LabelResolution::Named).unwrap();
        assert_eq!(result, LoopBounds { start: 64000, end: 352000 });
    }

    #[test]
    fn sequential_takes_leading_end_as_start() {
        let entries = [(11.0, "end"), (2.0, "start")];

        let named = bounds(&entries, LabelResolution::Named).unwrap();
        assert_eq!(named, LoopBounds { start: 64000, end: 352000 });

        // "end" fills the empty start, then "start" overwrites it and no end is left
        let sequential = bounds(&entries, LabelResolution::Sequential).unwrap();
        assert_eq!(sequential, LoopBounds { start: 64000, end: 383999 });
    }

    #[test]
    fn unmarked_label_before_start_is_not_the_end() {
        let result = both(&[(1.0, "intro"), (5.0, "start")]);
        assert_eq!(result, LoopBounds { start: 160000, end: 383999 });
    }

    #[test]
    fn unmarked_labels_after_start_close_the_loop() {
        let result = both(&[(2.0, "start"), (5.0, "a"), (9.0, "b")]);
        assert_eq!(result, LoopBounds { start: 64000, end: 160000 });
    }

    #[test]
    fn leading_end_with_unmarked_label() {
        let entries = [(11.0, "end"), (3.0, "bridge")];

        let named = bounds(&entries, LabelResolution::Named).unwrap();
        assert_eq!(named, LoopBounds { start: 96000, end: 352000 });

        // "end" becomes the start and "bridge" the end: not a loop
        assert_eq!(
            bounds(&entries, LabelResolution::Sequential),
            Err(LoopError::EmptyLoop {
                start: 352000,
                end: 96000
            })
        );
    }

    #[test]
    fn unmarked_labels_fall_back_to_first_and_next() {
        let result = both(&[(1.5, "a"), (4.0, "b"), (9.0, "c")]);
        assert_eq!(result, LoopBounds { start: 48000, end: 128000 });
    }

    #[test]
    fn missing_end_uses_longest_track() {
        let result = both(&[(2.0, "start")]);
        assert_eq!(result, LoopBounds { start: 64000, end: 12 * 32000 - 1 });
    }

    #[test]
    fn single_unmarked_label_is_only_the_start() {
        let result = both(&[(2.0, "intro")]);
        assert_eq!(result, LoopBounds { start: 64000, end: 383999 });
    }

    #[test]
    fn no_labels_loops_whole_song() {
        let result =
            compute_loop_bounds(&[], &[wave(Some(10.0)), wave(None)], RATE, LabelResolution::Named);
        assert_eq!(result, Ok(LoopBounds { start: 0, end: 319999 }));
    }

    #[test]
    fn unknown_track_length_is_an_error() {
        let result = compute_loop_bounds(&[], &[wave(None)], RATE, LabelResolution::Named);
        assert_eq!(result, Err(LoopError::UnknownLength));
    }

    #[test]
    fn explicit_end_before_start_is_an_error() {
        let result = bounds(&[(8.0, "start"), (3.0, "end")], LabelResolution::Named);
        assert_eq!(
            result,
            Err(LoopError::EmptyLoop {
                start: 256000,
                end: 96000
            })
        );
    }

    #[test]
    fn fractional_times_are_floored() {
        let result = both(&[(1.00001, "s"), (2.99999, "e")]);
        assert_eq!(result, LoopBounds { start: 32000, end: 95999 });
    }

    #[test]
    fn labels_across_tracks_are_combined() {
        let tracks = vec![
            LabelTrack {
                track_index: 1,
                labels: vec![Label::new(2.0, "start")],
            },
            LabelTrack {
                track_index: 3,
                labels: vec![Label::new(11.0, "end")],
            },
        ];
        let result =
            compute_loop_bounds(&tracks, &[wave(Some(12.0))], RATE, LabelResolution::Named);
        assert_eq!(result, Ok(LoopBounds { start: 64000, end: 352000 }));
    }

    #[test]
    fn end_seconds_converts_back() {
        let bounds = LoopBounds { start: 0, end: 352000 };
        assert_eq!(bounds.end_seconds(RATE), 11.0);
    }
}
