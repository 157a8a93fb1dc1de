use std::collections::{BinaryHeap, HashSet};

use tracing::debug;
use uuid::Uuid;

use crate::mot::blob::Blob;
use crate::mot::simple_queue::ScoredPair;
use crate::mot::{MovingObject, Track, TrackerError};
use crate::params::ObjectParams;
use crate::utils::euclidean_distance;

/// Result of matching one frame's observations against the active tracks
#[derive(Debug, Default)]
pub struct AssignmentOutcome {
    /// Tracks that received an observation in this frame
    pub continued: Vec<Uuid>,
    /// Tracks started from unmatched observations
    pub started: Vec<Uuid>,
    /// Tracks without a match, in reverse order of their former position
    pub finalized: Vec<Track<MovingObject>>,
}

/// Relative area difference of two sizes, zero if both vanish
fn area_score(area1: f64, area2: f64) -> f64 {
    let sum = area1 + area2;
    if sum > 0.0 {
        (area1 - area2).abs() / sum
    } else {
        0.0
    }
}

/// `weight * value` that treats a zero weight as switching the term off
fn weighted(weight: f64, value: f64) -> f64 {
    if weight == 0.0 {
        0.0
    } else {
        weight * value
    }
}

/// Builds the observation x track score matrix. A score of one corresponds to the
/// largest acceptable combination of displacement and area change.
pub fn score_matrix(
    observations: &[MovingObject],
    tracks: &[Track<MovingObject>],
    params: &ObjectParams,
) -> Vec<Vec<f64>> {
    let alpha = params.tracking_weight;
    let predictions: Vec<_> = tracks.iter().map(|t| (t.predict_position(), t.last().get_size())).collect();
    observations
        .iter()
        .map(|obj| {
            predictions
                .iter()
                .map(|(predicted, last_size)| {
                    let dist = euclidean_distance(&obj.get_pos(), predicted) / params.speed_max;
                    let area = area_score(obj.get_size(), *last_size) / params.max_rel_area_change;
                    let score = weighted(alpha, dist) + weighted(1.0 - alpha, area);
                    if score.is_nan() {
                        f64::INFINITY
                    } else {
                        score
                    }
                })
                .collect()
        })
        .collect()
}

/// Greedy matching: repeatedly takes the globally smallest remaining score until it
/// exceeds one. Equal scores are resolved by the lowest row, then the lowest column.
/// Returns `(row, column)` pairs in the order they were bound.
pub fn greedy_matches(scores: &[Vec<f64>]) -> Vec<(usize, usize)> {
    let mut priority_queue: BinaryHeap<ScoredPair> = scores
        .iter()
        .enumerate()
        .flat_map(|(row, values)| {
            values
                .iter()
                .enumerate()
                .filter(|(_, score)| **score <= 1.0)
                .map(move |(col, &score)| ScoredPair { score, row, col })
        })
        .collect();

    let mut reserved_rows: HashSet<usize> = HashSet::new();
    let mut reserved_cols: HashSet<usize> = HashSet::new();
    let mut matches = Vec::new();
    while let Some(pair) = priority_queue.pop() {
        if reserved_rows.contains(&pair.row) || reserved_cols.contains(&pair.col) {
            continue;
        }
        reserved_rows.insert(pair.row);
        reserved_cols.insert(pair.col);
        matches.push((pair.row, pair.col));
    }
    matches
}

/// Matches the observations of `frame` to `active_tracks`.
///
/// Matched tracks get the observation appended, unmatched tracks are removed
/// from `active_tracks` and returned as finalized, and every unmatched
/// observation starts a new track at the end of `active_tracks`. Nothing is
/// modified if an active track already holds `frame` or a later frame.
///
/// Basic usage:
///
/// ```
/// use burrow_track::mot::{assign_objects, MovingObject};
/// use burrow_track::params::ObjectParams;
/// use burrow_track::utils::Point;
/// let params = ObjectParams::default();
/// let mut tracks = Vec::new();
/// let outcome = assign_objects(1, vec![MovingObject::new(Point::new(10.0, 10.0), 100.0)], &mut tracks, &params).unwrap();
/// assert_eq!(outcome.started.len(), 1);
/// assert_eq!(tracks.len(), 1);
/// ```
pub fn assign_objects(
    frame: usize,
    observations: Vec<MovingObject>,
    active_tracks: &mut Vec<Track<MovingObject>>,
    params: &ObjectParams,
) -> Result<AssignmentOutcome, TrackerError> {
    if let Some(track) = active_tracks.iter().find(|t| t.last_frame() >= frame) {
        return Err(TrackerError::NonIncreasingFrame {
            last: track.last_frame(),
            new: frame,
        });
    }
    let mut outcome = AssignmentOutcome::default();

    if observations.is_empty() {
        // nothing found => end all current tracks
        outcome.finalized = active_tracks.drain(..).rev().collect();
        return Ok(outcome);
    }

    let scores = score_matrix(&observations, active_tracks, params);
    let matches = greedy_matches(&scores);

    let mut observation_matched = vec![false; observations.len()];
    let mut track_matched = vec![false; active_tracks.len()];
    for &(i_f, i_e) in &matches {
        active_tracks[i_e].append(frame, observations[i_f])?;
        observation_matched[i_f] = true;
        track_matched[i_e] = true;
        outcome.continued.push(active_tracks[i_e].get_id());
    }

    // end tracks that had no match; walk backwards since we remove items
    for i_e in (0..active_tracks.len()).rev() {
        if !track_matched[i_e] {
            outcome.finalized.push(active_tracks.remove(i_e));
        }
    }

    for (obj, matched) in observations.into_iter().zip(observation_matched) {
        if !matched {
            let track = Track::new(frame, obj);
            outcome.started.push(track.get_id());
            active_tracks.push(track);
        }
    }

    debug!(
        frame,
        continued = outcome.continued.len(),
        started = outcome.started.len(),
        finalized = outcome.finalized.len(),
        "assigned objects"
    );
    Ok(outcome)
}
