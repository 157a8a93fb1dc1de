use tracing::{debug, info, warn};

use crate::burrows::{compute_centerline, Burrow, MouseTrail};
use crate::ground::GroundProfile;
use crate::mot::{Track, TrackList, TrackerError};
use crate::params::BurrowParams;
use crate::utils::curves::curve_length;
use crate::utils::polygon::{buffer_curve, clip_curve, intersect_polygons, union_polygons};
use crate::utils::Rect;

/// What happened to the tracks while reconciling one frame
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Number of tracks started
    pub started: usize,
    /// Number of tracks that received a burrow
    pub extended: usize,
    /// Tracks merged into another track. They never continue.
    pub retired: Vec<Track<Burrow>>,
}

/// Indices of the tracks that are recent enough and overlap with `burrow`
fn matching_tracks(tracks: &[Track<Burrow>], burrow: &Burrow, frame: usize, window: usize) -> Vec<usize> {
    (0..tracks.len())
        .filter(|&i| tracks[i].is_active(frame, window) && tracks[i].last().intersects(burrow))
        .collect()
}

/// The matched track with the longest current burrow, the first one on ties
fn longest_track(tracks: &[Track<Burrow>], matches: &[usize]) -> Option<usize> {
    matches.iter().copied().fold(None, |best: Option<usize>, i| match best {
        Some(b) if tracks[b].last().length() >= tracks[i].last().length() => Some(b),
        _ => Some(i),
    })
}

/// Unites `burrow` with all `others`. Unions without a valid outline are skipped.
fn merge_burrows<'a>(burrow: Burrow, others: impl IntoIterator<Item = &'a Burrow>) -> Burrow {
    others.into_iter().fold(burrow, |merged, other| match merged.merge(other) {
        Ok(result) => result,
        Err(err) => {
            warn!(error = %err, "could not merge burrows");
            merged
        }
    })
}

fn check_frame_order(tracks: &[Track<Burrow>], frame: usize) -> Result<(), TrackerError> {
    match tracks.iter().map(|t| t.last_frame()).max() {
        Some(last) if last > frame => Err(TrackerError::NonIncreasingFrame { last, new: frame }),
        _ => Ok(()),
    }
}

/// Attaches a burrow to the longest matched track (or a new one) and retires
/// the other matched tracks
fn attach_burrow(
    frame: usize,
    burrow: Burrow,
    matches: &[usize],
    tracks: &mut Vec<Track<Burrow>>,
    outcome: &mut ReconcileOutcome,
) -> Result<(), TrackerError> {
    let Some(target) = longest_track(tracks, matches) else {
        debug!(frame, x = burrow.centroid().x, y = burrow.centroid().y, "new burrow");
        tracks.push(Track::new(frame, burrow));
        outcome.started += 1;
        return Ok(());
    };

    if tracks[target].last_frame() == frame {
        // a second burrow of this frame ends up in the same track
        let merged = merge_burrows(burrow, [tracks[target].last()]);
        tracks[target].replace_last(merged);
    } else {
        tracks[target].append(frame, burrow)?;
        outcome.extended += 1;
    }

    let mut others: Vec<usize> = matches.iter().copied().filter(|&i| i != target).collect();
    others.sort_unstable_by(|a, b| b.cmp(a));
    for i in others {
        let track = tracks.remove(i);
        debug!(frame, id = %track.get_id(), "burrow track merged into another");
        outcome.retired.push(track);
    }
    Ok(())
}

/// Reconciles the burrows found in `frame` with the burrow tracks.
///
/// A candidate belongs to every track that was updated within the adaptation
/// interval and whose last burrow overlaps it. Without such a track a new one
/// starts. With several of them the candidate and their burrows are united
/// and appended to the track holding the longest burrow; the other tracks
/// are removed from `tracks` and handed back in the outcome.
pub fn reconcile_burrow_tracks(
    frame: usize,
    candidates: Vec<Burrow>,
    tracks: &mut Vec<Track<Burrow>>,
    params: &BurrowParams,
) -> Result<ReconcileOutcome, TrackerError> {
    check_frame_order(tracks, frame)?;
    let mut outcome = ReconcileOutcome::default();
    for candidate in candidates {
        let matches = matching_tracks(tracks, &candidate, frame, params.adaptation_interval);
        let burrow = if matches.len() > 1 {
            merge_burrows(candidate, matches.iter().map(|&i| tracks[i].last()))
        } else {
            candidate
        };
        attach_burrow(frame, burrow, &matches, tracks, &mut outcome)?;
    }
    Ok(outcome)
}

/// Owner of all burrow tracks of a pass.
///
/// Burrows either come from explored area detection via [`BurrowTracker::update`]
/// or are grown along the trail of an object. Grown burrows are kept as
/// working burrows and stored into the tracks every adaptation interval.
pub struct BurrowTracker {
    params: BurrowParams,
    active: Vec<Track<Burrow>>,
    finished: TrackList<Burrow>,
    working: Vec<Burrow>,
}

impl BurrowTracker {
    pub fn new(params: BurrowParams) -> Self {
        BurrowTracker {
            params,
            active: Vec::new(),
            finished: TrackList::new(),
            working: Vec::new(),
        }
    }
    pub fn active_tracks(&self) -> &[Track<Burrow>] {
        &self.active
    }
    pub fn finished_tracks(&self) -> &TrackList<Burrow> {
        &self.finished
    }
    pub fn working_burrows(&self) -> &[Burrow] {
        &self.working
    }
    /// Last burrows of the tracks updated within the adaptation interval
    pub fn active_burrows(&self, frame: usize) -> impl Iterator<Item = &Burrow> + '_ {
        let window = self.params.adaptation_interval;
        self.active
            .iter()
            .filter(move |t| t.is_active(frame, window))
            .map(|t| t.last())
    }
    /// Last burrow of the first active track overlapping `burrow`
    pub fn previous_burrow(&self, frame: usize, burrow: &Burrow) -> Option<&Burrow> {
        self.active_burrows(frame).find(|b| b.intersects(burrow))
    }
    /// Reconciles the burrows of `frame` and retires outdated tracks. Tracks
    /// merged into others go to the finished tracks right away.
    pub fn update(&mut self, frame: usize, candidates: Vec<Burrow>) -> Result<ReconcileOutcome, TrackerError> {
        let mut outcome = reconcile_burrow_tracks(frame, candidates, &mut self.active, &self.params)?;
        self.finished.extend(outcome.retired.drain(..));
        self.retire_inactive(frame);
        Ok(outcome)
    }
    /// Moves tracks that were not updated within the adaptation interval to
    /// the finished tracks
    pub fn retire_inactive(&mut self, frame: usize) {
        let window = self.params.adaptation_interval;
        let mut i = 0;
        while i < self.active.len() {
            if self.active[i].is_active(frame, window) {
                i += 1;
            } else {
                let track = self.active.remove(i);
                debug!(frame, id = %track.get_id(), frames = track.len(), "burrow track finished");
                self.finished.push(track);
            }
        }
    }
    /// Grows the working burrows along the trail of an underground object.
    ///
    /// The first working burrow near the trail takes up the trail buffered by
    /// the minimal burrow width, limited to the frame interior, and absorbs
    /// all other working burrows near the trail. The trail replaces its
    /// centerline if it is longer. Without any burrow near the trail a new one
    /// is started from the buffered trail.
    pub fn grow_with_trail(&mut self, trail: &MouseTrail, frame_size: (u32, u32)) {
        let points = trail.points();
        if points.len() < 2 {
            return;
        }
        let buffered = buffer_curve(points, self.params.width_min);
        let touching: Vec<usize> = (0..self.working.len())
            .filter(|&i| self.working[i].distance_to_curve(points) < self.params.width)
            .collect();

        let index = match touching.first() {
            None => match Burrow::with_centerline(buffered, points.to_vec(), false) {
                Ok(burrow) => {
                    debug!(length = burrow.length(), "burrow started by trail");
                    self.working.push(burrow);
                    self.working.len() - 1
                }
                Err(err) => {
                    debug!(error = %err, "trail does not form a burrow");
                    return;
                }
            },
            Some(&first) => {
                let (w, h) = frame_size;
                let interior = Rect::new(1.0, 1.0, w as f64 - 2.0, h as f64 - 2.0).corners();
                let burrow = &self.working[first];
                let contour = intersect_polygons(&union_polygons(&[burrow.contour(), &buffered]), &interior);
                let mut grown = match burrow.with_contour(contour) {
                    Ok(grown) => grown,
                    Err(err) => {
                        debug!(error = %err, "could not extend burrow by trail");
                        burrow.clone()
                    }
                };
                if trail.length() > grown.length() {
                    grown = grown.set_centerline(points.to_vec());
                }
                let others: Vec<Burrow> = touching[1..].iter().map(|&i| self.working[i].clone()).collect();
                self.working[first] = merge_burrows(grown, others.iter());
                for &i in touching[1..].iter().rev() {
                    self.working.remove(i);
                }
                first
            }
        };
        self.working[index] = self.working[index].simplify_outline(self.params.trail_simplification_threshold);
    }
    /// Stores the working burrows in the tracks.
    ///
    /// Every working burrow is united with the burrows of all active tracks it
    /// overlaps and cut to the region below ground. Its centerline is clipped
    /// to that region, too, and starts on the ground line again. The burrows
    /// of this frame become the new working burrows.
    pub fn store_working_burrows(
        &mut self,
        frame: usize,
        ground: &GroundProfile,
        frame_size: (u32, u32),
    ) -> Result<ReconcileOutcome, TrackerError> {
        check_frame_order(&self.active, frame)?;
        let ground_polygon = ground.polygon_points(frame_size.0, frame_size.1);
        let mut outcome = ReconcileOutcome::default();

        for burrow in std::mem::take(&mut self.working) {
            let matches = matching_tracks(&self.active, &burrow, frame, self.params.adaptation_interval);
            let burrow = if matches.len() > 1 {
                merge_burrows(burrow, matches.iter().map(|&i| self.active[i].last()))
            } else {
                burrow
            };

            let contour = intersect_polygons(burrow.contour(), &ground_polygon);
            let Ok(clipped) = Burrow::new(contour) else {
                debug!(frame, "working burrow lies above ground");
                continue;
            };

            let longest_piece = burrow
                .centerline()
                .map(|line| clip_curve(line, &ground_polygon))
                .unwrap_or_default()
                .into_iter()
                .max_by(|a, b| curve_length(a).total_cmp(&curve_length(b)));
            let centerline = match longest_piece {
                Some(mut line) if curve_length(&line) > 1.0 => {
                    line[0] = ground.projection(&line[0]);
                    line
                }
                // the centerline vanished
                _ => compute_centerline(clipped.contour(), ground, &self.params),
            };
            let stored = if centerline.len() >= 2 {
                clipped.set_centerline(centerline)
            } else {
                clipped
            };
            if !stored.is_valid() {
                continue;
            }
            attach_burrow(frame, stored, &matches, &mut self.active, &mut outcome)?;
        }

        self.finished.extend(outcome.retired.drain(..));
        self.working = self
            .active
            .iter()
            .filter(|t| t.last_frame() == frame)
            .map(|t| t.last().clone())
            .collect();
        if outcome.started + outcome.extended > 0 {
            info!(frame, started = outcome.started, extended = outcome.extended, "stored burrows");
        }
        Ok(outcome)
    }
    /// Moves all active tracks to the finished list
    pub fn end_current_tracks(&mut self) {
        let n = self.active.len();
        self.finished.extend(self.active.drain(..));
        self.working.clear();
        if n > 0 {
            debug!(count = n, "flushed burrow tracks");
        }
    }
    /// Flushes and hands out all tracks
    pub fn into_tracks(mut self) -> TrackList<Burrow> {
        self.end_current_tracks();
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data::{flat_ground, FRAME_HEIGHT, FRAME_WIDTH};
    use crate::utils::polygon::is_simple;
    use crate::utils::Point;

    fn rect_burrow(x: f64, y: f64, w: f64, h: f64) -> Burrow {
        Burrow::new(Rect::new(x, y, w, h).corners()).unwrap()
    }

    #[test]
    fn test_new_and_continued_tracks() {
        let params = BurrowParams::default();
        let mut tracks = Vec::new();
        let outcome = reconcile_burrow_tracks(0, vec![rect_burrow(60.0, 50.0, 20.0, 100.0)], &mut tracks, &params).unwrap();
        assert_eq!(outcome.started, 1);

        let outcome = reconcile_burrow_tracks(
            100,
            vec![rect_burrow(60.0, 50.0, 20.0, 120.0), rect_burrow(150.0, 50.0, 20.0, 50.0)],
            &mut tracks,
            &params,
        )
        .unwrap();
        assert_eq!((outcome.started, outcome.extended), (1, 1));
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].frames(), &[0, 100]);
        assert_eq!(tracks[0].last().area(), 2400.0);

        // the first track is too old to be continued
        let outcome = reconcile_burrow_tracks(201, vec![rect_burrow(60.0, 50.0, 20.0, 120.0)], &mut tracks, &params).unwrap();
        assert_eq!(outcome.started, 1);
        assert_eq!(tracks.len(), 3);

        assert!(matches!(
            reconcile_burrow_tracks(150, vec![], &mut tracks, &params),
            Err(TrackerError::NonIncreasingFrame { last: 201, new: 150 })
        ));
    }

    #[test]
    fn test_overlapping_tracks_are_merged() {
        let params = BurrowParams::default();
        let long = rect_burrow(60.0, 50.0, 20.0, 100.0)
            .set_centerline(vec![Point::new(70.0, 50.0), Point::new(70.0, 140.0)]);
        let short = rect_burrow(120.0, 50.0, 20.0, 60.0);
        let mut tracks = Vec::new();
        reconcile_burrow_tracks(0, vec![short.clone(), long.clone()], &mut tracks, &params).unwrap();
        assert_eq!(tracks.len(), 2);
        let long_id = tracks[1].get_id();

        // a connecting gallery overlaps both burrows
        let outcome = reconcile_burrow_tracks(50, vec![rect_burrow(70.0, 80.0, 60.0, 20.0)], &mut tracks, &params).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(outcome.retired.len(), 1);
        assert_eq!(tracks[0].get_id(), long_id);
        let merged = tracks[0].last();
        assert!(merged.area() >= long.area().max(short.area()));
        assert!(is_simple(merged.contour()));
        assert_eq!(merged.length(), 90.0);
    }

    #[test]
    fn test_merging_oblique_tracks_keeps_area() {
        let params = BurrowParams::default();
        let (cx, cy, r) = (100.4, 110.9, 50.33);
        let diamond = Burrow::new(vec![
            Point::new(cx, cy - r),
            Point::new(cx + r, cy),
            Point::new(cx, cy + r),
            Point::new(cx - r, cy),
        ])
        .unwrap();
        let square = rect_burrow(20.3, 100.6, 10.0, 10.0);
        let mut tracks = Vec::new();
        reconcile_burrow_tracks(0, vec![diamond.clone(), square.clone()], &mut tracks, &params).unwrap();
        assert_eq!(tracks.len(), 2);

        let gallery = Burrow::new(vec![
            Point::new(25.1, 103.2),
            Point::new(80.7, 106.9),
            Point::new(80.1, 115.4),
            Point::new(24.5, 111.7),
        ])
        .unwrap();
        let outcome = reconcile_burrow_tracks(50, vec![gallery.clone()], &mut tracks, &params).unwrap();
        assert_eq!(outcome.retired.len(), 1);
        assert_eq!(tracks.len(), 1);
        let merged = tracks[0].last();
        assert!(merged.area() >= diamond.area().max(square.area()).max(gallery.area()));
        assert!(merged.area() > diamond.area() + 50.0);
        assert!(is_simple(merged.contour()));
    }

    #[test]
    fn test_same_frame_candidates_share_track() {
        let params = BurrowParams::default();
        let mut tracker = BurrowTracker::new(params);
        tracker.update(0, vec![rect_burrow(60.0, 50.0, 40.0, 100.0)]).unwrap();
        tracker
            .update(10, vec![rect_burrow(60.0, 50.0, 20.0, 100.0), rect_burrow(75.0, 50.0, 25.0, 100.0)])
            .unwrap();
        assert_eq!(tracker.active_tracks().len(), 1);
        let track = &tracker.active_tracks()[0];
        assert_eq!(track.frames(), &[0, 10]);
        assert!(track.last().area() > 3800.0);

        tracker.update(200, vec![]).unwrap();
        assert!(tracker.active_tracks().is_empty());
        assert_eq!(tracker.into_tracks().len(), 1);
    }

    #[test]
    fn test_trail_grows_and_stores_burrows() {
        let params = BurrowParams::default();
        let ground = flat_ground();
        let size = (FRAME_WIDTH, FRAME_HEIGHT);
        let mut tracker = BurrowTracker::new(params);
        let mut trail = MouseTrail::new();
        let object_params = crate::params::ObjectParams::default();

        for y in [70.0, 85.0, 100.0] {
            trail.update(Some(Point::new(100.0, y)), &ground, &object_params);
            tracker.grow_with_trail(&trail, size);
        }
        assert_eq!(tracker.working_burrows().len(), 1);
        let grown = &tracker.working_burrows()[0];
        assert!((grown.length() - 50.0).abs() < 1e-9);
        // the buffered trail reaches above the ground line
        assert!(grown.bounding_rect(0.0).y < 45.0);

        let outcome = tracker.store_working_burrows(100, &ground, size).unwrap();
        assert_eq!(outcome.started, 1);
        let stored = tracker.active_tracks()[0].last();
        assert!(stored.bounding_rect(0.0).y >= 49.0);
        let centerline = stored.centerline().unwrap();
        assert_eq!(centerline[0], Point::new(100.0, 50.0));
        assert_eq!(tracker.working_burrows().len(), 1);

        // the object digs on, the stored burrow continues its track
        trail.update(Some(Point::new(100.0, 115.0)), &ground, &object_params);
        tracker.grow_with_trail(&trail, size);
        assert_eq!(tracker.working_burrows().len(), 1);
        let outcome = tracker.store_working_burrows(200, &ground, size).unwrap();
        assert_eq!(outcome.extended, 1);
        assert_eq!(tracker.active_tracks().len(), 1);
        assert!(tracker.active_tracks()[0].last().length() > 60.0);
    }
}
