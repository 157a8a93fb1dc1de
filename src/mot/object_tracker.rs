use image::GrayImage;
use tracing::{debug, info};
use uuid::Uuid;

use crate::mot::blob::Blob;
use crate::mot::{assign_objects, MovingObject, Track, TrackList, TrackerError};
use crate::params::ObjectParams;
use crate::utils::raster::{label_components, Labels};

/// Finds the moving objects in a binary motion mask.
///
/// Connected regions smaller than `area_max` are candidates; those larger than
/// `area_min` become objects. If no region is large enough the largest one is
/// returned on its own.
pub fn objects_from_mask(mask: &GrayImage, params: &ObjectParams) -> Vec<MovingObject> {
    objects_from_labels(&label_components(mask), params)
}

/// Same as [`objects_from_mask`] for an already labelled mask. Object labels
/// refer to `labels`.
pub fn objects_from_labels(labels: &Labels, params: &ObjectParams) -> Vec<MovingObject> {
    let candidates: Vec<MovingObject> = labels
        .moments()
        .into_iter()
        .enumerate()
        .filter(|(_, (area, _))| *area > 0 && (*area as f64) < params.area_max)
        .map(|(idx, (area, center))| MovingObject::new(center, area as f64).with_label(idx as u32 + 1))
        .collect();

    let objects: Vec<MovingObject> = candidates
        .iter()
        .filter(|obj| obj.get_size() > params.area_min)
        .copied()
        .collect();
    if !objects.is_empty() {
        return objects;
    }
    candidates
        .into_iter()
        .fold(None, |best: Option<MovingObject>, obj| match best {
            Some(b) if b.get_size() >= obj.get_size() => Some(b),
            _ => Some(obj),
        })
        .into_iter()
        .collect()
}

/// Frame sequential tracker of moving objects
pub struct ObjectTracker {
    params: ObjectParams,
    // Tracks that matched in the last processed frame
    active: Vec<Track<MovingObject>>,
    // Storage of finished tracks
    finished: TrackList<MovingObject>,
    // First frame in which any track was found to move
    moved_first_in_frame: Option<usize>,
    // Most recent frame passed to match_objects
    last_frame: Option<usize>,
}

impl ObjectTracker {
    /// Creates new instance of ObjectTracker
    ///
    /// Basic usage:
    ///
    /// ```
    /// use burrow_track::mot::ObjectTracker;
    /// use burrow_track::params::ObjectParams;
    /// let tracker = ObjectTracker::new(ObjectParams::default());
    /// assert!(tracker.active_tracks().is_empty());
    /// ```
    pub fn new(params: ObjectParams) -> Self {
        ObjectTracker {
            params,
            active: Vec::new(),
            finished: TrackList::new(),
            moved_first_in_frame: None,
            last_frame: None,
        }
    }
    pub fn active_tracks(&self) -> &[Track<MovingObject>] {
        &self.active
    }
    pub fn finished_tracks(&self) -> &TrackList<MovingObject> {
        &self.finished
    }
    pub fn moved_first_in_frame(&self) -> Option<usize> {
        self.moved_first_in_frame
    }
    /// Active or finished track with the given id
    pub fn get_track(&self, id: Uuid) -> Result<&Track<MovingObject>, TrackerError> {
        self.active
            .iter()
            .find(|t| t.get_id() == id)
            .or_else(|| self.finished.get(id))
            .ok_or_else(|| TrackerError::NoObject(format!("no track with id {}", id)))
    }
    /// Objects observed in `frame`
    pub fn current_objects(&self, frame: usize) -> Vec<MovingObject> {
        self.active
            .iter()
            .filter(|t| t.last_frame() == frame)
            .map(|t| *t.last())
            .collect()
    }
    /// The largest object of `frame` belonging to a moving track, if any
    pub fn main_object(&self, frame: usize) -> Option<MovingObject> {
        self.active
            .iter()
            .filter(|t| t.last_frame() == frame && t.is_moving(self.params.moving_distance))
            .map(|t| *t.last())
            .fold(None, |best: Option<MovingObject>, obj| match best {
                Some(b) if b.get_size() >= obj.get_size() => Some(b),
                _ => Some(obj),
            })
    }
    /// Matches new objects to existing tracks
    pub fn match_objects(&mut self, frame: usize, objects: Vec<MovingObject>) -> Result<(), TrackerError> {
        if let Some(last) = self.last_frame.filter(|&last| last >= frame) {
            return Err(TrackerError::NonIncreasingFrame { last, new: frame });
        }
        let outcome = assign_objects(frame, objects, &mut self.active, &self.params)?;
        for track in outcome.finalized {
            debug!(id = %track.get_id(), frames = track.len(), "object track finished");
            self.finished.push(track);
        }
        self.limit_moving_tracks(frame);
        self.last_frame = Some(frame);
        Ok(())
    }
    /// Keeps only the `max_count` largest moving tracks once anything moves
    fn limit_moving_tracks(&mut self, frame: usize) {
        let mut moving: Vec<usize> = (0..self.active.len())
            .filter(|&i| self.active[i].is_moving(self.params.moving_distance))
            .collect();
        if moving.is_empty() {
            return;
        }
        if self.moved_first_in_frame.is_none() {
            info!(frame, "first object movement");
            self.moved_first_in_frame = Some(frame);
        }

        // stable sort, equally sized tracks keep their order
        moving.sort_by(|&a, &b| {
            self.active[b]
                .last()
                .get_size()
                .total_cmp(&self.active[a].last().get_size())
        });
        moving.truncate(self.params.max_count);

        for i in (0..self.active.len()).rev() {
            if !moving.contains(&i) {
                let track = self.active.remove(i);
                debug!(id = %track.get_id(), frames = track.len(), "object track dropped by side policy");
                self.finished.push(track);
            }
        }
    }
    /// Moves all active tracks to the finished list
    pub fn end_current_tracks(&mut self) {
        let n = self.active.len();
        self.finished.extend(self.active.drain(..).rev());
        if n > 0 {
            debug!(count = n, "flushed object tracks");
        }
    }
    /// Flushes and hands out all tracks
    pub fn into_tracks(mut self) -> TrackList<MovingObject> {
        self.end_current_tracks();
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Point;
    use image::Luma;

    fn object(x: f64, y: f64, size: f64) -> MovingObject {
        MovingObject::new(Point::new(x, y), size)
    }

    fn square_mask(squares: &[(u32, u32, u32)]) -> GrayImage {
        let mut mask = GrayImage::new(100, 100);
        for &(x0, y0, side) in squares {
            for y in y0..y0 + side {
                for x in x0..x0 + side {
                    mask.put_pixel(x, y, Luma([255]));
                }
            }
        }
        mask
    }

    #[test]
    fn test_objects_from_mask() {
        let params = ObjectParams::default();
        let mask = square_mask(&[(10, 10, 20), (60, 60, 5)]);
        let objects = objects_from_mask(&mask, &params);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].get_size(), 400.0);
        assert_eq!(objects[0].get_pos(), Point::new(19.5, 19.5));
        assert_eq!(objects[0].get_label(), Some(1));
    }

    #[test]
    fn test_objects_from_mask_falls_back_to_largest() {
        let params = ObjectParams::default();
        let mask = square_mask(&[(10, 10, 4), (60, 60, 6)]);
        let objects = objects_from_mask(&mask, &params);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].get_size(), 36.0);
        assert!(objects_from_mask(&GrayImage::new(10, 10), &params).is_empty());
    }

    #[test]
    fn test_match_objects_naive() {
        let mut tracker = ObjectTracker::new(ObjectParams::default());
        let mouse = vec![object(10.0, 50.0, 300.0), object(18.0, 52.0, 310.0), object(26.0, 55.0, 305.0)];
        let other = vec![object(80.0, 20.0, 150.0), object(81.0, 20.0, 150.0), object(82.0, 21.0, 152.0)];
        for (frame, (m, o)) in itertools::izip!(mouse, other).enumerate() {
            tracker.match_objects(frame, vec![m, o]).unwrap();
        }
        // only the mouse moved, so the other track was dropped
        assert_eq!(tracker.active_tracks().len(), 1);
        assert_eq!(tracker.moved_first_in_frame(), Some(2));
        assert_eq!(tracker.main_object(2), Some(object(26.0, 55.0, 305.0)));
        let tracks = tracker.into_tracks();
        assert_eq!(tracks.len(), 2);
        for track in &tracks {
            assert_eq!(track.frames(), &[0, 1, 2]);
        }
    }

    #[test]
    fn test_side_policy_keeps_largest_moving_track() {
        let mut tracker = ObjectTracker::new(ObjectParams::default());
        tracker
            .match_objects(0, vec![object(10.0, 10.0, 300.0), object(100.0, 100.0, 200.0)])
            .unwrap();
        assert_eq!(tracker.active_tracks().len(), 2);
        // the first object moves, the second stays put
        tracker
            .match_objects(1, vec![object(25.0, 10.0, 300.0), object(100.0, 100.0, 200.0)])
            .unwrap();
        assert_eq!(tracker.active_tracks().len(), 1);
        assert_eq!(tracker.active_tracks()[0].last().get_pos(), Point::new(25.0, 10.0));
        assert_eq!(tracker.finished_tracks().len(), 1);
        let dropped = tracker.finished_tracks().iter().next().unwrap().get_id();
        assert_eq!(tracker.get_track(dropped).unwrap().len(), 2);
        assert!(matches!(tracker.get_track(Uuid::new_v4()), Err(TrackerError::NoObject(_))));
    }

    #[test]
    fn test_missing_objects_end_tracks() {
        let mut tracker = ObjectTracker::new(ObjectParams::default());
        tracker.match_objects(0, vec![object(10.0, 10.0, 300.0)]).unwrap();
        tracker.match_objects(1, vec![]).unwrap();
        assert!(tracker.active_tracks().is_empty());
        assert_eq!(tracker.finished_tracks().len(), 1);
        assert!(tracker.match_objects(2, vec![object(10.0, 10.0, 300.0)]).is_ok());
        assert!(matches!(
            tracker.match_objects(2, vec![object(10.0, 10.0, 300.0)]),
            Err(TrackerError::NonIncreasingFrame { last: 2, new: 2 })
        ));
    }

    #[test]
    fn test_frame_order_survives_flush() {
        let mut tracker = ObjectTracker::new(ObjectParams::default());
        tracker.match_objects(0, vec![object(10.0, 10.0, 300.0)]).unwrap();
        tracker.match_objects(1, vec![]).unwrap();
        assert!(tracker.active_tracks().is_empty());
        // no active track is left, the tracker still remembers frame 1
        for frame in [0, 1] {
            assert!(matches!(
                tracker.match_objects(frame, vec![object(10.0, 10.0, 300.0)]),
                Err(TrackerError::NonIncreasingFrame { last: 1, .. })
            ));
        }
        assert!(tracker.active_tracks().is_empty());
        assert_eq!(tracker.finished_tracks().len(), 1);
        assert!(tracker.match_objects(2, vec![]).is_ok());
    }
}
