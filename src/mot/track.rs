use serde::Serialize;
use uuid::Uuid;

use crate::mot::blob::Blob;
use crate::mot::TrackerError;
use crate::utils::{euclidean_distance, Point};

/// Ordered sequence of `(frame index, item)` pairs forming one identity.
/// Frame indices are strictly increasing and a track is never empty.
#[derive(Debug, Clone, Serialize)]
pub struct Track<B: Blob> {
    id: Uuid,
    frames: Vec<usize>,
    items: Vec<B>,
}

impl<B: Blob> Track<B> {
    /// Starts a new track with a single item
    ///
    /// Basic usage:
    ///
    /// ```
    /// use burrow_track::mot::{MovingObject, Track};
    /// use burrow_track::utils::Point;
    /// let track = Track::new(1, MovingObject::new(Point::new(10.0, 10.0), 100.0));
    /// assert_eq!(track.len(), 1);
    /// ```
    pub fn new(frame: usize, item: B) -> Self {
        Track {
            id: Uuid::new_v4(),
            frames: vec![frame],
            items: vec![item],
        }
    }
    pub fn get_id(&self) -> Uuid {
        self.id
    }
    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    /// Appends an item observed in `frame`, which has to come after the last frame
    pub fn append(&mut self, frame: usize, item: B) -> Result<(), TrackerError> {
        let last = self.last_frame();
        if frame <= last {
            return Err(TrackerError::NonIncreasingFrame { last, new: frame });
        }
        self.frames.push(frame);
        self.items.push(item);
        Ok(())
    }
    /// Replaces the item of the last frame, e.g. after merging another item into it
    pub fn replace_last(&mut self, item: B) {
        if let Some(last) = self.items.last_mut() {
            *last = item;
        }
    }
    pub fn first(&self) -> &B {
        &self.items[0]
    }
    pub fn last(&self) -> &B {
        &self.items[self.items.len() - 1]
    }
    pub fn first_frame(&self) -> usize {
        self.frames[0]
    }
    /// Frame of the most recent item
    pub fn last_frame(&self) -> usize {
        self.frames[self.frames.len() - 1]
    }
    pub fn frames(&self) -> &[usize] {
        &self.frames
    }
    pub fn items(&self) -> &[B] {
        &self.items
    }
    pub fn iter(&self) -> impl Iterator<Item = (usize, &B)> {
        self.frames.iter().copied().zip(self.items.iter())
    }
    /// Linear extrapolation from the last two items. With a single item its
    /// position is returned.
    pub fn predict_position(&self) -> Point {
        let n = self.items.len();
        let last = self.items[n - 1].get_center();
        if n < 2 {
            return last;
        }
        let prev = self.items[n - 2].get_center();
        Point::new(2.0 * last.x - prev.x, 2.0 * last.y - prev.y)
    }
    /// Whether the track moved farther than `distance` from its start
    pub fn is_moving(&self, distance: f64) -> bool {
        self.len() > 1 && euclidean_distance(&self.first().get_center(), &self.last().get_center()) > distance
    }
    /// Whether the track was updated within `window` frames before `frame`
    pub fn is_active(&self, frame: usize, window: usize) -> bool {
        self.last_frame() + window >= frame
    }
}

/// Insertion ordered collection owning finished (and in-progress) tracks
#[derive(Debug, Clone, Serialize)]
pub struct TrackList<B: Blob> {
    tracks: Vec<Track<B>>,
}

impl<B: Blob> Default for TrackList<B> {
    fn default() -> Self {
        TrackList { tracks: Vec::new() }
    }
}

impl<B: Blob> TrackList<B> {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn push(&mut self, track: Track<B>) {
        self.tracks.push(track);
    }
    pub fn len(&self) -> usize {
        self.tracks.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Track<B>> {
        self.tracks.iter()
    }
    pub fn get(&self, id: Uuid) -> Option<&Track<B>> {
        self.tracks.iter().find(|t| t.get_id() == id)
    }
    pub fn into_vec(self) -> Vec<Track<B>> {
        self.tracks
    }
}

impl<B: Blob> Extend<Track<B>> for TrackList<B> {
    fn extend<I: IntoIterator<Item = Track<B>>>(&mut self, iter: I) {
        self.tracks.extend(iter);
    }
}

impl<'a, B: Blob> IntoIterator for &'a TrackList<B> {
    type Item = &'a Track<B>;
    type IntoIter = std::slice::Iter<'a, Track<B>>;
    fn into_iter(self) -> Self::IntoIter {
        self.tracks.iter()
    }
}
