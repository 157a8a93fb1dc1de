use serde::{Deserialize, Serialize};

use crate::mot::blob::Blob;
use crate::utils::Point;

/// One frame's detection of a moving blob. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingObject {
    pos: Point,
    size: f64,
    // index of the raster region the object was found in
    label: Option<u32>,
}

impl MovingObject {
    pub fn new(pos: Point, size: f64) -> Self {
        MovingObject { pos, size, label: None }
    }
    /// Add the label of the connected region the object was derived from
    pub fn with_label(mut self, label: u32) -> Self {
        self.label = Some(label);
        self
    }
    pub fn get_pos(&self) -> Point {
        self.pos
    }
    pub fn get_label(&self) -> Option<u32> {
        self.label
    }
}

impl Blob for MovingObject {
    fn get_center(&self) -> Point {
        self.pos
    }
    fn get_size(&self) -> f64 {
        self.size
    }
}
