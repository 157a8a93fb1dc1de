//! Synthetic frames shared by the unit tests
use image::{GrayImage, Luma};

use crate::ground::GroundProfile;
use crate::utils::{Point, Rect};

pub const FRAME_WIDTH: u32 = 200;
pub const FRAME_HEIGHT: u32 = 200;
pub const SAND: u8 = 200;
pub const BURROW: u8 = 50;

/// Horizontal ground line at y = 50 with a point every 10 pixels
pub fn flat_ground() -> GroundProfile {
    let points = (0..=20).map(|k| Point::new(10.0 * k as f64, 50.0)).collect();
    GroundProfile::new(points).unwrap()
}

/// Vertical corridor 20 wide and 100 long hanging from the ground line
pub fn corridor_contour() -> Vec<Point> {
    Rect::new(90.0, 50.0, 20.0, 100.0).corners()
}

/// Mask with the pixels `x0..=x1`, `y0..=y1` set
pub fn rect_mask(x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
    GrayImage::from_fn(FRAME_WIDTH, FRAME_HEIGHT, |x, y| {
        Luma([if x >= x0 && x <= x1 && y >= y0 && y <= y1 { 255 } else { 0 }])
    })
}

/// Background with dark burrow pixels at `x0..=x1`, `y0..=y1` and sand elsewhere
pub fn background_with_rect(x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
    GrayImage::from_fn(FRAME_WIDTH, FRAME_HEIGHT, |x, y| {
        Luma([if x >= x0 && x <= x1 && y >= y0 && y <= y1 { BURROW } else { SAND }])
    })
}

/// Background showing the corridor of [`corridor_contour`]
pub fn corridor_background() -> GrayImage {
    background_with_rect(90, 50, 110, 150)
}
