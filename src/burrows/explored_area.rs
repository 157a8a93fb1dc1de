use image::{GrayImage, Luma};

use crate::utils::raster::Labels;

/// Per pixel memory of where tracked objects have been. A pixel is set to one
/// when an object covers it and then slowly decays towards zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ExploredArea {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl ExploredArea {
    pub fn new(width: u32, height: u32) -> Self {
        ExploredArea {
            width,
            height,
            values: vec![0.0; (width as usize) * (height as usize)],
        }
    }
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }
    /// Value at a pixel, zero outside the map
    pub fn value_at(&self, x: i32, y: i32) -> f32 {
        self.index(x, y).map_or(0.0, |k| self.values[k])
    }
    /// Marks every pixel carrying one of `labels` as just explored
    pub fn mark_labels(&mut self, labels: &Labels, marked: &[u32]) {
        if marked.is_empty() || (labels.width, labels.height) != (self.width, self.height) {
            return;
        }
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let label = labels.get(x, y);
                if label > 0 && marked.contains(&label) {
                    if let Some(k) = self.index(x, y) {
                        self.values[k] = 1.0;
                    }
                }
            }
        }
    }
    /// Marks all foreground pixels of a mask as just explored
    pub fn mark_mask(&mut self, mask: &GrayImage) {
        for (x, y, pixel) in mask.enumerate_pixels() {
            if pixel[0] > 0 {
                if let Some(k) = self.index(x as i32, y as i32) {
                    self.values[k] = 1.0;
                }
            }
        }
    }
    /// Lowers the map by `rate_inside` where `burrows` is set and by
    /// `rate_outside` elsewhere. Values never drop below zero.
    pub fn decay(&mut self, burrows: &GrayImage, rate_inside: f64, rate_outside: f64) {
        let (rate_inside, rate_outside) = (rate_inside as f32, rate_outside as f32);
        let same_size = burrows.dimensions() == (self.width, self.height);
        for (k, value) in self.values.iter_mut().enumerate() {
            let inside = same_size && burrows.as_raw()[k] > 0;
            let rate = if inside { rate_inside } else { rate_outside };
            *value = (*value - rate).max(0.0);
        }
    }
    fn threshold_mask(&self, predicate: impl Fn(f32) -> bool) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let value = self.values[y as usize * self.width as usize + x as usize];
            Luma([if predicate(value) { 255 } else { 0 }])
        })
    }
    /// Pixels visited at some point that have not decayed yet
    pub fn explored_mask(&self) -> GrayImage {
        self.threshold_mask(|v| v > 0.0)
    }
    pub fn unexplored_mask(&self) -> GrayImage {
        self.threshold_mask(|v| v <= 0.0)
    }
}
