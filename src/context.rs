//! Per-run state shared by the engines of one pass: the calibrated colors,
//! the edge templates derived from them and reusable raster buffers.
use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::params::{ColorParams, Parameters};

/// Intensity estimates of sand and burrow (or sky) in the background image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorEstimate {
    pub sand: f64,
    pub burrow: f64,
}

impl From<&ColorParams> for ColorEstimate {
    fn from(params: &ColorParams) -> Self {
        ColorEstimate {
            sand: params.sand,
            burrow: params.burrow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    /// burrow to sand when walking along the profile
    Up,
    /// sand to burrow
    Down,
}

/// Sigmoidal edge profiles matched against line scans
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeTemplates {
    up: Vec<f64>,
    down: Vec<f64>,
    half_width: usize,
}

impl EdgeTemplates {
    /// Builds templates of `2 * half_width + 1` samples with
    /// `half_width = floor(2 * edge_width)`
    pub fn new(edge_width: f64, colors: &ColorEstimate) -> Self {
        let half_width = (2.0 * edge_width).max(0.0) as usize;
        let up: Vec<f64> = (0..=2 * half_width)
            .map(|k| {
                let x = k as f64 - half_width as f64;
                let s = if edge_width > 0.0 {
                    0.5 * (1.0 + (x / edge_width).tanh())
                } else {
                    0.5
                };
                colors.burrow + (colors.sand - colors.burrow) * s
            })
            .collect();
        let down = up.iter().rev().copied().collect();
        EdgeTemplates { up, down, half_width }
    }
    pub fn get(&self, direction: EdgeDirection) -> &[f64] {
        match direction {
            EdgeDirection::Up => &self.up,
            EdgeDirection::Down => &self.down,
        }
    }
    pub fn half_width(&self) -> usize {
        self.half_width
    }
}

/// Explicit replacement for module level caches: created once per pass and
/// handed to the engines
#[derive(Debug, Clone)]
pub struct RunContext {
    params: Parameters,
    colors: ColorEstimate,
    templates: EdgeTemplates,
    scratch: GrayImage,
}

impl RunContext {
    pub fn new(params: Parameters) -> Self {
        let colors = ColorEstimate::from(&params.colors);
        let templates = EdgeTemplates::new(params.burrows.fitting_edge_width, &colors);
        RunContext {
            params,
            colors,
            templates,
            scratch: GrayImage::new(0, 0),
        }
    }
    pub fn params(&self) -> &Parameters {
        &self.params
    }
    pub fn colors(&self) -> &ColorEstimate {
        &self.colors
    }
    /// Replaces the color estimate and rebuilds the templates depending on it
    pub fn set_colors(&mut self, colors: ColorEstimate) {
        if colors != self.colors {
            self.colors = colors;
            self.templates = EdgeTemplates::new(self.params.burrows.fitting_edge_width, &self.colors);
        }
    }
    pub fn templates(&self) -> &EdgeTemplates {
        &self.templates
    }
    /// Cleared mask of the given size. The allocation is kept between calls.
    pub fn scratch_mask(&mut self, width: u32, height: u32) -> &mut GrayImage {
        if self.scratch.dimensions() != (width, height) {
            self.scratch = GrayImage::new(width, height);
        } else {
            self.scratch.fill(0);
        }
        &mut self.scratch
    }
}
