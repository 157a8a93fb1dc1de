//! Segmentation based refinement of bulky burrows.
//!
//! The pixels around the burrow are seeded with four classes: certain
//! background far from the burrow, probable background close to it, probable
//! foreground inside it and certain foreground in its eroded core. Each class
//! of the two-class model (burrow / sand) is a Gaussian in intensity space.
//! The probable pixels are then relabelled by iterated conditional modes with
//! a contrast sensitive Potts penalty between 4-neighbours.
use image::GrayImage;
use tracing::debug;

use crate::burrows::{ensure_centerline, extract_burrow, Burrow, FrameView, RefinementError};
use crate::context::RunContext;
use crate::utils::curves::translate_points;
use crate::utils::raster::{clip_rect, count_nonzero, dilate, erode, fill_polygon};

/// Lower bound of the class variances, keeps uniform classes finite
const VARIANCE_MIN: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Seed {
    Background,
    ProbableBackground,
    ProbableForeground,
    Foreground,
}

impl Seed {
    fn is_fixed(self) -> bool {
        matches!(self, Seed::Background | Seed::Foreground)
    }
    fn is_foreground(self) -> bool {
        matches!(self, Seed::ProbableForeground | Seed::Foreground)
    }
}

#[derive(Debug, Clone, Copy)]
struct GaussianModel {
    mean: f64,
    variance: f64,
}

impl GaussianModel {
    fn fit(values: impl Iterator<Item = f64>) -> Option<Self> {
        let (mut n, mut sum, mut sum2) = (0usize, 0.0, 0.0);
        for v in values {
            n += 1;
            sum += v;
            sum2 += v * v;
        }
        if n == 0 {
            return None;
        }
        let mean = sum / n as f64;
        let variance = (sum2 / n as f64 - mean * mean).max(VARIANCE_MIN);
        Some(GaussianModel { mean, variance })
    }
    /// Negative log likelihood of an intensity
    fn cost(&self, value: f64) -> f64 {
        0.5 * (2.0 * std::f64::consts::PI * self.variance).ln() + (value - self.mean).powi(2) / (2.0 * self.variance)
    }
}

fn neighbours(i: usize, width: usize, height: usize) -> impl Iterator<Item = usize> {
    let (x, y) = (i % width, i / width);
    [
        (x > 0).then(|| i - 1),
        (x + 1 < width).then(|| i + 1),
        (y > 0).then(|| i - width),
        (y + 1 < height).then(|| i + width),
    ]
    .into_iter()
    .flatten()
}

/// Contrast parameter of the pairwise penalty, the inverse of twice the mean
/// squared intensity difference between neighbours
fn contrast_beta(intensities: &[f64], width: usize, height: usize) -> f64 {
    let (mut sum, mut count) = (0.0, 0usize);
    for i in 0..intensities.len() {
        for j in neighbours(i, width, height).filter(|&j| j > i) {
            sum += (intensities[i] - intensities[j]).powi(2);
            count += 1;
        }
    }
    if count == 0 || sum == 0.0 {
        0.0
    } else {
        count as f64 / (2.0 * sum)
    }
}

/// Two-class labelling of the seeded pixels. Returns `true` for foreground.
fn segment(
    intensities: &[f64],
    seeds: &[Seed],
    width: usize,
    height: usize,
    smoothness: f64,
    iterations: usize,
) -> Result<Vec<bool>, RefinementError> {
    let beta = contrast_beta(intensities, width, height);
    let mut labels: Vec<bool> = seeds.iter().map(|s| s.is_foreground()).collect();
    let n = labels.len();

    for round in 0..iterations {
        let fit = |foreground: bool| {
            GaussianModel::fit(
                labels
                    .iter()
                    .zip(intensities)
                    .filter(|(&l, _)| l == foreground)
                    .map(|(_, &v)| v),
            )
        };
        let (Some(model_fg), Some(model_bg)) = (fit(true), fit(false)) else {
            return Err(RefinementError::SegmentationError(format!(
                "one class became empty in round {}",
                round
            )));
        };

        // alternate the sweep direction so labels can spread both ways
        let order: Vec<usize> = if round % 2 == 0 {
            (0..n).collect()
        } else {
            (0..n).rev().collect()
        };
        for i in order {
            if seeds[i].is_fixed() {
                continue;
            }
            let value = intensities[i];
            let mut cost_fg = model_fg.cost(value);
            let mut cost_bg = model_bg.cost(value);
            for j in neighbours(i, width, height) {
                let penalty = smoothness * (-beta * (value - intensities[j]).powi(2)).exp();
                if labels[j] {
                    cost_bg += penalty;
                } else {
                    cost_fg += penalty;
                }
            }
            if cost_fg < cost_bg {
                labels[i] = true;
            } else if cost_bg < cost_fg {
                labels[i] = false;
            }
        }
    }
    Ok(labels)
}

/// Refines a bulky burrow by segmenting the background image around it.
///
/// `previous` is the last known burrow at this place; its area counts as
/// probable burrow, too. Pixels above ground or never explored never become
/// part of the result.
pub fn refine_bulky_burrow(
    burrow: &Burrow,
    previous: Option<&Burrow>,
    view: &FrameView,
    context: &RunContext,
) -> Result<Burrow, RefinementError> {
    let params = &context.params().burrows;
    let (frame_width, frame_height) = view.background.dimensions();
    let rect = burrow.bounding_rect(5.0 * params.width_min);
    let (rx, ry, width, height) = clip_rect(&rect, frame_width, frame_height)
        .ok_or_else(|| RefinementError::SegmentationError("burrow lies outside of the frame".to_string()))?;
    let (ox, oy) = (rx as f64, ry as f64);

    let mask_ground = view.ground.translated(-ox, -oy).mask(width, height);
    let mut mask_burrow = GrayImage::new(width, height);
    fill_polygon(&mut mask_burrow, &translate_points(burrow.contour(), -ox, -oy), 255);
    if let Some(previous) = previous {
        fill_polygon(&mut mask_burrow, &translate_points(previous.contour(), -ox, -oy), 255);
    }

    // everything above ground looks like sand
    let sand = context.colors().sand;
    let intensities: Vec<f64> = mask_ground
        .enumerate_pixels()
        .map(|(x, y, ground)| {
            if ground[0] > 0 {
                view.background.get_pixel(x + rx, y + ry)[0] as f64
            } else {
                sand
            }
        })
        .collect();

    let radius = params.width_min.max(0.0) as u32;
    let probable = dilate(&mask_burrow, radius);
    let mut seeds: Vec<Seed> = probable
        .pixels()
        .zip(mask_burrow.pixels())
        .map(|(near, inside)| match (near[0] > 0, inside[0] > 0) {
            (_, true) => Seed::ProbableForeground,
            (true, false) => Seed::ProbableBackground,
            _ => Seed::Background,
        })
        .collect();

    // the core of the burrow is certainly burrow, if it is large enough
    let mut core_radius = radius;
    loop {
        let core = erode(&mask_burrow, core_radius);
        if count_nonzero(&core) >= params.segmentation_core_area_min {
            for (seed, pixel) in seeds.iter_mut().zip(core.pixels()) {
                if pixel[0] > 0 {
                    *seed = Seed::Foreground;
                }
            }
            break;
        }
        if core_radius == 0 {
            break;
        }
        core_radius /= 2;
    }

    let labels = segment(
        &intensities,
        &seeds,
        width as usize,
        height as usize,
        params.segmentation_smoothness,
        params.segmentation_iterations,
    )?;

    let mask = GrayImage::from_fn(width, height, |x, y| {
        let k = (y * width + x) as usize;
        let explored = view
            .explored
            .map_or(true, |e| e.value_at((x + rx) as i32, (y + ry) as i32) > 0.0);
        let keep = labels[k] && explored && mask_ground.get_pixel(x, y)[0] > 0;
        image::Luma([if keep { 255 } else { 0 }])
    });

    let refined = extract_burrow(&mask, view.ground, (rx as i32, ry as i32), params)?;
    debug!(area = refined.area(), before = burrow.area(), "segmented bulky burrow");
    Ok(ensure_centerline(refined, view.ground, params))
}
