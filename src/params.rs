//! Numeric thresholds steering the engines.
//!
//! The structs deserialize from any serde format with missing fields taken
//! from the defaults, so a caller may override single values only.
use serde::{Deserialize, Serialize};

use crate::mot::TrackerError;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub objects: ObjectParams,
    pub burrows: BurrowParams,
    pub explored_area: ExploredAreaParams,
    pub colors: ColorParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectParams {
    /// Distance (pixels per frame) that maps to a distance score of one
    pub speed_max: f64,
    /// Relative area change that maps to an area score of one
    pub max_rel_area_change: f64,
    /// Weight of the distance score against the area score, in [0, 1]
    pub tracking_weight: f64,
    /// Blobs at least this large count as objects
    pub area_min: f64,
    /// Blobs at least this large are ignored
    pub area_max: f64,
    /// Number of moving tracks kept simultaneously
    pub max_count: usize,
    /// Displacement after which a track counts as moving
    pub moving_distance: f64,
    /// Typical radius of the tracked animal
    pub model_radius: f64,
}

impl Default for ObjectParams {
    fn default() -> Self {
        ObjectParams {
            speed_max: 30.0,
            max_rel_area_change: 0.5,
            tracking_weight: 0.5,
            area_min: 100.0,
            area_max: 5000.0,
            max_count: 1,
            moving_distance: 10.0,
            model_radius: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurrowParams {
    pub area_min: f64,
    /// Douglas-Peucker tolerance relative to the outline length
    pub outline_simplification_threshold: f64,
    /// Outline points closer than this to the ground are snapped onto it
    pub ground_point_distance: f64,
    /// Vertices changing the area by less than this are removed
    pub simplification_threshold_area: f64,
    pub centerline_segment_length: f64,
    pub curvature_radius_max: f64,
    /// Typical burrow width, also sets the scan length of the edge fits
    pub width: f64,
    pub width_min: f64,
    /// Width of the sigmoidal edge templates
    pub fitting_edge_width: f64,
    /// Minimal goodness of fit for accepting an edge
    pub fitting_edge_r2min: f64,
    /// Burrows longer than this and thinner than `fitting_width_threshold`
    /// are refined by line scans, all others by segmentation
    pub fitting_length_threshold: f64,
    pub fitting_width_threshold: f64,
    /// Number of parallel lines averaged in a line scan
    pub scan_width: usize,
    /// Frames between burrow updates, also the recency window of tracks
    pub adaptation_interval: usize,
    /// Border of the frame in which explored pixels are ignored
    pub cage_margin: u32,
    pub segmentation_core_area_min: usize,
    pub segmentation_iterations: usize,
    /// Penalty for neighbouring pixels with different segmentation labels
    pub segmentation_smoothness: f64,
    /// Relative tolerance for simplifying outlines grown by trails
    pub trail_simplification_threshold: f64,
}

impl Default for BurrowParams {
    fn default() -> Self {
        BurrowParams {
            area_min: 1000.0,
            outline_simplification_threshold: 0.005,
            ground_point_distance: 10.0,
            simplification_threshold_area: 50.0,
            centerline_segment_length: 15.0,
            curvature_radius_max: 30.0,
            width: 20.0,
            width_min: 10.0,
            fitting_edge_width: 3.0,
            fitting_edge_r2min: 0.5,
            fitting_length_threshold: 100.0,
            fitting_width_threshold: 30.0,
            scan_width: 3,
            adaptation_interval: 100,
            cage_margin: 30,
            segmentation_core_area_min: 500,
            segmentation_iterations: 5,
            segmentation_smoothness: 2.0,
            trail_simplification_threshold: 0.001,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExploredAreaParams {
    /// Decay per frame of the explored signal inside burrows
    pub adaptation_rate_burrows: f64,
    /// Decay per frame of the explored signal outside burrows
    pub adaptation_rate_outside: f64,
    /// Adaptation rate of the background model, sets how long an object
    /// has to be absent before a burrow tip is refined
    pub background_adaptation_rate: f64,
}

impl Default for ExploredAreaParams {
    fn default() -> Self {
        ExploredAreaParams {
            adaptation_rate_burrows: 1e-4,
            adaptation_rate_outside: 1e-3,
            background_adaptation_rate: 1e-2,
        }
    }
}

/// Intensities of the two materials in the background image, used until a
/// calibrated estimate is handed to the run context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorParams {
    pub sand: f64,
    pub burrow: f64,
}

impl Default for ColorParams {
    fn default() -> Self {
        ColorParams {
            sand: 200.0,
            burrow: 50.0,
        }
    }
}

fn check(condition: bool, name: &str, value: f64) -> Result<(), TrackerError> {
    if condition {
        Ok(())
    } else {
        Err(TrackerError::BadParameter(format!("{} has invalid value {}", name, value)))
    }
}

impl Parameters {
    /// Rejects values the engines cannot work with
    pub fn validate(&self) -> Result<(), TrackerError> {
        let o = &self.objects;
        check(o.speed_max > 0.0, "objects.speed_max", o.speed_max)?;
        check(o.max_rel_area_change > 0.0, "objects.max_rel_area_change", o.max_rel_area_change)?;
        check(
            (0.0..=1.0).contains(&o.tracking_weight),
            "objects.tracking_weight",
            o.tracking_weight,
        )?;
        check(o.area_max > o.area_min, "objects.area_max", o.area_max)?;
        check(o.max_count > 0, "objects.max_count", o.max_count as f64)?;

        let b = &self.burrows;
        check(b.area_min >= 0.0, "burrows.area_min", b.area_min)?;
        check(b.ground_point_distance > 0.0, "burrows.ground_point_distance", b.ground_point_distance)?;
        check(
            b.centerline_segment_length > 0.0,
            "burrows.centerline_segment_length",
            b.centerline_segment_length,
        )?;
        // the angular window needs segment_length <= 2 * curvature_radius
        check(
            b.curvature_radius_max * 2.0 >= b.centerline_segment_length,
            "burrows.curvature_radius_max",
            b.curvature_radius_max,
        )?;
        check(b.width > 0.0, "burrows.width", b.width)?;
        check(b.width_min > 0.0, "burrows.width_min", b.width_min)?;
        check(b.fitting_edge_width > 0.0, "burrows.fitting_edge_width", b.fitting_edge_width)?;
        check(b.adaptation_interval > 0, "burrows.adaptation_interval", b.adaptation_interval as f64)?;

        let e = &self.explored_area;
        check(e.adaptation_rate_burrows >= 0.0, "explored_area.adaptation_rate_burrows", e.adaptation_rate_burrows)?;
        check(e.adaptation_rate_outside >= 0.0, "explored_area.adaptation_rate_outside", e.adaptation_rate_outside)?;
        check(
            e.background_adaptation_rate > 0.0,
            "explored_area.background_adaptation_rate",
            e.background_adaptation_rate,
        )?;

        let c = &self.colors;
        check(c.sand != c.burrow, "colors.burrow", c.burrow)?;
        Ok(())
    }
}
