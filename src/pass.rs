//! Frame by frame driver of the tracking engines.
//!
//! Objects are tracked in every frame. Burrows are updated every adaptation
//! interval, either from the area the objects explored or from the trail of
//! the main object. Frames are processed strictly one after the other.
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use image::GrayImage;
use tracing::{debug, info, warn};

use crate::burrows::{
    ensure_centerline, extract_burrow, potential_burrows_mask, try_refine_burrow, Burrow, BurrowTracker,
    ExploredArea, FrameView, MouseTrail,
};
use crate::context::{ColorEstimate, RunContext};
use crate::ground::GroundProfile;
use crate::mot::{objects_from_labels, MovingObject, ObjectTracker, TrackList, TrackerError};
use crate::params::Parameters;
use crate::utils::raster::{fill_polygon, label_components};
use crate::utils::Point;

/// Everything known about one frame
#[derive(Debug, Clone)]
pub struct FrameData {
    pub frame_id: usize,
    /// Binary mask of the pixels that differ from the background
    pub motion_mask: GrayImage,
    pub background: GrayImage,
    /// `None` if no ground line could be found in this frame
    pub ground: Option<GroundProfile>,
}

impl FrameData {
    /// Frame with a ground line given by its points, ordered by x
    pub fn with_ground_points(
        frame_id: usize,
        motion_mask: GrayImage,
        background: GrayImage,
        ground_points: Vec<Point>,
    ) -> Result<Self, TrackerError> {
        Ok(FrameData {
            frame_id,
            motion_mask,
            background,
            ground: Some(GroundProfile::new(ground_points)?),
        })
    }
}

/// Source of the burrow shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurrowMode {
    /// Burrows are the underground regions explored by objects
    ExploredArea,
    /// Burrows grow along the trail of the main object
    Trail,
}

#[derive(Debug, Clone, Default)]
pub struct PassStatistics {
    pub frames_analyzed: usize,
    pub frames_without_ground: usize,
    /// Frames dropped because of a tracking error
    pub frames_skipped: usize,
    pub candidates_rejected: usize,
    pub refinement_fallbacks: usize,
    pub cancelled: bool,
    pub started: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
}

impl PassStatistics {
    /// Fraction of the analyzed frames without ground profile
    pub fn ground_missing_fraction(&self) -> f64 {
        if self.frames_analyzed == 0 {
            0.0
        } else {
            self.frames_without_ground as f64 / self.frames_analyzed as f64
        }
    }
    pub fn duration(&self) -> Option<Duration> {
        match (self.started, self.finished) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Tracks handed out at the end of a pass
#[derive(Debug)]
pub struct PassResult {
    pub objects: TrackList<MovingObject>,
    pub burrows: TrackList<Burrow>,
    pub moved_first_in_frame: Option<usize>,
    pub statistics: PassStatistics,
}

pub struct FramePass {
    context: RunContext,
    mode: BurrowMode,
    objects: ObjectTracker,
    burrows: BurrowTracker,
    explored: Option<ExploredArea>,
    trail: MouseTrail,
    stats: PassStatistics,
}

impl FramePass {
    /// Creates a pass after checking the parameters
    ///
    /// Basic usage:
    ///
    /// ```
    /// use burrow_track::params::Parameters;
    /// use burrow_track::pass::{BurrowMode, FramePass};
    /// let pass = FramePass::new(Parameters::default(), BurrowMode::ExploredArea).unwrap();
    /// assert_eq!(pass.statistics().frames_analyzed, 0);
    /// ```
    pub fn new(params: Parameters, mode: BurrowMode) -> Result<Self, TrackerError> {
        params.validate()?;
        Ok(FramePass {
            objects: ObjectTracker::new(params.objects.clone()),
            burrows: BurrowTracker::new(params.burrows.clone()),
            context: RunContext::new(params),
            mode,
            explored: None,
            trail: MouseTrail::new(),
            stats: PassStatistics::default(),
        })
    }
    pub fn statistics(&self) -> &PassStatistics {
        &self.stats
    }
    pub fn object_tracker(&self) -> &ObjectTracker {
        &self.objects
    }
    pub fn burrow_tracker(&self) -> &BurrowTracker {
        &self.burrows
    }
    pub fn explored_area(&self) -> Option<&ExploredArea> {
        self.explored.as_ref()
    }
    /// Uses calibrated material colors for the edge fits from now on
    pub fn set_colors(&mut self, colors: ColorEstimate) {
        self.context.set_colors(colors);
    }
    /// Analyzes one frame
    pub fn process_frame(&mut self, frame: &FrameData) -> Result<(), TrackerError> {
        let frame_id = frame.frame_id;
        let size = frame.motion_mask.dimensions();
        self.stats.frames_analyzed += 1;

        let params = self.context.params();
        let labels = label_components(&frame.motion_mask);
        let objects = objects_from_labels(&labels, &params.objects);
        self.objects.match_objects(frame_id, objects)?;

        let current: Vec<u32> = self
            .objects
            .current_objects(frame_id)
            .iter()
            .filter_map(|o| o.get_label())
            .collect();
        if self.explored.as_ref().map_or(true, |e| e.dimensions() != size) {
            self.explored = Some(ExploredArea::new(size.0, size.1));
        }
        if let Some(explored) = self.explored.as_mut() {
            explored.mark_labels(&labels, &current);
        }

        let Some(ground) = &frame.ground else {
            debug!(frame = frame_id, "no ground profile");
            self.stats.frames_without_ground += 1;
            self.trail.reset();
            return Ok(());
        };
        let update_burrows = frame_id % params.burrows.adaptation_interval == 0;

        match self.mode {
            BurrowMode::ExploredArea => {
                if update_burrows {
                    self.find_burrows(frame, ground)?;
                }
            }
            BurrowMode::Trail => {
                if update_burrows {
                    self.burrows.store_working_burrows(frame_id, ground, size)?;
                }
                let position = self.objects.main_object(frame_id).map(|o| o.get_pos());
                self.trail.update(position, ground, &self.context.params().objects);
                if !self.trail.is_empty() {
                    self.burrows.grow_with_trail(&self.trail, size);
                }
            }
        }
        Ok(())
    }
    /// Detects, refines and reconciles the burrows explored so far, then
    /// lets the explored area fade
    fn find_burrows(&mut self, frame: &FrameData, ground: &GroundProfile) -> Result<(), TrackerError> {
        let Some(explored) = self.explored.as_mut() else {
            return Ok(());
        };
        let frame_id = frame.frame_id;
        let params = self.context.params();
        let mask = potential_burrows_mask(explored, ground, params);
        let labels = label_components(&mask);

        let positions: Vec<Point> = self
            .objects
            .current_objects(frame_id)
            .iter()
            .map(|o| o.get_pos())
            .collect();
        let view = FrameView {
            ground,
            background: &frame.background,
            explored: Some(&*explored),
            objects: &positions,
        };

        let mut burrows = Vec::new();
        for label in 1..=labels.count {
            let candidate = match extract_burrow(&labels.component_mask(label), ground, (0, 0), &params.burrows) {
                Ok(candidate) => candidate,
                Err(err) => {
                    debug!(frame = frame_id, label, %err, "burrow candidate rejected");
                    self.stats.candidates_rejected += 1;
                    continue;
                }
            };
            let previous = self.burrows.previous_burrow(frame_id, &candidate);
            let burrow = match try_refine_burrow(&candidate, previous, &view, &self.context) {
                Ok(refined) => refined,
                Err(err) => {
                    warn!(frame = frame_id, position = ?candidate.centroid(), %err, "keeping unrefined burrow");
                    self.stats.refinement_fallbacks += 1;
                    ensure_centerline(candidate, ground, &params.burrows)
                }
            };
            if burrow.is_valid() {
                burrows.push(burrow);
            }
        }

        let outcome = self.burrows.update(frame_id, burrows)?;
        debug!(
            frame = frame_id,
            started = outcome.started,
            extended = outcome.extended,
            "updated burrow tracks"
        );

        let interval = params.burrows.adaptation_interval as f64;
        let rate_inside = params.explored_area.adaptation_rate_burrows * interval;
        let rate_outside = params.explored_area.adaptation_rate_outside * interval;
        let (width, height) = explored.dimensions();
        let burrows_mask = self.context.scratch_mask(width, height);
        for track in self.burrows.active_tracks().iter().filter(|t| t.last_frame() == frame_id) {
            fill_polygon(burrows_mask, track.last().contour(), 255);
        }
        explored.decay(burrows_mask, rate_inside, rate_outside);
        Ok(())
    }
    /// Processes frames until they run out or `cancel` is set. Frames with
    /// tracking errors are skipped. The tracks are flushed in any case.
    pub fn run<I>(mut self, frames: I, cancel: &AtomicBool) -> PassResult
    where
        I: IntoIterator<Item = FrameData>,
    {
        self.stats.started = Some(Utc::now());
        for frame in frames {
            if cancel.load(Ordering::Relaxed) {
                info!(frame = frame.frame_id, "pass cancelled");
                self.stats.cancelled = true;
                break;
            }
            if let Err(err) = self.process_frame(&frame) {
                warn!(frame = frame.frame_id, %err, "skipping frame");
                self.stats.frames_skipped += 1;
            }
        }
        self.finish()
    }
    /// Flushes all tracks and hands them out
    pub fn finish(mut self) -> PassResult {
        if self.stats.finished.is_none() {
            self.stats.finished = Some(Utc::now());
        }
        let moved_first_in_frame = self.objects.moved_first_in_frame();
        let result = PassResult {
            objects: self.objects.into_tracks(),
            burrows: self.burrows.into_tracks(),
            moved_first_in_frame,
            statistics: self.stats,
        };
        info!(
            objects = result.objects.len(),
            burrows = result.burrows.len(),
            frames = result.statistics.frames_analyzed,
            "pass finished"
        );
        result
    }
}
