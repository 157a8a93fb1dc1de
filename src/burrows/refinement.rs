//! Refinement of burrow outlines against the background image.
//!
//! Long burrows are refined by line scans perpendicular to their centerline:
//! the intensity profile of every scan is matched against sigmoidal edge
//! templates to locate both walls. Bulky burrows go through a segmentation
//! instead (see [`refine_bulky_burrow`]).
use std::collections::VecDeque;
use std::f64::consts::FRAC_PI_8;

use image::GrayImage;
use tracing::warn;

use crate::burrows::{compute_centerline, ensure_centerline, refine_bulky_burrow, Burrow, ExploredArea, RefinementError};
use crate::context::{EdgeDirection, EdgeTemplates, RunContext};
use crate::ground::GroundProfile;
use crate::params::BurrowParams;
use crate::utils::curves::{curve_distance, make_curve_equidistant, ring_length};
use crate::utils::polygon::{get_ray_hitpoint, get_ray_intersections, regularize_contour_points};
use crate::utils::raster::line_scan;
use crate::utils::{euclidean_distance, Point};

/// Frames an object has to be gone from a burrow tip, in units of the
/// background adaptation time, before the tip is refined
const ABSENCE_FACTOR: f64 = 3.0;

/// What the refinement steps get to see of the current frame
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub ground: &'a GroundProfile,
    pub background: &'a GrayImage,
    pub explored: Option<&'a ExploredArea>,
    /// Positions of the objects currently tracked
    pub objects: &'a [Point],
}

/// Locates an edge in an intensity profile.
///
/// The template of the requested direction slides along the profile and the
/// position with the smallest sum of squared differences wins. The match is
/// accepted if its goodness of fit `1 - ssd / ss_tot` over the covered part of
/// the profile exceeds `r2min`. Returns the index of the edge center.
pub fn find_burrow_edge(
    profile: &[f64],
    templates: &EdgeTemplates,
    direction: EdgeDirection,
    r2min: f64,
) -> Option<usize> {
    let template = templates.get(direction);
    let m = template.len();
    if m == 0 || profile.len() < m {
        return None;
    }
    let (best, ssd_min) = profile
        .windows(m)
        .map(|window| {
            window
                .iter()
                .zip(template)
                .map(|(p, t)| (p - t) * (p - t))
                .sum::<f64>()
        })
        .enumerate()
        .fold((0, f64::INFINITY), |acc, (i, ssd)| if ssd < acc.1 { (i, ssd) } else { acc });

    let roi = &profile[best..best + m];
    let mean = roi.iter().sum::<f64>() / m as f64;
    let ss_tot: f64 = roi.iter().map(|v| (v - mean) * (v - mean)).sum();
    let r2 = if ss_tot == 0.0 { 0.0 } else { 1.0 - ssd_min / ss_tot };
    if r2 > r2min {
        Some(best + templates.half_width())
    } else {
        None
    }
}

/// Whether long burrows are refined by line scans rather than segmentation
pub fn is_long_burrow(burrow: &Burrow, params: &BurrowParams) -> bool {
    let length = burrow.length();
    length > params.fitting_length_threshold && burrow.area() / length < params.fitting_width_threshold
}

fn unit_vector(from: &Point, to: &Point) -> Option<(f64, f64)> {
    let dist = euclidean_distance(from, to);
    if dist > 0.0 {
        Some(((to.x - from.x) / dist, (to.y - from.y) / dist))
    } else {
        None
    }
}

/// Whether no object came close to the burrow tip recently
fn tip_unoccupied(tip: &Point, contour: &[Point], view: &FrameView, context: &RunContext) -> bool {
    let params = context.params();
    let rate = params.explored_area.adaptation_rate_burrows;
    if rate != 0.0 {
        return match view.explored {
            Some(explored) => {
                let value = explored.value_at(tip.x as i32, tip.y as i32) as f64;
                let frames_absent = (1.0 - value) / rate;
                frames_absent > ABSENCE_FACTOR / params.explored_area.background_adaptation_rate
            }
            None => true,
        };
    }
    let mut ring = contour.to_vec();
    ring.extend(contour.first().copied());
    let threshold = 3.0 * params.burrows.width;
    !view.objects.iter().any(|p| curve_distance(&ring, p) < threshold)
}

/// Refines an elongated burrow by line scans perpendicular to its centerline.
///
/// Burrows whose centerline has fewer than four points are returned unchanged.
pub fn refine_long_burrow(burrow: &Burrow, view: &FrameView, context: &RunContext) -> Result<Burrow, RefinementError> {
    let params = &context.params().burrows;
    let templates = context.templates();
    let r2min = params.fitting_edge_r2min;
    let contour = burrow.contour();

    // keep the outline along the ground line
    let mut ground_points: Vec<Point> = contour
        .iter()
        .filter(|p| view.ground.distance(p) < params.ground_point_distance)
        .copied()
        .collect();
    ground_points.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    let mut outline: VecDeque<Point> = ground_points.into();

    let centerline = match burrow.centerline() {
        Some(c) => c.to_vec(),
        None => compute_centerline(contour, view.ground, params),
    };
    if centerline.len() < 4 {
        warn!(position = ?burrow.centroid(), "refining very short burrows is not supported");
        return Ok(burrow.clone());
    }
    let centerline = make_curve_equidistant(&centerline, params.centerline_segment_length);
    if centerline.len() < 3 {
        return Err(RefinementError::RefinementFailed(format!(
            "centerline collapsed to {} points",
            centerline.len()
        )));
    }

    // inner points
    let scan_length = (2.0 * params.width).trunc();
    let reach = ring_length(contour);
    let mut centerline_new = vec![centerline[0]];
    for k in 1..centerline.len() - 1 {
        let Some((dx, dy)) = unit_vector(&centerline[k - 1], &centerline[k + 1]) else {
            continue;
        };
        let mut p = centerline[k];
        let pa = get_ray_hitpoint(&p, &p.translate(reach * dy, -reach * dx), contour, true);
        let pb = get_ray_hitpoint(&p, &p.translate(-reach * dy, reach * dx), contour, true);
        if let (Some(a), Some(b)) = (pa, pb) {
            p = a.midpoint(&b);
        }

        let scan_a = p.translate(scan_length * dy, -scan_length * dx);
        let scan_b = p.translate(-scan_length * dy, scan_length * dx);
        let profile = line_scan(view.background, &scan_a, &scan_b, params.scan_width);
        let k_l = find_burrow_edge(&profile, templates, EdgeDirection::Down, r2min);
        let k_r = find_burrow_edge(&profile, templates, EdgeDirection::Up, r2min);

        match (k_l, k_r, pa, pb) {
            (Some(k_l), Some(k_r), _, _) => {
                // signed distances from p, positive towards scan_a
                let mut d_l = scan_length - k_l as f64;
                let mut d_r = scan_length - k_r as f64;
                let width = d_l - d_r;
                if width < params.width_min {
                    d_r -= (params.width_min - width) / 2.0;
                    d_l += (params.width_min - width) / 2.0;
                }
                outline.push_back(p.translate(d_l * dy, -d_l * dx));
                outline.push_front(p.translate(d_r * dy, -d_r * dx));
                let d_c = (d_l + d_r) / 2.0;
                centerline_new.push(p.translate(d_c * dy, -d_c * dx));
            }
            (_, _, Some(a), Some(b)) => {
                outline.push_back(a);
                outline.push_front(b);
                centerline_new.push(p);
            }
            _ => {}
        }
    }

    // burrow end
    if centerline_new.len() < 2 {
        return Err(RefinementError::RefinementFailed(
            "no point of the centerline could be refined".to_string(),
        ));
    }
    let n = centerline_new.len();
    let (anchor, before) = (centerline_new[n - 1], centerline_new[n - 2]);
    let angle = (anchor.y - before.y).atan2(anchor.x - before.x);
    let angles: Vec<f64> = (-2..=2).map(|k| angle + FRAC_PI_8 * k as f64).collect();
    let unoccupied = tip_unoccupied(&before, contour, view, context);
    let mut farthest: Option<(Point, f64)> = None;
    for mut point in get_ray_intersections(&anchor, &angles, contour, true).into_iter().flatten() {
        if unoccupied {
            if let Some((dx, dy)) = unit_vector(&anchor, &point) {
                let end = anchor.translate(scan_length * dx, scan_length * dy);
                let profile = line_scan(view.background, &anchor, &end, params.scan_width);
                if let Some(l) = find_burrow_edge(&profile, templates, EdgeDirection::Up, r2min) {
                    point = anchor.translate(l as f64 * dx, l as f64 * dy);
                }
            }
        }
        outline.push_back(point);
        let dist = euclidean_distance(&anchor, &point);
        if farthest.map_or(true, |(_, d)| dist > d) {
            farthest = Some((point, dist));
        }
    }
    if let Some((point, _)) = farthest {
        centerline_new.push(point);
    }

    // burrow exit: extend the first segment back up to the ground line
    let (q1, q2) = (centerline[1], centerline[2]);
    let angle = (q1.y - q2.y).atan2(q1.x - q2.x);
    let hits = get_ray_intersections(&centerline_new[1], &[angle], view.ground.points(), false);
    if let Some(Some(exit)) = hits.first() {
        centerline_new[0] = *exit;
    }

    let outline = regularize_contour_points(outline.make_contiguous());
    if outline.is_empty() {
        return Err(RefinementError::RefinementFailed(
            "refined outline is not a valid polygon".to_string(),
        ));
    }
    Burrow::with_centerline(outline, centerline_new, true)
        .map_err(|err| RefinementError::RefinementFailed(err.to_string()))
}

/// Refines a burrow, choosing line scans for long and segmentation for bulky
/// burrows. `previous` is the last burrow of the matching track, if any.
pub fn try_refine_burrow(
    burrow: &Burrow,
    previous: Option<&Burrow>,
    view: &FrameView,
    context: &RunContext,
) -> Result<Burrow, RefinementError> {
    let params = &context.params().burrows;
    let burrow = ensure_centerline(burrow.clone(), view.ground, params);
    if is_long_burrow(&burrow, params) {
        refine_long_burrow(&burrow, view, context)
    } else {
        refine_bulky_burrow(&burrow, previous, view, context)
    }
}

/// Same as [`try_refine_burrow`], but failures fall back to the unrefined burrow
pub fn refine_burrow(burrow: &Burrow, previous: Option<&Burrow>, view: &FrameView, context: &RunContext) -> Burrow {
    match try_refine_burrow(burrow, previous, view, context) {
        Ok(refined) => refined,
        Err(err) => {
            warn!(position = ?burrow.centroid(), %err, "keeping unrefined burrow");
            ensure_centerline(burrow.clone(), view.ground, &context.params().burrows)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ColorEstimate;
    use crate::params::Parameters;
    use crate::test_data::{corridor_background, corridor_contour, flat_ground};
    use crate::utils::polygon::is_simple;
    use crate::utils::Rect;

    fn templates() -> EdgeTemplates {
        EdgeTemplates::new(3.0, &ColorEstimate { sand: 200.0, burrow: 50.0 })
    }

    #[test]
    fn test_find_edge_in_profile() {
        let mut profile = vec![200.0; 20];
        profile.push(125.0);
        profile.extend(vec![50.0; 20]);
        let templates = templates();
        assert_eq!(find_burrow_edge(&profile, &templates, EdgeDirection::Down, 0.5), Some(20));
        // the rising template does not fit a falling edge
        assert_eq!(find_burrow_edge(&profile, &templates, EdgeDirection::Up, 0.5), None);
        // flat and too short profiles
        assert_eq!(find_burrow_edge(&[120.0; 30], &templates, EdgeDirection::Up, 0.5), None);
        assert_eq!(find_burrow_edge(&[50.0, 200.0], &templates, EdgeDirection::Up, 0.5), None);
    }

    #[test]
    fn test_find_walls_of_corridor() {
        let background = corridor_background();
        let templates = templates();
        let p = Point::new(100.0, 100.0);
        // scan from right to left across the corridor
        let profile = line_scan(&background, &p.translate(40.0, 0.0), &p.translate(-40.0, 0.0), 3);
        let k_l = find_burrow_edge(&profile, &templates, EdgeDirection::Down, 0.5).unwrap();
        let k_r = find_burrow_edge(&profile, &templates, EdgeDirection::Up, 0.5).unwrap();
        let d_l = 40.0 - k_l as f64;
        let d_r = 40.0 - k_r as f64;
        assert!((d_l - 10.5).abs() <= 1.0, "left wall at {}", d_l);
        assert!((d_r + 10.0).abs() <= 1.0, "right wall at {}", d_r);
    }

    #[test]
    fn test_refine_long_burrow_narrows_outline() {
        let context = RunContext::new(Parameters::default());
        let background = corridor_background();
        let ground = flat_ground();
        let view = FrameView {
            ground: &ground,
            background: &background,
            explored: None,
            objects: &[],
        };
        // outline five pixels too wide on both sides
        let burrow = Burrow::new(Rect::new(85.0, 50.0, 30.0, 100.0).corners()).unwrap();
        let refined = refine_long_burrow(&burrow, &view, &context).unwrap();
        assert!(refined.is_refined());
        assert!(is_simple(refined.contour()));
        assert!(refined.area() > 1800.0 && refined.area() < 2500.0, "area {}", refined.area());
        let centerline = refined.centerline().unwrap();
        assert!((centerline[0].y - 50.0).abs() < 1e-6);
        for p in &centerline[1..centerline.len() - 1] {
            assert!((p.x - 100.0).abs() < 2.0, "centerline point {:?}", p);
        }
    }

    #[test]
    fn test_short_burrows_are_kept() {
        let context = RunContext::new(Parameters::default());
        let background = corridor_background();
        let ground = flat_ground();
        let view = FrameView {
            ground: &ground,
            background: &background,
            explored: None,
            objects: &[],
        };
        let burrow = Burrow::new(corridor_contour())
            .unwrap()
            .set_centerline(vec![Point::new(100.0, 50.0), Point::new(100.0, 140.0)]);
        let result = refine_long_burrow(&burrow, &view, &context).unwrap();
        assert_eq!(result, burrow);
    }

    #[test]
    fn test_routing() {
        let params = BurrowParams::default();
        let line = vec![Point::new(100.0, 50.0), Point::new(100.0, 170.0)];
        let long = Burrow::new(Rect::new(90.0, 50.0, 20.0, 120.0).corners())
            .unwrap()
            .set_centerline(line.clone());
        assert!(is_long_burrow(&long, &params));
        let bulky = Burrow::new(Rect::new(40.0, 50.0, 120.0, 120.0).corners())
            .unwrap()
            .set_centerline(line);
        assert!(!is_long_burrow(&bulky, &params));
    }
}
